//! Error types of the dispatch backend.
//!
//! Validation failures are not errors: a run with invalid rows ends in the
//! `Blocked` phase carrying its verdicts. Per-row hand-off failures are not
//! errors of the run either; they are recorded on the run and the loop moves on.

use actix_web::http::StatusCode;
use actix_web::ResponseError;
use common::model::dataset::DatasetError;
use thiserror::Error;

/// Failure to turn an uploaded file into a dataset.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("unsupported file '{file_name}': expected .csv, .tsv, .txt, .xlsx or .xls")]
    UnsupportedFormat { file_name: String },

    #[error("file is not valid UTF-8")]
    InvalidEncoding,

    #[error("the file does not contain enough data: a header and at least one row are required")]
    NotEnoughRows,

    #[error("invalid header: {0}")]
    Header(#[from] DatasetError),

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("missing file field in upload")]
    MissingFile,
}

/// Inputs missing before a run may start. Nothing has been sent when one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("no data to send: upload a file with at least one row")]
    MissingDataset,

    #[error("no message to send: write a message template")]
    EmptyTemplate,

    #[error("no phone number column selected")]
    NoColumnSelected,

    #[error("no valid phone numbers to send to")]
    NoValidRows,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("a run is already in progress")]
    RunInProgress,

    #[error("no run is in progress")]
    NoActiveRun,

    #[error("run {run_id} aborted: {reason}")]
    Aborted { run_id: String, reason: String },
}

impl ResponseError for IngestionError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

impl ResponseError for DispatchError {
    fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::Precondition(_) => StatusCode::BAD_REQUEST,
            DispatchError::RunInProgress => StatusCode::CONFLICT,
            DispatchError::NoActiveRun => StatusCode::NOT_FOUND,
            DispatchError::Aborted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Raised by a link opener for a single row.
#[derive(Debug, Error)]
pub enum LinkOpenError {
    #[error("could not open link: {0}")]
    Open(#[from] std::io::Error),

    #[error("{0}")]
    Rejected(String),
}
