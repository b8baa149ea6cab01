//! # Dataset Upload Service
//!
//! Handles `POST /api/dataset/upload`.
//!
//! ## Workflow
//!
//! 1.  **Multipart**: the payload is walked field by field. Only the `file`
//!     field is read; other fields are drained and ignored.
//! 2.  **File name**: the name from the content disposition selects the
//!     format: `.csv`, `.tsv` and `.txt` are read as delimited text, `.xlsx`
//!     and `.xls` as workbooks. Anything else is rejected.
//! 3.  **Buffering**: chunks are collected in memory up to
//!     `MAX_UPLOAD_BYTES`.
//! 4.  **Ingestion**: the bytes are parsed into a `Dataset` and published on
//!     the bus, replacing the previous one as a whole.

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use common::responses::DatasetSummary;
use futures_util::StreamExt;
use log::warn;

use crate::app::AppState;
use crate::error::IngestionError;
use crate::ingest;

/// Same ceiling as the JSON body limit.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub async fn process(payload: Multipart, state: web::Data<AppState>) -> impl Responder {
    match upload_dataset(payload, &state).await {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(e) => {
            warn!("Dataset upload rejected: {}", e);
            HttpResponse::build(e.status_code()).body(format!("Error: {}", e))
        }
    }
}

async fn upload_dataset(
    mut payload: Multipart,
    state: &AppState,
) -> Result<DatasetSummary, IngestionError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| IngestionError::Upload(e.to_string()))?;
        let field_name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| IngestionError::Upload(e.to_string()))?;
            if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(IngestionError::Upload(format!(
                    "file exceeds {} bytes",
                    MAX_UPLOAD_BYTES
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        if field_name.as_deref() == Some("file") {
            let file_name = field
                .content_disposition()
                .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
                .unwrap_or_default();
            upload = Some((file_name, bytes));
        }
    }

    let (file_name, bytes) = upload.ok_or(IngestionError::MissingFile)?;
    let dataset = ingest::parse_to_dataset(&file_name, &bytes)?;
    let dataset = state.bus.set_dataset(dataset);
    Ok(DatasetSummary::from(dataset.as_ref()))
}
