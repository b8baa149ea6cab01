use crate::jobs::{DispatchRun, RunPhase};
use crate::model::dataset::Dataset;
use crate::model::verdict::{ValidationSummary, ValidationVerdict};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetView {
    pub dataset: Option<Arc<Dataset>>,
    pub column: Option<String>,
}

/// Headers and row count of a dataset, returned after an upload and by the
/// summary route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl From<&Dataset> for DatasetSummary {
    fn from(dataset: &Dataset) -> Self {
        Self {
            headers: dataset.headers().to_vec(),
            row_count: dataset.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateView {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnView {
    pub column: Option<String>,
}

/// Message preview rendered against the first row of the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preview {
    /// `None` while there is no template or no data row to render against.
    pub rendered: Option<String>,
    /// Headers that can be inserted as `{{header}}`.
    pub variables: Vec<String>,
    /// Placeholders in the template that match no header; they are sent verbatim.
    pub unknown_placeholders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub column: Option<String>,
    pub summary: ValidationSummary,
    pub verdicts: Vec<ValidationVerdict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartRunResponse {
    Started {
        run_id: String,
        total: usize,
    },
    /// Nothing was sent; the verdicts tell the caller which rows to fix.
    Blocked {
        summary: ValidationSummary,
        verdicts: Vec<ValidationVerdict>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentRun {
    pub phase: RunPhase,
    /// The active run while sending, otherwise the last finished one.
    pub run: Option<DispatchRun>,
    /// Verdicts of the last start attempt that reached validation. Lists the
    /// rows to fix after a blocked start.
    #[serde(default)]
    pub last_verdicts: Vec<ValidationVerdict>,
}
