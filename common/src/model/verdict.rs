use serde::{Deserialize, Serialize};

/// Outcome of validating the phone number of one row.
///
/// `normalized_number` is present only for valid rows and `reason` only for
/// invalid ones. Verdicts are always produced as a complete list, one per row
/// and in row order, never patched individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// 0-based index of the row in the dataset (excluding the header).
    pub row_index: usize,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidationVerdict {
    pub fn valid(row_index: usize, normalized_number: String) -> Self {
        Self {
            row_index,
            valid: true,
            normalized_number: Some(normalized_number),
            reason: None,
        }
    }

    pub fn invalid(row_index: usize, reason: impl Into<String>) -> Self {
        Self {
            row_index,
            valid: false,
            normalized_number: None,
            reason: Some(reason.into()),
        }
    }
}

/// Counts shown next to a validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
}

impl ValidationSummary {
    pub fn from_verdicts(verdicts: &[ValidationVerdict]) -> Self {
        let valid = verdicts.iter().filter(|v| v.valid).count();
        Self {
            total: verdicts.len(),
            valid,
            invalid: verdicts.len() - valid,
        }
    }

    pub fn all_valid(&self) -> bool {
        self.invalid == 0
    }
}
