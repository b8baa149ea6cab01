use serde::{Deserialize, Serialize};

/// Replaces the whole message template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTemplateRequest {
    pub text: String,
}

/// Appends `{{header}}` to the current template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertVariableRequest {
    pub header: String,
}

/// Selects the phone-number column. `null` or `""` clears the selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetColumnRequest {
    #[serde(default)]
    pub column: Option<String>,
}

/// Selects `column`, or clears the selection when it is already selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleColumnRequest {
    pub column: String,
}

/// Parameters of a dispatch run. Dataset, template and column are taken from
/// the shared state at the moment the run starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartRunRequest {
    /// Country prefix; non-digit characters are discarded.
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub delay_seconds: Option<u64>,
    /// Send to the valid rows even when some rows failed validation.
    #[serde(default)]
    pub accept_partial: bool,
}
