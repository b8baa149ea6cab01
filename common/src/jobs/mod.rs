use serde::{Deserialize, Serialize};

/// Phase of the dispatch orchestrator.
///
/// `Idle` is both the initial and the resting state: a completed, cancelled or
/// failed run always ends back in `Idle`. `Blocked` is held after a validation
/// pass found invalid rows and the caller did not accept a partial send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Idle,
    Validating,
    Blocked,
    Ready,
    Sending,
    Completed,
}

/// Progress snapshot emitted after each processed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProgress {
    pub sent_count: usize,
    pub total: usize,
    pub progress_fraction: f64,
}

impl RunProgress {
    pub fn new(sent_count: usize, total: usize) -> Self {
        let progress_fraction = if total == 0 {
            0.0
        } else {
            sent_count as f64 / total as f64
        };
        Self {
            sent_count,
            total,
            progress_fraction,
        }
    }

    /// Whole percentage, as shown next to a progress bar.
    pub fn percent(&self) -> u32 {
        (self.progress_fraction * 100.0).round() as u32
    }
}

/// A row whose link hand-off failed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    pub row_index: usize,
    pub address: String,
    pub message: String,
}

/// State of one dispatch pass.
///
/// Rows are accounted in exactly one of `opened_rows`, `failures` or
/// `skipped_rows` (excluded by validation), so a finished run explains every
/// row of the dataset it was started from, except rows never reached because
/// the run was cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRun {
    pub run_id: String,
    pub total: usize,
    pub sent_count: usize,
    pub progress_fraction: f64,
    pub running: bool,
    pub last_error: Option<String>,
    pub opened_rows: Vec<usize>,
    pub failures: Vec<RowFailure>,
    pub skipped_rows: Vec<usize>,
}

impl DispatchRun {
    pub fn new(run_id: String, total: usize, skipped_rows: Vec<usize>) -> Self {
        Self {
            run_id,
            total,
            sent_count: 0,
            progress_fraction: 0.0,
            running: true,
            last_error: None,
            opened_rows: Vec::new(),
            failures: Vec::new(),
            skipped_rows,
        }
    }

    pub fn record_opened(&mut self, row_index: usize) -> RunProgress {
        self.opened_rows.push(row_index);
        self.advance()
    }

    /// A failed hand-off still counts as processed.
    pub fn record_failure(
        &mut self,
        row_index: usize,
        address: impl Into<String>,
        message: impl Into<String>,
    ) -> RunProgress {
        let message = message.into();
        self.last_error = Some(format!("row {}: {}", row_index + 1, message));
        self.failures.push(RowFailure {
            row_index,
            address: address.into(),
            message,
        });
        self.advance()
    }

    pub fn progress(&self) -> RunProgress {
        RunProgress::new(self.sent_count, self.total)
    }

    pub fn failure_for(&self, row_index: usize) -> Option<&RowFailure> {
        self.failures.iter().find(|f| f.row_index == row_index)
    }

    fn advance(&mut self) -> RunProgress {
        self.sent_count += 1;
        let progress = self.progress();
        self.progress_fraction = progress.progress_fraction;
        progress
    }
}

/// Status of a run as kept by the run registry and served to pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    Sending(RunProgress),
    Completed(DispatchRun),
    Cancelled(DispatchRun),
    Failed(String),
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed(_) | RunStatus::Cancelled(_) | RunStatus::Failed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_count_as_processed() {
        let mut run = DispatchRun::new("r".into(), 3, vec![]);
        run.record_opened(0);
        let progress = run.record_failure(1, "525512345678", "no browser");
        assert_eq!(progress.sent_count, 2);
        assert_eq!(run.last_error.as_deref(), Some("row 2: no browser"));
        assert!(run.failure_for(0).is_none());
        assert_eq!(run.failure_for(1).unwrap().address, "525512345678");
    }

    #[test]
    fn progress_fraction_tracks_sent_count() {
        let mut run = DispatchRun::new("r".into(), 4, vec![]);
        run.record_opened(0);
        assert_eq!(run.progress_fraction, 0.25);
        assert_eq!(run.progress().percent(), 25);
        assert_eq!(RunProgress::new(0, 0).progress_fraction, 0.0);
    }
}
