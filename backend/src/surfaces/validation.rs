use common::model::verdict::ValidationSummary;
use common::responses::ValidationReport;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::state::{StateBus, Subscription};
use crate::validation;

type Latest = Arc<Mutex<Option<ValidationReport>>>;

/// Verdicts of the last explicit validation pass.
///
/// A new dataset or a different phone column discards them; they are never
/// patched row by row.
pub struct ValidationView {
    latest: Latest,
    _subscriptions: Vec<Subscription>,
}

impl ValidationView {
    pub fn attach(bus: &StateBus) -> Self {
        let latest: Latest = Arc::default();

        let on_dataset = {
            let latest = Arc::clone(&latest);
            bus.on_dataset(move |_| *lock(&latest) = None)
        };
        let on_column = {
            let latest = Arc::clone(&latest);
            bus.on_column(move |_| *lock(&latest) = None)
        };

        Self {
            latest,
            _subscriptions: vec![on_dataset, on_column],
        }
    }

    /// Validates the bus' current dataset against its selected column.
    pub fn validate(&self, bus: &StateBus) -> ValidationReport {
        bus.with_snapshot(|snapshot| {
            let verdicts = snapshot
                .dataset
                .as_ref()
                .map(|dataset| validation::validate(dataset, snapshot.column.as_deref()))
                .unwrap_or_default();

            let report = ValidationReport {
                column: snapshot.column.clone(),
                summary: ValidationSummary::from_verdicts(&verdicts),
                verdicts,
            };
            *lock(&self.latest) = Some(report.clone());
            report
        })
    }

    pub fn latest(&self) -> Option<ValidationReport> {
        lock(&self.latest).clone()
    }
}

fn lock(latest: &Mutex<Option<ValidationReport>>) -> MutexGuard<'_, Option<ValidationReport>> {
    latest.lock().unwrap_or_else(PoisonError::into_inner)
}
