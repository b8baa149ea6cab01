use common::model::dataset::Dataset;
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::observable::{Observable, Subscription};

/// Consistent view of the three shared fields, taken under the write gate.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub dataset: Option<Arc<Dataset>>,
    pub template: String,
    pub column: Option<String>,
}

struct BusInner {
    write_gate: Mutex<()>,
    dataset: Observable<Option<Arc<Dataset>>>,
    template: Observable<String>,
    column: Observable<Option<String>>,
}

/// Single source of truth for the current dataset, message template and phone
/// column.
///
/// Each field is an independent observable with its own subscribers. All
/// writes go through one gate, so notifications of two writes never
/// interleave and every subscriber sees writes in the same order. Handlers run
/// while the gate is held: they may read the bus but must not write to it.
///
/// The bus is cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct StateBus {
    inner: Arc<BusInner>,
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new()
    }
}

impl StateBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                write_gate: Mutex::new(()),
                dataset: Observable::new(None),
                template: Observable::new(String::new()),
                column: Observable::new(None),
            }),
        }
    }

    pub fn dataset(&self) -> Option<Arc<Dataset>> {
        self.inner.dataset.get()
    }

    pub fn template(&self) -> String {
        self.inner.template.get()
    }

    pub fn column(&self) -> Option<String> {
        self.inner.column.get()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.with_snapshot(Snapshot::clone)
    }

    /// Runs `f` against a snapshot with writes held off until it returns.
    ///
    /// Surfaces use this to seed their state and subscribe without missing or
    /// reordering a concurrent write.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        let _gate = self.gate();
        let snapshot = Snapshot {
            dataset: self.inner.dataset.get(),
            template: self.inner.template.get(),
            column: self.inner.column.get(),
        };
        f(&snapshot)
    }

    /// Replaces the dataset and returns the shared handle subscribers received.
    pub fn set_dataset(&self, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        let _gate = self.gate();
        info!(
            "Dataset replaced: {} columns, {} rows",
            dataset.headers().len(),
            dataset.len()
        );
        self.inner.dataset.replace(Some(Arc::clone(&dataset)));
        dataset
    }

    pub fn clear_dataset(&self) {
        let _gate = self.gate();
        info!("Dataset cleared");
        self.inner.dataset.replace(None);
    }

    pub fn set_template(&self, text: impl Into<String>) {
        let text = text.into();
        let _gate = self.gate();
        debug!("Template updated ({} chars)", text.chars().count());
        self.inner.template.replace(text);
    }

    /// Appends `text` to the current template in one write and returns the result.
    pub fn append_to_template(&self, text: &str) -> String {
        let _gate = self.gate();
        let mut template = self.inner.template.get();
        template.push_str(text);
        debug!("Template updated ({} chars)", template.chars().count());
        self.inner.template.replace(template.clone());
        template
    }

    /// Selects the phone column. An empty name clears the selection.
    pub fn set_column(&self, column: Option<String>) {
        let _gate = self.gate();
        self.publish_column(column);
    }

    /// Selects `column`, or clears the selection if it is the one already
    /// selected. Returns the new selection.
    pub fn toggle_column(&self, column: &str) -> Option<String> {
        let _gate = self.gate();
        let next = match self.inner.column.get() {
            Some(current) if current == column => None,
            _ => Some(column.to_string()),
        };
        self.publish_column(next.clone());
        next.filter(|c| !c.is_empty())
    }

    pub fn on_dataset(
        &self,
        handler: impl Fn(&Option<Arc<Dataset>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.dataset.subscribe(handler)
    }

    pub fn on_template(&self, handler: impl Fn(&String) + Send + Sync + 'static) -> Subscription {
        self.inner.template.subscribe(handler)
    }

    pub fn on_column(
        &self,
        handler: impl Fn(&Option<String>) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.column.subscribe(handler)
    }

    fn publish_column(&self, column: Option<String>) {
        let column = column.filter(|c| !c.trim().is_empty());
        debug!("Phone column set to {:?}", column);
        self.inner.column.replace(column);
    }

    fn gate(&self) -> MutexGuard<'_, ()> {
        self.inner
            .write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
