use common::model::dataset::Dataset;
use common::responses::Preview;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::state::{StateBus, Subscription};
use crate::template;

#[derive(Default)]
struct PreviewState {
    dataset: Option<Arc<Dataset>>,
    template: String,
    preview: Preview,
}

impl PreviewState {
    fn recompute(&mut self) {
        let headers = self
            .dataset
            .as_ref()
            .map(|d| d.headers().to_vec())
            .unwrap_or_default();

        let first_row = self.dataset.as_ref().and_then(|d| d.first_row());
        let rendered = match first_row {
            Some(row) if !self.template.is_empty() => Some(template::render(&self.template, row)),
            _ => None,
        };

        self.preview = Preview {
            rendered,
            unknown_placeholders: template::unknown_placeholders(&self.template, &headers),
            variables: headers,
        };
    }
}

/// Live rendering of the template against the first data row.
///
/// Recomputed on every dataset or template write, so a stale preview is never
/// served after an edit.
pub struct PreviewSurface {
    state: Arc<Mutex<PreviewState>>,
    _subscriptions: Vec<Subscription>,
}

impl PreviewSurface {
    pub fn attach(bus: &StateBus) -> Self {
        let state = Arc::new(Mutex::new(PreviewState::default()));

        // Seed and subscribe under the bus gate so no write slips in between.
        bus.with_snapshot(|snapshot| {
            {
                let mut seeded = lock(&state);
                seeded.dataset = snapshot.dataset.clone();
                seeded.template = snapshot.template.clone();
                seeded.recompute();
            }

            let on_dataset = {
                let state = Arc::clone(&state);
                bus.on_dataset(move |dataset| {
                    let mut state = lock(&state);
                    state.dataset = dataset.clone();
                    state.recompute();
                })
            };
            let on_template = {
                let state = Arc::clone(&state);
                bus.on_template(move |text| {
                    let mut state = lock(&state);
                    state.template = text.clone();
                    state.recompute();
                })
            };

            Self {
                state,
                _subscriptions: vec![on_dataset, on_template],
            }
        })
    }

    pub fn current(&self) -> Preview {
        lock(&self.state).preview.clone()
    }
}

fn lock(state: &Mutex<PreviewState>) -> MutexGuard<'_, PreviewState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
