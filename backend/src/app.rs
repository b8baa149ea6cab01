//! Shared application state and route registration.

use actix_web::web;
use std::sync::Arc;

use crate::config::Config;
use crate::dispatch::link::LinkOpener;
use crate::dispatch::Dispatcher;
use crate::job_controller::state::RunsState;
use crate::services;
use crate::state::StateBus;
use crate::surfaces::{PreviewSurface, ValidationView};

/// Everything the HTTP handlers share, injected as `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub bus: StateBus,
    pub dispatcher: Dispatcher,
    pub runs: RunsState,
    pub preview: Arc<PreviewSurface>,
    pub validation: Arc<ValidationView>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires a fresh bus, its surfaces and a dispatcher reporting into `runs`.
    pub fn new(config: Config, opener: Arc<dyn LinkOpener>, runs: RunsState) -> Self {
        let bus = StateBus::new();
        let dispatcher = Dispatcher::new(opener, config.base_url.clone(), runs.tx.clone());
        Self {
            preview: Arc::new(PreviewSurface::attach(&bus)),
            validation: Arc::new(ValidationView::attach(&bus)),
            bus,
            dispatcher,
            runs,
            config: Arc::new(config),
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(services::dataset::configure_routes())
        .service(services::template::configure_routes())
        .service(services::dispatch::configure_routes());
}
