//! # Dispatch Start Service
//!
//! `POST /api/dispatch/start`. Takes a snapshot of the bus, resolves the
//! prefix and delay against the configuration and hands the run to the
//! dispatcher. The response is sent as soon as the run is spawned; clients
//! poll `/status/{run_id}` for progress.

use actix_web::{web, HttpResponse, Responder, ResponseError};
use common::model::verdict::ValidationSummary;
use common::requests::StartRunRequest;
use common::responses::StartRunResponse;
use log::{error, info};

use crate::app::AppState;
use crate::dispatch::{RunHandle, RunRequest, StartOutcome};
use crate::error::DispatchError;
use crate::job_controller::state::RunsState;

/// The Actix web handler for `POST /api/dispatch/start`.
///
/// Starts a run over the bus' current dataset, template and column, or
/// reports the invalid rows that block it.
///
/// # Arguments
/// * `state` - The shared `AppState` holding the bus, dispatcher and run registry.
/// * `req` - Optional prefix and delay overrides plus the `accept_partial` flag.
///
/// # Returns
/// The `StartRunResponse` as JSON, or the status code of the `DispatchError`
/// (`400` for missing inputs, `409` while another run is sending).
pub(crate) async fn process(
    state: web::Data<AppState>,
    req: web::Json<StartRunRequest>,
) -> impl Responder {
    match start_run(&state, req.into_inner()).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => HttpResponse::build(e.status_code()).body(format!("Error: {}", e)),
    }
}

async fn start_run(
    state: &AppState,
    req: StartRunRequest,
) -> Result<StartRunResponse, DispatchError> {
    let prefix = req
        .prefix
        .unwrap_or_else(|| state.config.default_prefix.clone());
    let delay = state.config.delay(req.delay_seconds);
    let request = RunRequest::from_snapshot(state.bus.snapshot(), prefix, delay, req.accept_partial);

    match state.dispatcher.start_run(request)? {
        StartOutcome::Started(handle) => {
            // The updater may already have recorded progress; registration
            // never overwrites it.
            state.runs.register(handle.run_id()).await;
            let response = StartRunResponse::Started {
                run_id: handle.run_id().to_string(),
                total: handle.total(),
            };
            watch_run(handle, state.runs.clone());
            Ok(response)
        }
        StartOutcome::Blocked(verdicts) => Ok(StartRunResponse::Blocked {
            summary: ValidationSummary::from_verdicts(&verdicts),
            verdicts,
        }),
    }
}

/// Waits for the run in the background and logs how it ended.
///
/// A run that ends in an error without a terminal status is marked `Failed`
/// in the registry so pollers do not wait forever.
fn watch_run(handle: RunHandle, runs: RunsState) {
    let run_id = handle.run_id().to_string();
    tokio::spawn(async move {
        match handle.finished().await {
            Ok(run) => info!(
                "Run {} ended: {} of {} rows processed",
                run.run_id, run.sent_count, run.total
            ),
            Err(e) => {
                error!("Run {} ended with an error: {}", run_id, e);
                runs.fail_if_pending(&run_id, e.to_string()).await;
            }
        }
    });
}
