//! Manages dispatch runs over HTTP: validation, start, status polling and
//! cancellation.
//!
//! Runs are driven by the [`Dispatcher`](crate::dispatch::Dispatcher) held in
//! the app state. Their statuses reach the run registry through the update
//! channel, which is what `/status/{run_id}` reads.
//!
//! The provided routes are:
//! - `POST /api/dispatch/validate`: validates every row against the selected
//!   phone column and returns the verdicts with counts.
//! - `GET /api/dispatch/validate`: the last validation report, `404` once a
//!   dataset or column change has discarded it.
//! - `POST /api/dispatch/start`: starts a run with the bus' current dataset,
//!   template and column. Returns `{"outcome": "started", "run_id", "total"}`,
//!   or `{"outcome": "blocked", ...}` with the verdicts when rows are invalid
//!   and `accept_partial` is false. `400` on missing inputs, `409` while
//!   another run is sending.
//! - `GET /api/dispatch/status/{run_id}`: latest `RunStatus` of a run.
//! - `GET /api/dispatch/current`: orchestrator phase and live run.
//! - `POST /api/dispatch/cancel`: stops the active run, `404` if none.

use actix_web::web::{get, post, scope};
use actix_web::Scope;

mod cancel;
mod current;
mod get_status;
mod start;
mod validate;

const API_PATH: &str = "/api/dispatch";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/validate", post().to(validate::process))
        .route("/validate", get().to(validate::latest))
        .route("/start", post().to(start::process))
        .route("/status/{run_id}", get().to(get_status::process))
        .route("/current", get().to(current::process))
        .route("/cancel", post().to(cancel::process))
}
