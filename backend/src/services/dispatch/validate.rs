use actix_web::{web, HttpResponse, Responder};
use log::debug;

use crate::app::AppState;

/// The Actix web handler for `POST /api/dispatch/validate`.
///
/// Validates every row of the current dataset against the selected phone
/// column and keeps the report as the latest one.
///
/// # Arguments
/// * `state` - The shared `AppState` holding the bus and the validation view.
///
/// # Returns
/// A `ValidationReport` with per-row verdicts and the valid/invalid counts.
pub(crate) async fn process(state: web::Data<AppState>) -> impl Responder {
    let report = state.validation.validate(&state.bus);
    debug!(
        "Validation: {} valid, {} invalid",
        report.summary.valid, report.summary.invalid
    );
    HttpResponse::Ok().json(report)
}

/// `GET /api/dispatch/validate`: the last report, `404` when none was taken
/// since the dataset or column last changed.
pub(crate) async fn latest(state: web::Data<AppState>) -> impl Responder {
    match state.validation.latest() {
        Some(report) => HttpResponse::Ok().json(report),
        None => HttpResponse::NotFound().body("No validation since the last change"),
    }
}
