use actix_web::{web, HttpResponse, Responder, ResponseError};

use crate::app::AppState;

/// The Actix web handler for `POST /api/dispatch/cancel`.
///
/// Stops the active run before its next row. Rows already handed off stay
/// counted in the returned run. A row whose link was still being opened is
/// added to the stored run, visible through `/current`, once the opener
/// returns.
///
/// # Arguments
/// * `state` - The shared `AppState` holding the dispatcher.
///
/// # Returns
/// - `200 OK` with the frozen `DispatchRun`.
/// - `404 Not Found` when no run is sending.
pub(crate) async fn process(state: web::Data<AppState>) -> impl Responder {
    match state.dispatcher.cancel() {
        Ok(run) => HttpResponse::Ok().json(run),
        Err(e) => HttpResponse::build(e.status_code()).body(format!("Error: {}", e)),
    }
}
