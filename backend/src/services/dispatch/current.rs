use actix_web::{web, HttpResponse, Responder};

use crate::app::AppState;

/// `GET /api/dispatch/current`: phase, live or last run, and the verdicts of
/// the last blocked start.
pub(crate) async fn process(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.dispatcher.current())
}
