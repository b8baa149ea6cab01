use actix_web::{web, HttpResponse, Responder};
use common::responses::TemplateView;

use crate::app::AppState;

/// Actix web handler for the `GET /api/template` endpoint.
///
/// # Arguments
/// * `state` - The shared `AppState`; the template is read from its bus.
///
/// # Returns
/// - `200 OK` with a `TemplateView` holding the current text, which is empty
///   until a template is saved.
pub async fn process(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(TemplateView {
        text: state.bus.template(),
    })
}
