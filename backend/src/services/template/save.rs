use actix_web::{web, HttpResponse, Responder};
use common::requests::SetTemplateRequest;
use common::responses::TemplateView;

use crate::app::AppState;

/// `PUT /api/template`. An empty text is accepted here; dispatch refuses to
/// start without a template.
pub async fn process(
    payload: web::Json<SetTemplateRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let text = payload.into_inner().text;
    state.bus.set_template(text.clone());
    HttpResponse::Ok().json(TemplateView { text })
}
