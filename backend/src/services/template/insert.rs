use actix_web::{web, HttpResponse, Responder};
use common::requests::InsertVariableRequest;
use common::responses::TemplateView;

use crate::app::AppState;
use crate::template::placeholder_for;

/// `POST /api/template/insert`: appends `{{header}}` to the template.
pub async fn process(
    payload: web::Json<InsertVariableRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let header = payload.into_inner().header;
    if header.trim().is_empty() {
        return HttpResponse::BadRequest().body("Error: header must not be empty");
    }
    let text = state.bus.append_to_template(&placeholder_for(&header));
    HttpResponse::Ok().json(TemplateView { text })
}
