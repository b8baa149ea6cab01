use actix_web::{web, HttpResponse, Responder};

use crate::app::AppState;

/// Unloads the dataset. The template and the column selection are kept.
pub async fn process(state: web::Data<AppState>) -> impl Responder {
    state.bus.clear_dataset();
    HttpResponse::NoContent().finish()
}
