use actix_web::{web, HttpResponse, Responder};

use crate::app::AppState;

pub async fn process(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.preview.current())
}
