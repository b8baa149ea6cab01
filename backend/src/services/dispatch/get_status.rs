use actix_web::{web, HttpResponse, Responder};

use crate::app::AppState;

pub(crate) async fn process(run_id: web::Path<String>, state: web::Data<AppState>) -> impl Responder {
    match state.runs.status(&run_id.into_inner()).await {
        Some(status) => HttpResponse::Ok().json(status),
        None => HttpResponse::NotFound().body("Run ID not found"),
    }
}
