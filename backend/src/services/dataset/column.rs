use actix_web::{web, HttpResponse, Responder};
use common::requests::{SetColumnRequest, ToggleColumnRequest};
use common::responses::ColumnView;

use crate::app::AppState;

/// `PUT /api/dataset/column`
pub async fn set(payload: web::Json<SetColumnRequest>, state: web::Data<AppState>) -> impl Responder {
    state.bus.set_column(payload.into_inner().column);
    HttpResponse::Ok().json(ColumnView {
        column: state.bus.column(),
    })
}

/// `POST /api/dataset/column/toggle`
pub async fn toggle(
    payload: web::Json<ToggleColumnRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let column = state.bus.toggle_column(&payload.column);
    HttpResponse::Ok().json(ColumnView { column })
}
