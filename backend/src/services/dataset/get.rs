use actix_web::{web, HttpResponse, Responder};
use common::responses::{DatasetSummary, DatasetView};

use crate::app::AppState;

/// The Actix web handler for `GET /api/dataset`.
///
/// # Arguments
/// * `state` - The shared `AppState`; only its bus is read.
///
/// # Returns
/// A `DatasetView` with the current dataset (`null` when none is loaded) and
/// the selected phone column, taken from one consistent snapshot.
pub async fn process(state: web::Data<AppState>) -> impl Responder {
    let snapshot = state.bus.snapshot();
    HttpResponse::Ok().json(DatasetView {
        dataset: snapshot.dataset,
        column: snapshot.column,
    })
}

/// `GET /api/dataset/summary`: headers and row count without the rows, `404`
/// when no dataset is loaded.
pub async fn summary(state: web::Data<AppState>) -> impl Responder {
    match state.bus.dataset() {
        Some(dataset) => HttpResponse::Ok().json(DatasetSummary::from(dataset.as_ref())),
        None => HttpResponse::NotFound().body("No dataset loaded"),
    }
}
