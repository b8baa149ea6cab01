use actix_web::{web, HttpResponse, Responder};
use common::model::dataset::Dataset;
use common::responses::DatasetSummary;

use crate::app::AppState;

/// `PUT /api/dataset`. Header invariants are enforced while deserializing,
/// so a malformed table never reaches the bus.
pub async fn process(payload: web::Json<Dataset>, state: web::Data<AppState>) -> impl Responder {
    let dataset = state.bus.set_dataset(payload.into_inner());
    HttpResponse::Ok().json(DatasetSummary::from(dataset.as_ref()))
}
