//! Dataset and phone column routes.
//!
//! - `POST /api/dataset/upload`: multipart upload with a `file` field holding a
//!   `.csv`, `.tsv`, `.txt`, `.xlsx` or `.xls` file. The file is parsed into a dataset that
//!   replaces the current one on the bus. Responds with the headers and row
//!   count, or `400` with the ingestion error.
//! - `PUT /api/dataset`: replaces the dataset with a JSON `Dataset`.
//! - `GET /api/dataset`: current dataset (or `null`) and selected column.
//! - `GET /api/dataset/summary`: headers and row count, `404` when empty.
//! - `DELETE /api/dataset`: unloads the dataset.
//! - `PUT /api/dataset/column`: selects the phone column; `null` clears it.
//! - `POST /api/dataset/column/toggle`: selects a column, or clears the
//!   selection when that column is already selected.

use actix_web::web::{delete, get, post, put, scope};
use actix_web::Scope;

mod clear;
mod column;
mod get;
mod put;
mod upload;

const API_PATH: &str = "/api/dataset";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", get().to(get::process))
        .route("", put().to(put::process))
        .route("", delete().to(clear::process))
        .route("/summary", get().to(get::summary))
        .route("/upload", post().to(upload::process))
        .route("/column", put().to(column::set))
        .route("/column/toggle", post().to(column::toggle))
}
