//! # Template Service Module
//!
//! Routes under `/api/template` for the message template held on the bus.
//!
//! ## Registered Routes
//!
//! *   **`GET /`**: current template text.
//! *   **`PUT /`**: replaces the template with `{ text }`. The preview is
//!     recomputed before the response is sent.
//! *   **`POST /insert`**: appends `{{header}}` to the template.
//! *   **`GET /preview`**: the template rendered against the first data row,
//!     the insertable variables and the placeholders matching no header.

mod get;
mod insert;
mod preview;
mod save;

use actix_web::web::{get, post, put, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/template";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", get().to(get::process))
        .route("", put().to(save::process))
        .route("/insert", post().to(insert::process))
        .route("/preview", get().to(preview::process))
}
