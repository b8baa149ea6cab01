//! Types shared between the dispatch backend and any client talking to its API.
//!
//! - `model`: the dataset table and per-row validation verdicts.
//! - `jobs`: dispatch run phases, progress and final reports.
//! - `requests` / `responses`: JSON payloads of the HTTP surfaces.

pub mod jobs;
pub mod model;
pub mod requests;
pub mod responses;
