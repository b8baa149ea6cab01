//! Read-side views kept in sync with the state bus.
//!
//! A surface subscribes when it is attached and keeps its own copy of the
//! fields it needs. Dropping the surface drops its subscriptions.

mod preview;
mod validation;

pub use preview::PreviewSurface;
pub use validation::ValidationView;
