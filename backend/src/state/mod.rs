//! Shared state propagated between the upload, compose, preview and send
//! surfaces without any of them referencing each other.

mod bus;
mod observable;

pub use bus::{Snapshot, StateBus};
pub use observable::Subscription;
