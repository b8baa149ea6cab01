//! HTTP surfaces. Each scope only talks to the shared state held in
//! [`AppState`](crate::app::AppState), never to another scope.

pub mod dataset;
pub mod dispatch;
pub mod template;
