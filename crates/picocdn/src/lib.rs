//! pico-cdn node: an HTTP gateway over [`picostore`].
//!
//! A master accepts authenticated multipart uploads and serves them back by
//! id. A slave serves a store directory replicated from a master and
//! periodically refreshes its catalog.

pub mod config;
pub mod error;
pub mod server;
pub mod telemetry;
pub mod web;

pub use config::{NodeConfig, NodeMode};
pub use error::ApiError;
pub use web::{router, WebState};
