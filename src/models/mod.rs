//! Data models for the translator
//!
//! Endpoints, canonical messages, hub identity and the error taxonomy.

mod endpoint;
mod error;
mod hub;
mod message;

pub use endpoint::*;
pub use error::*;
pub use hub::*;
pub use message::*;
