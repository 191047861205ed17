//! Service registry integration
//!
//! Advertises the capabilities of external entities in the service registry
//! with this node as their provider, and withdraws them on shutdown.

mod client;
mod entity;
mod node;
mod registration;

pub use client::*;
pub use entity::*;
pub use node::*;
pub use registration::*;
