//! Hubs and the registry that owns them
//!
//! - [`PortAllocator`] hands out the listen ports consumers connect to.
//! - [`Hub`] bridges one consumer spoke and one producer spoke.
//! - [`HubRegistry`] creates, reuses and tears down hubs.

mod hub;
mod ports;
mod registry;

pub use hub::Hub;
pub use ports::{PortAllocator, PortLease};
pub use registry::HubRegistry;
