//! REST API for the translator hub

mod health;
mod responses;
mod rest;

pub use health::*;
pub use responses::*;
pub use rest::*;
