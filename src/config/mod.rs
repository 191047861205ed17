//! Configuration module for the translator hub
//!
//! Supports loading configuration from TOML files and environment variables.

mod settings;

pub use settings::*;
