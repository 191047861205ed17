//! Service layer between the REST front-end and the hub registry

mod translator_service;

pub use translator_service::*;
