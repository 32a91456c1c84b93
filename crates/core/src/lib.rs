//! Core business logic for habitgrid.

pub mod services;

pub use services::*;
