//! Core types and wire constants for the radio module driver

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
