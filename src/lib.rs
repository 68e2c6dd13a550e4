// Kodo Bindings Library
//
// This library contains the finite field arithmetic, the network coding
// engines and the capability-driven binding generator that publishes
// every engine variant as a named, callable surface.

pub mod app_config;
pub mod bindings;
pub mod codes;
pub mod demo;
pub mod error;
pub mod field;
pub mod logger;

pub use bindings::{assemble, BindingsConfig, Module, Value};
pub use error::{Error, Result};

/// Crate version, as published in module metadata.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
