//! Infrastructure layer.
//!
//! Configuration loading and logging setup. Infrastructure code never
//! reaches into the kernel's internals; it only builds and wires the
//! typed configuration the services consume.

pub mod config;
pub mod logging;

pub use config::{ConfigError, ConfigLoader, GastownConfig};
pub use logging::init_logging;
