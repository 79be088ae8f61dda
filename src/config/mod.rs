//! Exporter configuration.
//!
//! Values are resolved in order of precedence: command-line flag, TOML
//! configuration file, built-in default.

mod cli;
mod file;

pub use cli::Cli;
pub use file::{
    parse_listen_address, ConfigError, FileConfig, GeneratorConfig, MetricsConfig, ServerConfig,
};
