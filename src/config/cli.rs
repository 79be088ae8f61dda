//! Command-line flags.

use std::path::PathBuf;

use clap::Parser;

use super::{ConfigError, FileConfig};

/// Demonstration Prometheus exporter with synthetic metrics.
#[derive(Debug, Parser)]
#[command(name = "exporter-demo", version, about)]
pub struct Cli {
    /// The address to listen on for HTTP requests.
    #[arg(long, value_name = "ADDR")]
    pub listen_address: Option<String>,

    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Seconds between generator iterations.
    #[arg(long, value_name = "SECS")]
    pub interval_secs: Option<u64>,

    /// Label value of the `test1` demo gauge.
    #[arg(long, value_name = "VALUE")]
    pub demo_arg: Option<String>,

    /// Seed for reproducible samples.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Cli {
    /// Loads the config file, if any, and applies flags on top.
    pub fn resolve(&self) -> Result<FileConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };

        if let Some(addr) = &self.listen_address {
            config.server.listen_address = addr.clone();
        }
        if let Some(secs) = self.interval_secs {
            config.generator.interval_secs = secs;
        }
        if let Some(seed) = self.seed {
            config.generator.seed = Some(seed);
        }
        if let Some(arg) = &self.demo_arg {
            config.metrics.demo_arg = arg.clone();
        }

        config.validate()?;
        Ok(config)
    }
}
