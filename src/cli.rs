//! Command line definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ControllerConfig;

/// Spot-price driven relay controller.
#[derive(Debug, Parser)]
#[command(name = "pricecutter")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Device identifier, overrides `control.device_mac`.
    #[arg(long)]
    pub device_mac: Option<String>,

    /// Client tag, overrides `control.client`.
    #[arg(long)]
    pub client: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the fetch loop and drive the relay until interrupted.
    Run {
        /// Also serve the JSON status API.
        #[arg(long)]
        serve: bool,
        /// Status API port, overrides `api.port`.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Fetch once, actuate the current state, print status, and exit.
    Once {
        /// Write the price-annotated timeline as CSV.
        #[arg(long)]
        timeline_out: Option<PathBuf>,
    },
}

impl Cli {
    /// Applies command line overrides on top of `config`.
    pub fn apply_overrides(&self, config: &mut ControllerConfig) {
        if let Some(mac) = &self.device_mac {
            config.control.device_mac.clone_from(mac);
        }
        if let Some(client) = &self.client {
            config.control.client.clone_from(client);
        }
        if let Commands::Run {
            port: Some(port), ..
        } = self.command
        {
            config.api.port = port;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_with_overrides() {
        let cli = Cli::parse_from([
            "pricecutter",
            "--config",
            "pricecutter.toml",
            "--device-mac",
            "001122334455",
            "run",
            "--serve",
            "--port",
            "8081",
        ]);
        assert_eq!(cli.config.as_deref().and_then(|p| p.to_str()), Some("pricecutter.toml"));
        assert!(matches!(cli.command, Commands::Run { serve: true, port: Some(8081) }));

        let mut cfg = ControllerConfig::default();
        cli.apply_overrides(&mut cfg);
        assert_eq!(cfg.control.device_mac, "001122334455");
        assert_eq!(cfg.api.port, 8081);
        assert!(cfg.control.client.starts_with("pricecutter"));
    }

    #[test]
    fn once_with_timeline_export() {
        let cli = Cli::parse_from(["pricecutter", "--client", "bench", "once", "--timeline-out", "t.csv"]);
        let Commands::Once { timeline_out } = &cli.command else {
            panic!("expected the once subcommand");
        };
        assert_eq!(timeline_out.as_deref().and_then(|p| p.to_str()), Some("t.csv"));

        let mut cfg = ControllerConfig::default();
        cli.apply_overrides(&mut cfg);
        assert_eq!(cfg.control.client, "bench");
        assert_eq!(cfg.api.port, 3000);
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["pricecutter"]).is_err());
    }
}
