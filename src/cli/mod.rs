use crate::config::Config;
use crate::ingest::sdp;
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cliprec")]
#[command(about = "Per-user pre-roll clip recorder for group voice calls", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of the default location
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run the recorder service (default)
    Serve,
    /// Print version information
    Version,
    /// Print the effective configuration as TOML
    Config,
    /// Print the SDP handed to the decoder for a port
    Sdp(SdpCliArgs),
}

#[derive(ClapArgs, Debug)]
pub struct SdpCliArgs {
    /// RTP port the decoder would listen on
    #[arg(short, long)]
    pub port: u16,
}

pub fn handle_config_command(config: &Config) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}

pub fn handle_sdp_command(config: &Config, args: SdpCliArgs) -> Result<()> {
    print!(
        "{}",
        sdp::receive_only(&config.ports.host, args.port, &config.decoder)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sdp_command() {
        let cli = Cli::parse_from(["cliprec", "--config", "/tmp/c.toml", "sdp", "--port", "40000"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        match cli.command {
            Some(CliCommand::Sdp(args)) => assert_eq!(args.port, 40000),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_no_command_means_serve() {
        let cli = Cli::parse_from(["cliprec", "-v"]);
        assert!(cli.verbose);
        assert!(cli.command.is_none());
    }
}
