use anyhow::Result;
use clap::Parser;
use cliprec::{
    app,
    cli::{handle_config_command, handle_sdp_command, Cli, CliCommand},
    config::Config,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Some(CliCommand::Version) = cli.command {
        println!("cliprec {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Some(CliCommand::Config) => handle_config_command(&config),
        Some(CliCommand::Sdp(args)) => handle_sdp_command(&config, args),
        Some(CliCommand::Serve) | Some(CliCommand::Version) | None => app::run_service(config).await,
    }
}
