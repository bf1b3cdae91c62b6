use crate::api::{ApiServer, BackendLink};
use crate::config::Config;
use crate::ingest::decoder::decoder_available;
use crate::session::{RegistrySettings, SessionRegistry};
use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub async fn run_service(config: Config) -> Result<()> {
    info!("Starting cliprec service");

    if !decoder_available(&config.decoder) {
        warn!(
            "Decoder {:?} not found on PATH; sessions will fail to start until it is installed",
            config.decoder.program
        );
    }

    let settings = RegistrySettings::from_config(&config)?;
    info!("Clips will be written under {:?}", settings.writer.root());

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (registry, handle) = SessionRegistry::new(settings, events_tx);
    let registry_task = tokio::spawn(registry.run());

    let shutdown = CancellationToken::new();
    let api_server = ApiServer::new(&config.server, handle.clone(), BackendLink::new(events_rx));
    let server_shutdown = shutdown.clone();
    let mut server_task = tokio::spawn(async move {
        if let Err(e) = api_server.start(server_shutdown).await {
            error!("API server failed: {}", e);
        }
    });

    info!("cliprec is ready!");
    info!(
        "Backend control channel: ws://{}:{}/ws",
        config.server.host, config.server.port
    );

    let server_exited = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown requested");
            false
        }
        _ = &mut server_task => {
            warn!("API server exited, shutting down");
            true
        }
    };

    shutdown.cancel();
    let _ = handle.shutdown();
    if let Err(e) = registry_task.await {
        error!("Session registry task failed: {}", e);
    }
    if !server_exited {
        let _ = server_task.await;
    }

    info!("cliprec stopped");
    Ok(())
}
