use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use veriface_remote::{
    RemoteClient, RemoteFaceAnalyzer, RemoteFaceComparer, RemoteFaceEmbedder,
    RemoteLivenessJudge,
};

mod config;
mod dbus_interface;
mod report;
mod session;
mod source;

use config::Config;
use dbus_interface::VerifaceService;
use report::AuditSink;
use session::{spawn_session, Capabilities};
use source::SpoolFrameSource;

/// Frame dimensions the camera collaborator spools at.
const SPOOL_FRAME_WIDTH: u32 = 640;
const SPOOL_FRAME_HEIGHT: u32 = 480;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("verifaced starting");

    let config = Config::from_env();
    let client = RemoteClient::new(
        config.remote_base_url.clone(),
        config.remote_token.clone(),
        config.remote_timeout,
    )?;
    tracing::info!(url = %config.remote_base_url, "remote judgment client ready");

    let caps = Capabilities {
        frames: Arc::new(SpoolFrameSource::new(
            config.frame_spool_dir.clone(),
            SPOOL_FRAME_WIDTH,
            SPOOL_FRAME_HEIGHT,
        )),
        analyzer: Arc::new(RemoteFaceAnalyzer::new(client.clone())),
        embedder: Arc::new(RemoteFaceEmbedder::new(client.clone())),
        liveness: Arc::new(RemoteLivenessJudge::new(client.clone())),
        comparer: Arc::new(RemoteFaceComparer::new(client)),
    };

    let audit = Arc::new(AuditSink::new());
    let session = spawn_session(caps, config.session_config(), audit.clone());

    let service = VerifaceService::new(session, audit);
    let _conn = zbus::connection::Builder::session()?
        .name("org.freedesktop.Veriface1")?
        .serve_at("/org/freedesktop/Veriface1", service)?
        .build()
        .await?;

    tracing::info!("verifaced ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("verifaced shutting down");

    Ok(())
}
