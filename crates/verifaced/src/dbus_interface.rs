use std::sync::Arc;

use zbus::interface;

use crate::report::AuditSink;
use crate::session::SessionHandle;

/// D-Bus control surface for the Veriface daemon.
///
/// Bus name: org.freedesktop.Veriface1
/// Object path: /org/freedesktop/Veriface1
pub struct VerifaceService {
    session: SessionHandle,
    audit: Arc<AuditSink>,
}

impl VerifaceService {
    pub fn new(session: SessionHandle, audit: Arc<AuditSink>) -> Self {
        Self { session, audit }
    }
}

#[interface(name = "org.freedesktop.Veriface1")]
impl VerifaceService {
    /// Begin a verification attempt. `reference_path` is the identity
    /// photo to match against; an empty string runs liveness-only.
    /// Returns the attempt id.
    async fn start_verification(&self, reference_path: &str) -> zbus::fdo::Result<String> {
        tracing::info!(reference_path, "start_verification requested");
        let reference = if reference_path.is_empty() {
            None
        } else {
            let bytes = tokio::fs::read(reference_path).await.map_err(|e| {
                zbus::fdo::Error::FileNotFound(format!("{reference_path}: {e}"))
            })?;
            Some(bytes)
        };
        self.session
            .start(reference)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Cancel the running attempt. Returns false when idle.
    async fn cancel(&self) -> zbus::fdo::Result<bool> {
        tracing::info!("cancel requested");
        self.session
            .cancel()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Reset the running attempt for a fresh capture.
    async fn recapture(&self) -> zbus::fdo::Result<bool> {
        tracing::info!("recapture requested");
        self.session
            .recapture()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Current phase, score and feedback, plus the last terminal report.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let snapshot = self
            .session
            .status()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "phase": snapshot.phase,
            "attempt_id": snapshot.attempt_id,
            "score": snapshot.score,
            "feedback": snapshot.feedback,
            "last_result": self.audit.last_report(),
        })
        .to_string())
    }
}
