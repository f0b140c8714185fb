//! Shared HTTP plumbing for the remote judgment endpoints.

use std::time::Duration;

use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::capability::CapabilityError;

/// Default per-request timeout. Each call carries its own deadline; a
/// blown deadline degrades the caller to local-only signals.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Thin wrapper over a reqwest client bound to one judgment API.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CapabilityError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CapabilityError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// POST a JSON body to `path` and decode a JSON response.
    pub async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, CapabilityError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut req = self.http.post(&url).json(body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                CapabilityError::Timeout
            } else {
                CapabilityError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CapabilityError::Transport(format!("{url}: HTTP {status}")));
        }

        resp.json::<R>()
            .await
            .map_err(|e| CapabilityError::Malformed(e.to_string()))
    }
}

/// Images travel base64-encoded inside JSON bodies.
pub(crate) fn encode_image(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
