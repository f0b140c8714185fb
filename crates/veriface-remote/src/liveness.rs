//! Remote liveness-confidence client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::{CapabilityError, LivenessJudge, LivenessVerdict};
use crate::client::{encode_image, RemoteClient};

#[derive(Serialize)]
struct LivenessRequest {
    image: String,
    local_score: f32,
    challenge_completed: bool,
}

#[derive(Deserialize)]
struct LivenessResponse {
    is_live: bool,
    confidence: f32,
    #[serde(default)]
    reason: String,
}

/// HTTP implementation of [`LivenessJudge`].
#[derive(Debug, Clone)]
pub struct RemoteLivenessJudge {
    client: RemoteClient,
}

impl RemoteLivenessJudge {
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LivenessJudge for RemoteLivenessJudge {
    async fn confirm(
        &self,
        image: &[u8],
        local_score: f32,
        challenge_completed: bool,
    ) -> Result<LivenessVerdict, CapabilityError> {
        let body = LivenessRequest {
            image: encode_image(image),
            local_score,
            challenge_completed,
        };
        let resp: LivenessResponse = self.client.post_json("liveness/confirm", &body).await?;
        Ok(LivenessVerdict {
            is_live: resp.is_live,
            confidence: resp.confidence.clamp(0.0, 100.0).round() as u8,
            reason: resp.reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_confidence_clamped() {
        let resp: LivenessResponse =
            serde_json::from_str(r#"{"is_live": true, "confidence": 132.5}"#).unwrap();
        assert_eq!(resp.confidence.clamp(0.0, 100.0).round() as u8, 100);
        assert_eq!(resp.reason, "");
    }
}
