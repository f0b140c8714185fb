//! Remote face-comparison client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::{CapabilityError, CompareVerdict, FaceComparer};
use crate::client::{encode_image, RemoteClient};

#[derive(Serialize)]
struct CompareRequest {
    reference_image: String,
    candidate_image: String,
}

#[derive(Deserialize)]
struct CompareResponse {
    /// The remote may decline to answer either field.
    is_match: Option<bool>,
    confidence: Option<f32>,
    #[serde(default)]
    reason: Option<String>,
}

/// HTTP implementation of [`FaceComparer`].
#[derive(Debug, Clone)]
pub struct RemoteFaceComparer {
    client: RemoteClient,
}

impl RemoteFaceComparer {
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FaceComparer for RemoteFaceComparer {
    async fn compare(
        &self,
        reference: &[u8],
        candidate: &[u8],
    ) -> Result<CompareVerdict, CapabilityError> {
        let body = CompareRequest {
            reference_image: encode_image(reference),
            candidate_image: encode_image(candidate),
        };
        let resp: CompareResponse = self.client.post_json("faces/compare", &body).await?;
        Ok(CompareVerdict {
            is_match: resp.is_match,
            confidence: resp.confidence.map(|c| c.clamp(0.0, 100.0).round() as u8),
            reason: resp.reason,
        })
    }
}
