//! Remote face-analysis and face-embedding clients.
//!
//! Both models are consumed as black boxes over the same judgment API
//! the liveness and comparison endpoints live on. Analysis runs once per
//! sampling tick, so its latency directly paces the pipeline — the
//! scheduler skips ticks that fire while a call is still in flight.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use veriface_core::types::{
    Expression, FaceBox, FaceSample, FrameObservation, Landmarks,
};

use crate::capability::{CapabilityError, CapturedFrame, FaceAnalyzer, FaceEmbedder};
use crate::client::{encode_image, RemoteClient};

#[derive(Serialize)]
struct AnalyzeRequest {
    image: String,
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    face: Option<AnalyzedFace>,
}

#[derive(Deserialize)]
struct AnalyzedFace {
    bbox: FaceBox,
    landmarks: Option<Vec<(f32, f32)>>,
    expressions: Option<std::collections::HashMap<Expression, f32>>,
    confidence: f32,
}

/// HTTP implementation of [`FaceAnalyzer`].
#[derive(Debug, Clone)]
pub struct RemoteFaceAnalyzer {
    client: RemoteClient,
}

impl RemoteFaceAnalyzer {
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FaceAnalyzer for RemoteFaceAnalyzer {
    async fn analyze(&self, frame: &CapturedFrame) -> Result<FrameObservation, CapabilityError> {
        let body = AnalyzeRequest {
            image: encode_image(&frame.data),
            width: frame.width,
            height: frame.height,
        };
        let resp: AnalyzeResponse = self.client.post_json("faces/analyze", &body).await?;

        let face = match resp.face {
            Some(f) => {
                // a malformed landmark set degrades to landmark-free
                // analysis rather than failing the tick
                let landmarks = f.landmarks.and_then(|points| {
                    Landmarks::new(points)
                        .map_err(|e| tracing::warn!(error = %e, "dropping landmarks"))
                        .ok()
                });
                Some(FaceSample {
                    bbox: f.bbox,
                    landmarks,
                    expressions: f.expressions,
                    confidence: f.confidence,
                })
            }
            None => None,
        };

        Ok(FrameObservation { timestamp_ms: frame.timestamp_ms, face })
    }
}

#[derive(Serialize)]
struct EmbedRequest {
    image: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    /// Null when the image held zero or more than one face.
    embedding: Option<Vec<f32>>,
}

/// HTTP implementation of [`FaceEmbedder`].
#[derive(Debug, Clone)]
pub struct RemoteFaceEmbedder {
    client: RemoteClient,
}

impl RemoteFaceEmbedder {
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FaceEmbedder for RemoteFaceEmbedder {
    async fn embed(&self, image: &[u8]) -> Result<Option<Vec<f32>>, CapabilityError> {
        let body = EmbedRequest { image: encode_image(image) };
        let resp: EmbedResponse = self.client.post_json("faces/embed", &body).await?;
        Ok(resp.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_response_no_face() {
        let resp: AnalyzeResponse = serde_json::from_str(r#"{"face": null}"#).unwrap();
        assert!(resp.face.is_none());
    }

    #[test]
    fn test_analyze_response_with_face() {
        let points: Vec<(f32, f32)> = (0..68).map(|i| (i as f32, i as f32)).collect();
        let json = serde_json::json!({
            "face": {
                "bbox": {"x": 10.0, "y": 20.0, "width": 100.0, "height": 120.0},
                "landmarks": points,
                "expressions": {"happy": 0.8, "neutral": 0.2},
                "confidence": 0.93
            }
        });
        let resp: AnalyzeResponse = serde_json::from_value(json).unwrap();
        let face = resp.face.unwrap();
        assert_eq!(face.landmarks.unwrap().len(), 68);
        assert!(face.expressions.unwrap().contains_key(&Expression::Happy));
    }

    #[test]
    fn test_embed_response_null_on_ambiguous() {
        let resp: EmbedResponse = serde_json::from_str(r#"{"embedding": null}"#).unwrap();
        assert!(resp.embedding.is_none());
    }
}
