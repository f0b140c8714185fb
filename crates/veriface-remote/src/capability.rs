//! Capability seams of the verification pipeline.
//!
//! Every collaborator the session engine talks to — the frame source,
//! the analysis and embedding models, the two remote judgments and the
//! result consumer — is an object-safe async trait, so the engine is
//! testable with in-process fakes and deployable against whatever
//! backs the capability in production.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use veriface_core::types::FrameObservation;

/// One captured frame: encoded image bytes plus dimensions.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Encoded image (JPEG or PNG) as delivered by the camera collaborator.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: i64,
}

/// Verdict of the remote liveness-confidence capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessVerdict {
    pub is_live: bool,
    /// Confidence in [0, 100].
    pub confidence: u8,
    pub reason: String,
}

/// Verdict of the remote face-comparison capability. Both fields are
/// nullable: the remote may decline to answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareVerdict {
    pub is_match: Option<bool>,
    pub confidence: Option<u8>,
    pub reason: Option<String>,
}

/// Terminal outcome of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Failed,
    Cancelled,
}

/// Machine-readable reason attached to every terminal report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Verified,
    SpoofRejected,
    FaceMismatch,
    Cancelled,
}

/// The one report every attempt ends with, delivered exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptReport {
    pub attempt_id: String,
    pub outcome: AttemptOutcome,
    pub reason: ReasonCode,
    /// Face-match similarity in [0, 100], when a reference was linked.
    pub similarity: Option<u8>,
    /// Liveness score at the end of the attempt.
    pub score: f32,
}

/// Live frame supplier (the camera/consent collaborator's seam).
/// No frame is ever delivered before consent; that guarantee lives on
/// the far side of this trait.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn next_frame(&self) -> Result<CapturedFrame, FrameSourceError>;
    /// Release the underlying capture resource.
    async fn release(&self);
}

#[derive(Debug, thiserror::Error)]
pub enum FrameSourceError {
    #[error("no frame available: {0}")]
    Unavailable(String),
    #[error("frame source closed")]
    Closed,
}

/// Face-analysis model: one frame in, one observation out.
#[async_trait]
pub trait FaceAnalyzer: Send + Sync {
    async fn analyze(&self, frame: &CapturedFrame) -> Result<FrameObservation, CapabilityError>;
}

/// Face-embedding model: image in, fixed-length vector out.
/// `None` when the image holds zero or more than one face.
#[async_trait]
pub trait FaceEmbedder: Send + Sync {
    async fn embed(&self, image: &[u8]) -> Result<Option<Vec<f32>>, CapabilityError>;
}

/// Remote liveness confirmation.
#[async_trait]
pub trait LivenessJudge: Send + Sync {
    async fn confirm(
        &self,
        image: &[u8],
        local_score: f32,
        challenge_completed: bool,
    ) -> Result<LivenessVerdict, CapabilityError>;
}

/// Remote face comparison.
#[async_trait]
pub trait FaceComparer: Send + Sync {
    async fn compare(
        &self,
        reference: &[u8],
        candidate: &[u8],
    ) -> Result<CompareVerdict, CapabilityError>;
}

/// Terminal-result consumer (session persistence, webhooks — out of this
/// repository's scope, behind this seam).
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn report(&self, report: AttemptReport);
}

/// Failure of a model or remote capability. Remote unavailability is
/// expected-degraded, never surfaced to the user as a failure.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("capability timed out")]
    Timeout,
    #[error("transport: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}
