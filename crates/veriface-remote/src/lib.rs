//! veriface-remote — capability seams and HTTP clients.
//!
//! Defines the async traits the session engine composes over (frame
//! source, analysis, embedding, remote judgments, result sink) and the
//! reqwest-backed implementations for the remote judgment API.

pub mod analysis;
pub mod capability;
pub mod client;
pub mod compare;
pub mod liveness;

pub use analysis::{RemoteFaceAnalyzer, RemoteFaceEmbedder};
pub use capability::{
    AttemptOutcome, AttemptReport, CapabilityError, CapturedFrame, CompareVerdict,
    FaceAnalyzer, FaceComparer, FaceEmbedder, FrameSource, FrameSourceError, LivenessJudge,
    LivenessVerdict, ReasonCode, ResultSink,
};
pub use client::{RemoteClient, DEFAULT_TIMEOUT};
pub use compare::RemoteFaceComparer;
pub use liveness::RemoteLivenessJudge;
