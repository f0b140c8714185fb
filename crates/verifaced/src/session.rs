//! Attempt session engine.
//!
//! One task owns all mutable attempt state. A fixed-period interval
//! drives sampling ticks; analysis is awaited inline in the same task,
//! so a tick that fires while analysis is still suspended is skipped by
//! the interval (`MissedTickBehavior::Skip`), never queued — re-entrancy
//! is structurally impossible rather than guarded by a shared flag.
//! The interval is not polled during finalization, so a new tick can
//! never race an in-flight finalization; it resumes only when
//! finalization aborts back to live capture.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};

use veriface_core::decision::{decide, embedding_distance, MatchInputs};
use veriface_core::gate::GateFeedback;
use veriface_core::signal;
use veriface_core::types::{FrameObservation, MatchDecision};
use veriface_core::{Attempt, Tunables};
use veriface_remote::capability::{
    AttemptOutcome, AttemptReport, CapturedFrame, CompareVerdict, FaceAnalyzer, FaceComparer,
    FaceEmbedder, FrameSource, LivenessJudge, ReasonCode, ResultSink,
};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("an attempt is already running")]
    Busy,
    #[error("session task exited")]
    ChannelClosed,
}

/// Everything the session composes over.
#[derive(Clone)]
pub struct Capabilities {
    pub frames: Arc<dyn FrameSource>,
    pub analyzer: Arc<dyn FaceAnalyzer>,
    pub embedder: Arc<dyn FaceEmbedder>,
    pub liveness: Arc<dyn LivenessJudge>,
    pub comparer: Arc<dyn FaceComparer>,
}

/// Session-level knobs beyond the core tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tunables: Tunables,
    /// Deadline for each remote call during finalization.
    pub remote_timeout: Duration,
    /// Minimum remote liveness confidence; below it the attempt is
    /// rejected as a spoof.
    pub liveness_confidence_floor: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tunables: Tunables::default(),
            remote_timeout: Duration::from_secs(8),
            liveness_confidence_floor: 70,
        }
    }
}

/// Externally visible phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Live,
    Finalizing,
}

/// Snapshot answered to a status query.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub attempt_id: Option<String>,
    pub score: f32,
    pub feedback: Option<GateFeedback>,
}

enum SessionRequest {
    Start {
        reference: Option<Vec<u8>>,
        reply: oneshot::Sender<Result<String, SessionError>>,
    },
    Cancel {
        reply: oneshot::Sender<bool>,
    },
    Recapture {
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<StatusSnapshot>,
    },
}

/// Clone-safe handle to the session task.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionRequest>,
}

impl SessionHandle {
    /// Begin a verification attempt. `reference` is the identity photo
    /// to match against; without one the attempt is liveness-only.
    pub async fn start(&self, reference: Option<Vec<u8>>) -> Result<String, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Start { reference, reply })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Cancel the running attempt. Returns false when idle.
    pub async fn cancel(&self) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Cancel { reply })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Reset the running attempt's state for a fresh capture.
    pub async fn recapture(&self) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Recapture { reply })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    pub async fn status(&self) -> Result<StatusSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Status { reply })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }
}

/// Spawn the session task and return its handle.
pub fn spawn_session(
    caps: Capabilities,
    config: SessionConfig,
    sink: Arc<dyn ResultSink>,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(session_task(caps, config, sink, rx));
    SessionHandle { tx }
}

async fn session_task(
    caps: Capabilities,
    config: SessionConfig,
    sink: Arc<dyn ResultSink>,
    mut rx: mpsc::Receiver<SessionRequest>,
) {
    tracing::info!("session task started");
    while let Some(req) = rx.recv().await {
        match req {
            SessionRequest::Start { reference, reply } => {
                let attempt_id = uuid::Uuid::new_v4().to_string();
                let _ = reply.send(Ok(attempt_id.clone()));
                let report =
                    run_attempt(&caps, &config, &mut rx, attempt_id, reference).await;
                tracing::info!(
                    outcome = ?report.outcome,
                    reason = ?report.reason,
                    score = report.score,
                    similarity = ?report.similarity,
                    "attempt finished"
                );
                sink.report(report).await;
            }
            SessionRequest::Cancel { reply } => {
                let _ = reply.send(false);
            }
            SessionRequest::Recapture { reply } => {
                let _ = reply.send(false);
            }
            SessionRequest::Status { reply } => {
                let _ = reply.send(StatusSnapshot {
                    phase: Phase::Idle,
                    attempt_id: None,
                    score: 0.0,
                    feedback: None,
                });
            }
        }
    }
    tracing::info!("session task exiting");
}

/// What finalization resolved to.
enum Finalized {
    /// Face lost or moved during the re-check: resume the live loop,
    /// no penalty.
    Aborted,
    Terminal {
        outcome: AttemptOutcome,
        reason: ReasonCode,
        decision: Option<MatchDecision>,
    },
}

/// Drive one attempt to its terminal report.
async fn run_attempt(
    caps: &Capabilities,
    config: &SessionConfig,
    rx: &mut mpsc::Receiver<SessionRequest>,
    attempt_id: String,
    reference: Option<Vec<u8>>,
) -> AttemptReport {
    let mut attempt: Option<Attempt> = None;
    let mut last_feedback: Option<GateFeedback> = None;

    let mut ticker = interval(Duration::from_millis(config.tunables.tick_period_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let cancelled_report = |score: f32| AttemptReport {
        attempt_id: attempt_id.clone(),
        outcome: AttemptOutcome::Cancelled,
        reason: ReasonCode::Cancelled,
        similarity: None,
        score,
    };

    loop {
        tokio::select! {
            req = rx.recv() => {
                match req {
                    Some(SessionRequest::Cancel { reply }) => {
                        let _ = reply.send(true);
                        caps.frames.release().await;
                        let score = attempt.as_ref().map_or(0.0, Attempt::score);
                        return cancelled_report(score);
                    }
                    Some(SessionRequest::Recapture { reply }) => {
                        if let Some(a) = attempt.as_mut() {
                            a.reset();
                        }
                        last_feedback = None;
                        let _ = reply.send(true);
                    }
                    Some(SessionRequest::Status { reply }) => {
                        let _ = reply.send(StatusSnapshot {
                            phase: Phase::Live,
                            attempt_id: Some(attempt_id.clone()),
                            score: attempt.as_ref().map_or(0.0, Attempt::score),
                            feedback: last_feedback.clone(),
                        });
                    }
                    Some(SessionRequest::Start { reply, .. }) => {
                        let _ = reply.send(Err(SessionError::Busy));
                    }
                    None => {
                        // control channel closed: tear down as a cancel
                        caps.frames.release().await;
                        let score = attempt.as_ref().map_or(0.0, Attempt::score);
                        return cancelled_report(score);
                    }
                }
            }
            _ = ticker.tick() => {
                let observation = sample(caps).await;
                let Some((frame, observation)) = observation else {
                    continue;
                };

                let a = attempt.get_or_insert_with(|| {
                    Attempt::new(
                        config.tunables.clone(),
                        frame.width as f32,
                        frame.height as f32,
                    )
                });

                let outcome = a.tick(&observation);
                tracing::trace!(
                    score = outcome.score,
                    feedback = ?outcome.feedback,
                    "tick"
                );
                last_feedback = Some(outcome.feedback.clone());

                if outcome.ready() {
                    // sampling stops here; the interval is not polled
                    // again until finalization aborts back to live
                    match finalize(caps, config, a, reference.as_deref()).await {
                        Finalized::Aborted => {
                            a.resume_live();
                            last_feedback = None;
                        }
                        Finalized::Terminal { outcome, reason, decision } => {
                            // a cancel that arrived while finalization
                            // was in flight wins over its outcome
                            if let Some(report) = drain_for_cancel(rx, &attempt_id, a.score()) {
                                caps.frames.release().await;
                                return report;
                            }
                            caps.frames.release().await;
                            return AttemptReport {
                                attempt_id,
                                outcome,
                                reason,
                                similarity: decision.map(|d| d.similarity),
                                score: a.score(),
                            };
                        }
                    }
                }
            }
        }
    }
}

/// Capture and analyze one frame. Transient capture or analysis failures
/// degrade to a skipped sample, they never abort the attempt.
async fn sample(caps: &Capabilities) -> Option<(CapturedFrame, FrameObservation)> {
    let frame = match caps.frames.next_frame().await {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "frame capture failed; skipping sample");
            return None;
        }
    };
    match caps.analyzer.analyze(&frame).await {
        Ok(observation) => Some((frame, observation)),
        Err(e) => {
            tracing::warn!(error = %e, "face analysis failed; treating as no face");
            let timestamp_ms = frame.timestamp_ms;
            Some((frame, FrameObservation { timestamp_ms, face: None }))
        }
    }
}

/// Check for a cancel that raced an in-flight finalization; its result
/// is then discarded.
fn drain_for_cancel(
    rx: &mut mpsc::Receiver<SessionRequest>,
    attempt_id: &str,
    score: f32,
) -> Option<AttemptReport> {
    let mut cancelled = false;
    while let Ok(req) = rx.try_recv() {
        match req {
            SessionRequest::Cancel { reply } => {
                let _ = reply.send(true);
                cancelled = true;
            }
            SessionRequest::Status { reply } => {
                let _ = reply.send(StatusSnapshot {
                    phase: Phase::Finalizing,
                    attempt_id: Some(attempt_id.to_string()),
                    score,
                    feedback: None,
                });
            }
            SessionRequest::Recapture { reply } => {
                let _ = reply.send(false);
            }
            SessionRequest::Start { reply, .. } => {
                let _ = reply.send(Err(SessionError::Busy));
            }
        }
    }
    cancelled.then(|| AttemptReport {
        attempt_id: attempt_id.to_string(),
        outcome: AttemptOutcome::Cancelled,
        reason: ReasonCode::Cancelled,
        similarity: None,
        score,
    })
}

/// The one-shot re-verification and decision sequence.
async fn finalize(
    caps: &Capabilities,
    config: &SessionConfig,
    attempt: &mut Attempt,
    reference: Option<&[u8]>,
) -> Finalized {
    // fresh detection: the face must still be there and still centred
    let Some((frame, observation)) = sample(caps).await else {
        tracing::info!("finalization re-check could not sample; resuming live capture");
        return Finalized::Aborted;
    };
    let Some(face) = observation.face.as_ref() else {
        tracing::info!("face lost during finalization re-check; resuming live capture");
        return Finalized::Aborted;
    };
    let signals = signal::extract(
        face,
        None,
        frame.width as f32,
        frame.height as f32,
        &config.tunables,
    );
    if !signals.centered {
        tracing::info!("face moved off-centre during finalization re-check; resuming live capture");
        return Finalized::Aborted;
    }

    let candidate = frame.data.clone();
    let local_score = attempt.score();
    let challenge_completed = attempt.challenge_complete();

    // remote liveness confirmation; unavailability degrades to local signals
    match tokio::time::timeout(
        config.remote_timeout,
        caps.liveness.confirm(&candidate, local_score, challenge_completed),
    )
    .await
    {
        Ok(Ok(verdict)) => {
            if !verdict.is_live || verdict.confidence < config.liveness_confidence_floor {
                tracing::warn!(
                    confidence = verdict.confidence,
                    reason = %verdict.reason,
                    "remote liveness rejected the capture"
                );
                return Finalized::Terminal {
                    outcome: AttemptOutcome::Failed,
                    reason: ReasonCode::SpoofRejected,
                    decision: None,
                };
            }
            tracing::debug!(confidence = verdict.confidence, "remote liveness confirmed");
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "remote liveness unavailable; proceeding on local signals");
        }
        Err(_) => {
            tracing::warn!("remote liveness timed out; proceeding on local signals");
        }
    }

    // face match against the linked reference, when there is one
    if let Some(reference) = reference {
        let decision = match_faces(caps, config, reference, &candidate).await;
        if !decision.matched {
            return Finalized::Terminal {
                outcome: AttemptOutcome::Failed,
                reason: ReasonCode::FaceMismatch,
                decision: Some(decision),
            };
        }
        attempt.freeze_score(100.0);
        return Finalized::Terminal {
            outcome: AttemptOutcome::Success,
            reason: ReasonCode::Verified,
            decision: Some(decision),
        };
    }

    attempt.freeze_score(100.0);
    Finalized::Terminal {
        outcome: AttemptOutcome::Success,
        reason: ReasonCode::Verified,
        decision: None,
    }
}

/// Gather both match signals and run the decision matrix.
async fn match_faces(
    caps: &Capabilities,
    config: &SessionConfig,
    reference: &[u8],
    candidate: &[u8],
) -> MatchDecision {
    let reference_embedding = embed(caps, config, reference, "reference").await;
    let candidate_embedding = embed(caps, config, candidate, "candidate").await;
    let local_distance = match (reference_embedding, candidate_embedding) {
        (Some(a), Some(b)) => embedding_distance(&a, &b),
        _ => None,
    };

    let remote = match tokio::time::timeout(
        config.remote_timeout,
        caps.comparer.compare(reference, candidate),
    )
    .await
    {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "remote comparison unavailable; deciding locally");
            CompareVerdict { is_match: None, confidence: None, reason: None }
        }
        Err(_) => {
            tracing::warn!("remote comparison timed out; deciding locally");
            CompareVerdict { is_match: None, confidence: None, reason: None }
        }
    };

    decide(&MatchInputs {
        local_distance,
        remote_match: remote.is_match,
        remote_confidence: remote.confidence,
        remote_reason: remote.reason,
    })
}

/// Embed one image, degrading every failure mode to "no embedding".
async fn embed(
    caps: &Capabilities,
    config: &SessionConfig,
    image: &[u8],
    which: &str,
) -> Option<Vec<f32>> {
    match tokio::time::timeout(config.remote_timeout, caps.embedder.embed(image)).await {
        Ok(Ok(embedding)) => {
            if embedding.is_none() {
                tracing::warn!(which, "no single face for embedding");
            }
            embedding
        }
        Ok(Err(e)) => {
            tracing::warn!(which, error = %e, "embedding failed");
            None
        }
        Err(_) => {
            tracing::warn!(which, "embedding timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;
    use veriface_core::types::{Expression, FaceBox, FaceSample, Landmarks};
    use veriface_remote::capability::{
        CapabilityError, FrameSourceError, LivenessVerdict,
    };

    const FRAME_W: u32 = 640;
    const FRAME_H: u32 = 480;

    struct ScriptedFrames {
        counter: AtomicU32,
        released: AtomicBool,
    }

    #[async_trait]
    impl FrameSource for ScriptedFrames {
        async fn next_frame(&self) -> Result<CapturedFrame, FrameSourceError> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(CapturedFrame {
                data: vec![0xff, 0xd8, n as u8],
                width: FRAME_W,
                height: FRAME_H,
                timestamp_ms: n as i64 * 250,
            })
        }

        async fn release(&self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    /// Analyzer that acts out a live, compliant subject: smiles, then
    /// looks surprised, then holds still and centred. Optionally drops
    /// the face for a window of ticks (to exercise the finalization
    /// re-check abort).
    struct ScriptedAnalyzer {
        tick: AtomicU32,
        no_face_window: Option<(u32, u32)>,
    }

    impl ScriptedAnalyzer {
        fn live() -> Self {
            Self { tick: AtomicU32::new(0), no_face_window: None }
        }

        fn with_face_lost(from: u32, until: u32) -> Self {
            Self { tick: AtomicU32::new(0), no_face_window: Some((from, until)) }
        }
    }

    #[async_trait]
    impl FaceAnalyzer for ScriptedAnalyzer {
        async fn analyze(
            &self,
            frame: &CapturedFrame,
        ) -> Result<FrameObservation, CapabilityError> {
            let t = self.tick.fetch_add(1, Ordering::SeqCst);
            if let Some((from, until)) = self.no_face_window {
                if t >= from && t < until {
                    return Ok(FrameObservation {
                        timestamp_ms: frame.timestamp_ms,
                        face: None,
                    });
                }
            }
            let expression = if t < 5 {
                Expression::Happy
            } else if t < 10 {
                Expression::Surprised
            } else {
                Expression::Neutral
            };
            let jitter = if t % 2 == 0 { 1.5 } else { -1.5 };
            let points: Vec<(f32, f32)> = (0..68)
                .map(|i| (200.0 + i as f32 + jitter, 150.0 + i as f32 - jitter))
                .collect();
            let mut expressions = HashMap::new();
            expressions.insert(expression, 0.9);
            Ok(FrameObservation {
                timestamp_ms: frame.timestamp_ms,
                face: Some(FaceSample {
                    bbox: FaceBox {
                        x: 220.0 + jitter * 3.0,
                        y: 140.0 - jitter * 3.0,
                        width: 200.0,
                        height: 200.0,
                    },
                    landmarks: Some(Landmarks::new(points).unwrap()),
                    expressions: Some(expressions),
                    confidence: 0.95,
                }),
            })
        }
    }

    struct FixedEmbedder {
        reference: Vec<f32>,
        candidate: Vec<f32>,
    }

    #[async_trait]
    impl FaceEmbedder for FixedEmbedder {
        async fn embed(&self, image: &[u8]) -> Result<Option<Vec<f32>>, CapabilityError> {
            // reference images in these tests are tagged 0xAA
            if image.first() == Some(&0xAA) {
                Ok(Some(self.reference.clone()))
            } else {
                Ok(Some(self.candidate.clone()))
            }
        }
    }

    struct FixedJudge {
        verdict: Option<LivenessVerdict>,
    }

    #[async_trait]
    impl LivenessJudge for FixedJudge {
        async fn confirm(
            &self,
            _image: &[u8],
            _local_score: f32,
            _challenge_completed: bool,
        ) -> Result<LivenessVerdict, CapabilityError> {
            self.verdict.clone().ok_or(CapabilityError::Timeout)
        }
    }

    /// Judge that parks every confirmation until the test opens the gate,
    /// pinning the session in its finalization await.
    struct GatedJudge {
        gate: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl LivenessJudge for GatedJudge {
        async fn confirm(
            &self,
            _image: &[u8],
            _local_score: f32,
            _challenge_completed: bool,
        ) -> Result<LivenessVerdict, CapabilityError> {
            self.gate.notified().await;
            Ok(LivenessVerdict {
                is_live: true,
                confidence: 92,
                reason: "ok".into(),
            })
        }
    }

    struct FixedComparer {
        verdict: CompareVerdict,
    }

    #[async_trait]
    impl FaceComparer for FixedComparer {
        async fn compare(
            &self,
            _reference: &[u8],
            _candidate: &[u8],
        ) -> Result<CompareVerdict, CapabilityError> {
            Ok(self.verdict.clone())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<AttemptReport>>,
    }

    #[async_trait]
    impl ResultSink for RecordingSink {
        async fn report(&self, report: AttemptReport) {
            self.reports.lock().unwrap().push(report);
        }
    }

    fn capabilities(
        analyzer: ScriptedAnalyzer,
        judge: impl LivenessJudge + 'static,
        comparer: FixedComparer,
    ) -> (Capabilities, Arc<ScriptedFrames>) {
        let frames = Arc::new(ScriptedFrames {
            counter: AtomicU32::new(0),
            released: AtomicBool::new(false),
        });
        let caps = Capabilities {
            frames: frames.clone(),
            analyzer: Arc::new(analyzer),
            embedder: Arc::new(FixedEmbedder {
                reference: vec![1.0, 0.0, 0.0],
                candidate: vec![0.9, 0.1, 0.0],
            }),
            liveness: Arc::new(judge),
            comparer: Arc::new(comparer),
        };
        (caps, frames)
    }

    fn live_judge() -> FixedJudge {
        FixedJudge {
            verdict: Some(LivenessVerdict {
                is_live: true,
                confidence: 92,
                reason: "ok".into(),
            }),
        }
    }

    fn agreeing_comparer() -> FixedComparer {
        FixedComparer {
            verdict: CompareVerdict {
                is_match: Some(true),
                confidence: Some(85),
                reason: None,
            },
        }
    }

    async fn wait_for_report(sink: &RecordingSink) -> AttemptReport {
        for _ in 0..2000 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let reports = sink.reports.lock().unwrap();
            if let Some(report) = reports.first() {
                return report.clone();
            }
        }
        panic!("no report arrived");
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_only_attempt_succeeds() {
        let (caps, frames) = capabilities(ScriptedAnalyzer::live(), live_judge(), agreeing_comparer());
        let sink = Arc::new(RecordingSink::default());
        let handle = spawn_session(caps, SessionConfig::default(), sink.clone());

        handle.start(None).await.unwrap();
        let report = wait_for_report(&sink).await;
        assert_eq!(report.outcome, AttemptOutcome::Success);
        assert_eq!(report.reason, ReasonCode::Verified);
        assert_eq!(report.similarity, None);
        assert_eq!(report.score, 100.0);
        assert!(frames.released.load(Ordering::SeqCst));
        assert_eq!(sink.reports.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_reference_succeeds_with_similarity() {
        let (caps, _) = capabilities(ScriptedAnalyzer::live(), live_judge(), agreeing_comparer());
        let sink = Arc::new(RecordingSink::default());
        let handle = spawn_session(caps, SessionConfig::default(), sink.clone());

        handle.start(Some(vec![0xAA, 1, 2])).await.unwrap();
        let report = wait_for_report(&sink).await;
        assert_eq!(report.outcome, AttemptOutcome::Success);
        assert!(report.similarity.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatch_is_terminal() {
        let comparer = FixedComparer {
            verdict: CompareVerdict {
                is_match: Some(false),
                confidence: Some(90),
                reason: Some("different person".into()),
            },
        };
        let (mut caps, _) = capabilities(ScriptedAnalyzer::live(), live_judge(), comparer);
        // embeddings far apart so the local signal agrees
        caps.embedder = Arc::new(FixedEmbedder {
            reference: vec![1.0, 0.0, 0.0],
            candidate: vec![0.0, 1.0, 0.0],
        });
        let sink = Arc::new(RecordingSink::default());
        let handle = spawn_session(caps, SessionConfig::default(), sink.clone());

        handle.start(Some(vec![0xAA, 1, 2])).await.unwrap();
        let report = wait_for_report(&sink).await;
        assert_eq!(report.outcome, AttemptOutcome::Failed);
        assert_eq!(report.reason, ReasonCode::FaceMismatch);
        assert_eq!(sink.reports.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_liveness_unavailable_degrades_to_local() {
        let judge = FixedJudge { verdict: None }; // every call times out
        let (caps, _) = capabilities(ScriptedAnalyzer::live(), judge, agreeing_comparer());
        let sink = Arc::new(RecordingSink::default());
        let handle = spawn_session(caps, SessionConfig::default(), sink.clone());

        handle.start(None).await.unwrap();
        let report = wait_for_report(&sink).await;
        // remote unavailability is never a user-facing failure
        assert_eq!(report.outcome, AttemptOutcome::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spoof_verdict_rejects() {
        let judge = FixedJudge {
            verdict: Some(LivenessVerdict {
                is_live: false,
                confidence: 95,
                reason: "screen replay".into(),
            }),
        };
        let (caps, _) = capabilities(ScriptedAnalyzer::live(), judge, agreeing_comparer());
        let sink = Arc::new(RecordingSink::default());
        let handle = spawn_session(caps, SessionConfig::default(), sink.clone());

        handle.start(None).await.unwrap();
        let report = wait_for_report(&sink).await;
        assert_eq!(report.outcome, AttemptOutcome::Failed);
        assert_eq!(report.reason, ReasonCode::SpoofRejected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_remote_confidence_rejects() {
        let judge = FixedJudge {
            verdict: Some(LivenessVerdict {
                is_live: true,
                confidence: 40,
                reason: "uncertain".into(),
            }),
        };
        let (caps, _) = capabilities(ScriptedAnalyzer::live(), judge, agreeing_comparer());
        let sink = Arc::new(RecordingSink::default());
        let handle = spawn_session(caps, SessionConfig::default(), sink.clone());

        handle.start(None).await.unwrap();
        let report = wait_for_report(&sink).await;
        assert_eq!(report.reason, ReasonCode::SpoofRejected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_face_lost_during_recheck_resumes_and_recovers() {
        // the gate opens around tick 11-13; losing the face for a window
        // right after forces the finalization re-check to abort, then
        // the live loop resumes and completes once the face is back
        let analyzer = ScriptedAnalyzer::with_face_lost(12, 30);
        let (caps, _) = capabilities(analyzer, live_judge(), agreeing_comparer());
        let sink = Arc::new(RecordingSink::default());
        let handle = spawn_session(caps, SessionConfig::default(), sink.clone());

        handle.start(None).await.unwrap();
        let report = wait_for_report(&sink).await;
        assert_eq!(report.outcome, AttemptOutcome::Success);
        assert_eq!(sink.reports.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_reports_cancelled_exactly_once() {
        let (caps, frames) = capabilities(ScriptedAnalyzer::live(), live_judge(), agreeing_comparer());
        let sink = Arc::new(RecordingSink::default());
        let handle = spawn_session(caps, SessionConfig::default(), sink.clone());

        handle.start(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(handle.cancel().await.unwrap());
        let report = wait_for_report(&sink).await;
        assert_eq!(report.outcome, AttemptOutcome::Cancelled);
        assert_eq!(report.reason, ReasonCode::Cancelled);
        assert!(frames.released.load(Ordering::SeqCst));
        assert_eq!(sink.reports.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_finalization_wins_and_releases() {
        // park finalization inside the liveness await, queue a cancel,
        // then let finalization complete: the cancel must win, the frame
        // source must be released, and exactly one report must land
        let gate = Arc::new(tokio::sync::Notify::new());
        let judge = GatedJudge { gate: gate.clone() };
        let (caps, frames) = capabilities(ScriptedAnalyzer::live(), judge, agreeing_comparer());
        let sink = Arc::new(RecordingSink::default());
        let config = SessionConfig {
            remote_timeout: Duration::from_secs(3600),
            ..SessionConfig::default()
        };
        let handle = spawn_session(caps, config, sink.clone());

        handle.start(None).await.unwrap();
        // well past the point where the capture gate opens and the
        // session parks in the gated confirmation
        tokio::time::sleep(Duration::from_secs(5)).await;

        let canceller = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.cancel().await.unwrap() })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        gate.notify_one();

        assert!(canceller.await.unwrap());
        let report = wait_for_report(&sink).await;
        assert_eq!(report.outcome, AttemptOutcome::Cancelled);
        assert_eq!(report.reason, ReasonCode::Cancelled);
        assert!(frames.released.load(Ordering::SeqCst));
        assert_eq!(sink.reports.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_when_idle_returns_false() {
        let (caps, _) = capabilities(ScriptedAnalyzer::live(), live_judge(), agreeing_comparer());
        let sink = Arc::new(RecordingSink::default());
        let handle = spawn_session(caps, SessionConfig::default(), sink);
        assert!(!handle.cancel().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_busy_is_rejected() {
        let (caps, _) = capabilities(ScriptedAnalyzer::live(), live_judge(), agreeing_comparer());
        let sink = Arc::new(RecordingSink::default());
        let handle = spawn_session(caps, SessionConfig::default(), sink);

        handle.start(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(matches!(handle.start(None).await, Err(SessionError::Busy)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reflects_live_phase() {
        let (caps, _) = capabilities(ScriptedAnalyzer::live(), live_judge(), agreeing_comparer());
        let sink = Arc::new(RecordingSink::default());
        let handle = spawn_session(caps, SessionConfig::default(), sink);

        let idle = handle.status().await.unwrap();
        assert_eq!(idle.phase, Phase::Idle);

        let id = handle.start(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        let live = handle.status().await.unwrap();
        assert_eq!(live.phase, Phase::Live);
        assert_eq!(live.attempt_id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recapture_resets_progress() {
        let (caps, _) = capabilities(ScriptedAnalyzer::live(), live_judge(), agreeing_comparer());
        let sink = Arc::new(RecordingSink::default());
        let handle = spawn_session(caps, SessionConfig::default(), sink.clone());

        handle.start(None).await.unwrap();
        // let the challenge make progress, then wipe it
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(handle.recapture().await.unwrap());
        let status = handle.status().await.unwrap();
        assert!(status.score <= 30.0, "score {} not reset", status.score);
        // the scripted analyzer has moved past its expressive phase,
        // so the reset challenge can never complete again
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(sink.reports.lock().unwrap().is_empty());
    }
}
