//! Per-attempt pipeline state.
//!
//! One `Attempt` owns every mutable aggregate of a capture attempt —
//! scorer, challenge, anti-spoof monitor, frame history, gate — and is
//! the single entry point the session scheduler drives each tick. Data
//! flows strictly downward: signal extraction feeds the scorer, challenge
//! and monitor; their outputs feed the gate.

use crate::challenge::ExpressionChallenge;
use crate::gate::{CaptureGate, GateFeedback, GateInputs};
use crate::history::FrameHistory;
use crate::scorer::{FrameVotes, LivenessScorer};
use crate::signal::{self, FrameSignals};
use crate::spoof::AntiSpoofMonitor;
use crate::tunables::Tunables;
use crate::types::{FaceSample, FrameObservation, ObservationSummary};

/// Everything one tick produced, for feedback and audit.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub feedback: GateFeedback,
    pub score: f32,
    pub spoof_flagged: bool,
    pub challenge_progress: (usize, usize),
    /// Extracted signals, absent on a no-face tick.
    pub signals: Option<FrameSignals>,
}

impl TickOutcome {
    /// Whether this tick opened the capture gate.
    pub fn ready(&self) -> bool {
        matches!(self.feedback, GateFeedback::Ready)
    }
}

/// Mutable state of one capture attempt.
pub struct Attempt {
    tunables: Tunables,
    frame_width: f32,
    frame_height: f32,
    scorer: LivenessScorer,
    challenge: ExpressionChallenge,
    monitor: AntiSpoofMonitor,
    history: FrameHistory,
    gate: CaptureGate,
    previous: Option<FaceSample>,
}

impl Attempt {
    pub fn new(tunables: Tunables, frame_width: f32, frame_height: f32) -> Self {
        let challenge = ExpressionChallenge::new(
            tunables.required_expressions.clone(),
            tunables.challenge_hold_ticks,
            tunables.expression_min_probability,
        );
        let monitor = AntiSpoofMonitor::new(&tunables);
        let gate = CaptureGate::new(
            tunables.required_streak(),
            tunables.score_threshold,
            tunables.center_tolerance,
        );
        Self {
            tunables,
            frame_width,
            frame_height,
            scorer: LivenessScorer::new(),
            challenge,
            monitor,
            history: FrameHistory::new(),
            gate,
            previous: None,
        }
    }

    /// Process one observation and return the gate verdict for the tick.
    pub fn tick(&mut self, observation: &FrameObservation) -> TickOutcome {
        let Some(face) = observation.face.as_ref() else {
            let score = self.scorer.decay();
            let feedback = self.gate.observe_no_face();
            self.previous = None;
            return TickOutcome {
                feedback,
                score,
                spoof_flagged: false,
                challenge_progress: self.challenge.progress(),
                signals: None,
            };
        };

        let signals = signal::extract(
            face,
            self.previous.as_ref(),
            self.frame_width,
            self.frame_height,
            &self.tunables,
        );

        let challenge_tick = self.challenge.observe(face.dominant_expression());
        let spoof = self.monitor.observe(
            signals.micro_movement,
            signals.head_pose,
            challenge_tick.complete,
        );

        self.history.push(ObservationSummary {
            center: face.bbox.center(),
            width: face.bbox.width,
            eye_aspect_ratio: signals.eye_aspect_ratio,
            dominant_expression: face.dominant_expression().map(|(label, _)| label),
            confidence: face.confidence,
        });
        let variance = self.history.position_variance();

        let score = self.scorer.update(FrameVotes {
            confident: face.confidence >= self.tunables.min_confidence,
            moving: signals.movement > self.tunables.movement_threshold,
            positional_variance: variance
                .is_some_and(|v| v > self.tunables.position_variance_min),
            challenge_complete: challenge_tick.complete,
            challenge_advanced: challenge_tick.advanced,
            spoof_suspected: spoof.flagged,
        });

        let feedback = self.gate.evaluate(GateInputs {
            signals: &signals,
            spoof: &spoof,
            challenge_complete: challenge_tick.complete,
            challenge_target: challenge_tick.target,
            challenge_progress: self.challenge.progress(),
            score,
        });

        self.previous = Some(face.clone());

        TickOutcome {
            feedback,
            score,
            spoof_flagged: spoof.flagged,
            challenge_progress: self.challenge.progress(),
            signals: Some(signals),
        }
    }

    pub fn score(&self) -> f32 {
        self.scorer.score()
    }

    pub fn challenge_complete(&self) -> bool {
        self.challenge.is_complete()
    }

    /// Freeze the score at the successful-capture value.
    pub fn freeze_score(&mut self, value: f32) {
        self.scorer.freeze(value);
    }

    /// Reopen the gate after an aborted finalization; no other state is
    /// touched, so the attempt resumes without penalty.
    pub fn resume_live(&mut self) {
        self.gate.reopen();
    }

    /// Full reset for an explicit recapture.
    pub fn reset(&mut self) {
        self.scorer.reset();
        self.challenge.reset();
        self.monitor.reset();
        self.history.clear();
        self.gate.reset();
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Expression, FaceBox, FrameObservation, Landmarks};
    use std::collections::HashMap;

    const FRAME_W: f32 = 640.0;
    const FRAME_H: f32 = 480.0;

    /// A well-centred, properly-sized face with jittered landmarks and a
    /// chosen dominant expression.
    fn live_observation(tick: u32, expression: Expression) -> FrameObservation {
        let jitter = if tick % 2 == 0 { 1.5 } else { -1.5 };
        let points: Vec<(f32, f32)> = (0..68)
            .map(|i| (200.0 + i as f32 + jitter, 150.0 + i as f32 - jitter))
            .collect();
        let mut expressions = HashMap::new();
        expressions.insert(expression, 0.9);
        expressions.insert(Expression::Neutral, 0.1);
        FrameObservation {
            timestamp_ms: tick as i64 * 250,
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
        }
    }

    fn no_face(tick: u32) -> FrameObservation {
        FrameObservation { timestamp_ms: tick as i64 * 250, face: None }
    }

    fn attempt() -> Attempt {
        Attempt::new(Tunables::default(), FRAME_W, FRAME_H)
    }

    #[test]
    fn test_full_attempt_reaches_ready() {
        let mut a = attempt();
        let mut tick = 0u32;
        let mut ready_at = None;
        // answer the script: happy then surprised, then hold neutral
        for _ in 0..4 {
            a.tick(&live_observation(tick, Expression::Happy));
            tick += 1;
        }
        for _ in 0..4 {
            a.tick(&live_observation(tick, Expression::Surprised));
            tick += 1;
        }
        assert!(a.challenge_complete());
        for _ in 0..60 {
            let out = a.tick(&live_observation(tick, Expression::Neutral));
            tick += 1;
            assert!(out.score >= 0.0 && out.score <= 100.0);
            if out.ready() {
                ready_at = Some(tick);
                break;
            }
        }
        assert!(ready_at.is_some(), "gate never opened");
    }

    #[test]
    fn test_no_face_tick_decays_score() {
        let mut a = attempt();
        for t in 0..8 {
            a.tick(&live_observation(t, Expression::Happy));
        }
        let before = a.score();
        let out = a.tick(&no_face(8));
        assert!(matches!(out.feedback, GateFeedback::NoFace));
        assert!((before - out.score - 5.0).abs() < 1e-4 || out.score == 0.0);
    }

    #[test]
    fn test_score_always_bounded() {
        let mut a = attempt();
        for t in 0..200 {
            let out = if t % 9 == 0 {
                a.tick(&no_face(t))
            } else {
                a.tick(&live_observation(t, Expression::Happy))
            };
            assert!(out.score >= 0.0 && out.score <= 100.0);
        }
    }

    #[test]
    fn test_no_face_after_movement_clears_previous() {
        let mut a = attempt();
        a.tick(&live_observation(0, Expression::Happy));
        a.tick(&no_face(1));
        // next tick has no previous frame: temporal signals read zero
        let out = a.tick(&live_observation(2, Expression::Happy));
        let signals = out.signals.unwrap();
        assert_eq!(signals.movement, 0.0);
        assert_eq!(signals.micro_movement, 0.0);
    }

    #[test]
    fn test_challenge_prompt_shown_before_complete() {
        let mut a = attempt();
        let out = a.tick(&live_observation(0, Expression::Neutral));
        assert!(matches!(
            out.feedback,
            GateFeedback::HoldExpression { target: Expression::Happy, .. }
        ));
    }

    #[test]
    fn test_resume_live_allows_retrigger() {
        let mut a = attempt();
        let mut tick = 0u32;
        for _ in 0..4 {
            a.tick(&live_observation(tick, Expression::Happy));
            tick += 1;
        }
        for _ in 0..4 {
            a.tick(&live_observation(tick, Expression::Surprised));
            tick += 1;
        }
        let mut fired = false;
        for _ in 0..60 {
            let out = a.tick(&live_observation(tick, Expression::Neutral));
            tick += 1;
            if out.ready() {
                fired = true;
                break;
            }
        }
        assert!(fired);
        // gate latched while finalization is in flight
        let out = a.tick(&live_observation(tick, Expression::Neutral));
        assert!(matches!(out.feedback, GateFeedback::Finalizing));
        a.resume_live();
        let mut refired = false;
        for _ in 0..20 {
            tick += 1;
            if a.tick(&live_observation(tick, Expression::Neutral)).ready() {
                refired = true;
                break;
            }
        }
        assert!(refired);
    }

    #[test]
    fn test_reset_starts_over() {
        let mut a = attempt();
        for t in 0..10 {
            a.tick(&live_observation(t, Expression::Happy));
        }
        a.reset();
        assert_eq!(a.score(), 0.0);
        assert!(!a.challenge_complete());
        let out = a.tick(&live_observation(99, Expression::Neutral));
        assert!(matches!(
            out.feedback,
            GateFeedback::HoldExpression { target: Expression::Happy, .. }
        ));
    }

    #[test]
    fn test_static_photo_raises_spoof_feedback() {
        let mut a = attempt();
        // identical landmarks every tick, jitter-free: a photograph.
        // Micro-movement must be non-zero but sub-floor, so alternate two
        // nearly identical landmark sets.
        let make = |tick: u32| {
            let eps = if tick % 2 == 0 { 0.001 } else { 0.0 };
            let points: Vec<(f32, f32)> =
                (0..68).map(|i| (200.0 + i as f32 + eps, 150.0 + i as f32)).collect();
            let mut expressions = HashMap::new();
            expressions.insert(Expression::Neutral, 0.95);
            FrameObservation {
                timestamp_ms: tick as i64 * 250,
                face: Some(FaceSample {
                    bbox: FaceBox { x: 220.0, y: 140.0, width: 200.0, height: 200.0 },
                    landmarks: Some(Landmarks::new(points).unwrap()),
                    expressions: Some(expressions),
                    confidence: 0.95,
                }),
            }
        };
        let mut spoofed = false;
        for t in 0..60 {
            let out = a.tick(&make(t));
            if matches!(out.feedback, GateFeedback::SpoofSuspected { .. }) {
                spoofed = true;
                assert!(out.spoof_flagged);
                break;
            }
        }
        assert!(spoofed, "static face never flagged");
    }
}
