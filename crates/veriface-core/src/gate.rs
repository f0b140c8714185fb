//! Per-tick capture gate.
//!
//! Strict-priority evaluation producing one feedback item per tick plus a
//! one-shot READY trigger. The centred-frame streak is the canonical
//! stability gate: it counts consecutive centred ticks only, independent
//! of the smoothed score.

use serde::Serialize;

use crate::signal::FrameSignals;
use crate::spoof::{SpoofHint, SpoofStatus};
use crate::types::Expression;

/// Correction direction for centring feedback, in true (un-mirrored)
/// frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Left/right inversion for a mirrored preview. Presentation-only:
    /// apply at the display boundary, never inside the pipeline.
    pub fn mirrored(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            other => other,
        }
    }
}

/// One tick's gate verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateFeedback {
    /// No face in frame.
    NoFace,
    /// Off-centre; primary axis first, secondary when both exceed tolerance.
    OffCenter {
        primary: Direction,
        secondary: Option<Direction>,
    },
    TooClose,
    TooFar,
    /// Anti-spoof prompt.
    SpoofSuspected { hint: SpoofPrompt },
    /// Next required expression plus progress.
    HoldExpression {
        target: Expression,
        satisfied: usize,
        required: usize,
    },
    /// Signals are clean but the score has not converged yet.
    KeepLooking,
    /// Counting down the remaining centred ticks.
    HoldStill { remaining_ticks: u32 },
    /// One-shot trigger: begin finalization.
    Ready,
    /// Suppressed ticks while finalization is in flight.
    Finalizing,
}

/// Serializable rendering of [`SpoofHint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpoofPrompt {
    MoveYourHead,
    UseARealFace,
}

impl From<SpoofHint> for SpoofPrompt {
    fn from(hint: SpoofHint) -> Self {
        match hint {
            SpoofHint::MoveYourHead => SpoofPrompt::MoveYourHead,
            SpoofHint::UseARealFace => SpoofPrompt::UseARealFace,
        }
    }
}

/// Inputs the gate needs beyond the raw signals.
#[derive(Debug, Clone, Copy)]
pub struct GateInputs<'a> {
    pub signals: &'a FrameSignals,
    pub spoof: &'a SpoofStatus,
    pub challenge_complete: bool,
    pub challenge_target: Option<Expression>,
    pub challenge_progress: (usize, usize),
    pub score: f32,
}

/// Stateful gate: centred-streak counter plus the one-shot trigger latch.
#[derive(Debug, Clone)]
pub struct CaptureGate {
    centered_streak: u32,
    required_streak: u32,
    score_threshold: f32,
    center_tolerance: f32,
    triggered: bool,
}

impl CaptureGate {
    pub fn new(required_streak: u32, score_threshold: f32, center_tolerance: f32) -> Self {
        Self {
            centered_streak: 0,
            required_streak: required_streak.max(1),
            score_threshold,
            center_tolerance,
            triggered: false,
        }
    }

    pub fn centered_streak(&self) -> u32 {
        self.centered_streak
    }

    /// Record a tick with no detected face. Resets the streak.
    pub fn observe_no_face(&mut self) -> GateFeedback {
        self.centered_streak = 0;
        if self.triggered {
            return GateFeedback::Finalizing;
        }
        GateFeedback::NoFace
    }

    /// Evaluate one tick with a detected face. First matching rule wins.
    pub fn evaluate(&mut self, inputs: GateInputs<'_>) -> GateFeedback {
        // streak accounting happens regardless of which rule fires
        if inputs.signals.centered {
            self.centered_streak += 1;
        } else {
            self.centered_streak = 0;
        }

        if self.triggered {
            return GateFeedback::Finalizing;
        }

        if !inputs.signals.centered {
            let (primary, secondary) = directional(inputs.signals, self.center_tolerance);
            return GateFeedback::OffCenter { primary, secondary };
        }
        if inputs.signals.too_close {
            return GateFeedback::TooClose;
        }
        if inputs.signals.too_far {
            return GateFeedback::TooFar;
        }
        if inputs.spoof.flagged {
            return GateFeedback::SpoofSuspected { hint: inputs.spoof.hint.into() };
        }
        if let Some(target) = inputs.challenge_target {
            let (satisfied, required) = inputs.challenge_progress;
            return GateFeedback::HoldExpression { target, satisfied, required };
        }
        if inputs.score < self.score_threshold {
            return GateFeedback::KeepLooking;
        }
        if self.centered_streak >= self.required_streak
            && inputs.challenge_complete
            && !inputs.spoof.flagged
            && !inputs.signals.too_close
            && !inputs.signals.too_far
        {
            self.triggered = true;
            return GateFeedback::Ready;
        }
        GateFeedback::HoldStill {
            remaining_ticks: self.required_streak.saturating_sub(self.centered_streak),
        }
    }

    /// Reopen the gate after finalization aborted back to the live loop.
    /// No penalty: the streak is kept, only the trigger latch clears.
    pub fn reopen(&mut self) {
        self.triggered = false;
    }

    /// Full reset for an explicit recapture.
    pub fn reset(&mut self) {
        self.centered_streak = 0;
        self.triggered = false;
    }
}

/// Axis with the larger overshoot first; the other axis reported as
/// secondary when it also exceeds tolerance. Directions tell the user
/// which way to move to correct.
fn directional(signals: &FrameSignals, tolerance: f32) -> (Direction, Option<Direction>) {
    let (ox, oy) = signals.center_offset;
    let horizontal = if ox > 0.0 { Direction::Left } else { Direction::Right };
    let vertical = if oy > 0.0 { Direction::Up } else { Direction::Down };

    if ox.abs() >= oy.abs() {
        let secondary = (oy.abs() >= tolerance).then_some(vertical);
        (horizontal, secondary)
    } else {
        let secondary = (ox.abs() >= tolerance).then_some(horizontal);
        (vertical, secondary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::FrameSignals;
    use crate::spoof::SpoofHint;

    fn clean_signals() -> FrameSignals {
        FrameSignals {
            center_offset: (0.0, 0.0),
            centered: true,
            size_ratio: 0.4,
            too_close: false,
            too_far: false,
            movement: 10.0,
            micro_movement: 1.0,
            eye_aspect_ratio: Some(0.3),
            head_pose: Some((0.0, 5.0)),
        }
    }

    fn clean_spoof() -> SpoofStatus {
        SpoofStatus {
            flagged: false,
            hint: SpoofHint::MoveYourHead,
            static_streak: 0,
            pose_variance: Some(10.0),
        }
    }

    fn inputs<'a>(
        signals: &'a FrameSignals,
        spoof: &'a SpoofStatus,
        complete: bool,
        score: f32,
    ) -> GateInputs<'a> {
        GateInputs {
            signals,
            spoof,
            challenge_complete: complete,
            challenge_target: if complete { None } else { Some(Expression::Happy) },
            challenge_progress: if complete { (2, 2) } else { (0, 2) },
            score,
        }
    }

    #[test]
    fn test_ready_on_exact_streak_tick() {
        let mut gate = CaptureGate::new(6, 70.0, 0.20);
        let signals = clean_signals();
        let spoof = clean_spoof();
        for i in 1..=5 {
            let fb = gate.evaluate(inputs(&signals, &spoof, true, 90.0));
            assert_eq!(fb, GateFeedback::HoldStill { remaining_ticks: 6 - i });
        }
        let fb = gate.evaluate(inputs(&signals, &spoof, true, 90.0));
        assert_eq!(fb, GateFeedback::Ready);
    }

    #[test]
    fn test_ready_is_one_shot() {
        let mut gate = CaptureGate::new(1, 70.0, 0.20);
        let signals = clean_signals();
        let spoof = clean_spoof();
        assert_eq!(gate.evaluate(inputs(&signals, &spoof, true, 90.0)), GateFeedback::Ready);
        assert_eq!(gate.evaluate(inputs(&signals, &spoof, true, 90.0)), GateFeedback::Finalizing);
        assert_eq!(gate.observe_no_face(), GateFeedback::Finalizing);
    }

    #[test]
    fn test_no_face_resets_streak() {
        let mut gate = CaptureGate::new(6, 70.0, 0.20);
        let signals = clean_signals();
        let spoof = clean_spoof();
        for _ in 0..4 {
            gate.evaluate(inputs(&signals, &spoof, true, 90.0));
        }
        assert_eq!(gate.observe_no_face(), GateFeedback::NoFace);
        assert_eq!(gate.centered_streak(), 0);
    }

    #[test]
    fn test_one_no_face_then_streak_triggers_exactly_on_required() {
        let mut gate = CaptureGate::new(6, 70.0, 0.20);
        let signals = clean_signals();
        let spoof = clean_spoof();
        gate.observe_no_face();
        for i in 1..=6 {
            let fb = gate.evaluate(inputs(&signals, &spoof, true, 90.0));
            if i < 6 {
                assert_ne!(fb, GateFeedback::Ready, "fired early on tick {i}");
            } else {
                assert_eq!(fb, GateFeedback::Ready);
            }
        }
    }

    #[test]
    fn test_off_center_priority_and_direction() {
        let mut gate = CaptureGate::new(6, 70.0, 0.20);
        let mut signals = clean_signals();
        signals.centered = false;
        signals.center_offset = (0.3, -0.05); // face right of centre: move left
        let spoof = clean_spoof();
        let fb = gate.evaluate(inputs(&signals, &spoof, true, 90.0));
        assert_eq!(fb, GateFeedback::OffCenter { primary: Direction::Left, secondary: None });
        assert_eq!(gate.centered_streak(), 0);
    }

    #[test]
    fn test_both_axes_reported_when_both_exceed() {
        let mut gate = CaptureGate::new(6, 70.0, 0.20);
        let mut signals = clean_signals();
        signals.centered = false;
        signals.center_offset = (-0.25, 0.30); // below and left of centre region
        let spoof = clean_spoof();
        let fb = gate.evaluate(inputs(&signals, &spoof, true, 90.0));
        assert_eq!(
            fb,
            GateFeedback::OffCenter {
                primary: Direction::Up,
                secondary: Some(Direction::Right),
            }
        );
    }

    #[test]
    fn test_priority_order_size_before_spoof() {
        let mut gate = CaptureGate::new(6, 70.0, 0.20);
        let mut signals = clean_signals();
        signals.too_close = true;
        let mut spoof = clean_spoof();
        spoof.flagged = true;
        let fb = gate.evaluate(inputs(&signals, &spoof, true, 90.0));
        assert_eq!(fb, GateFeedback::TooClose);
    }

    #[test]
    fn test_spoof_before_challenge() {
        let mut gate = CaptureGate::new(6, 70.0, 0.20);
        let signals = clean_signals();
        let mut spoof = clean_spoof();
        spoof.flagged = true;
        spoof.hint = SpoofHint::UseARealFace;
        let fb = gate.evaluate(inputs(&signals, &spoof, false, 90.0));
        assert_eq!(fb, GateFeedback::SpoofSuspected { hint: SpoofPrompt::UseARealFace });
    }

    #[test]
    fn test_challenge_before_score() {
        let mut gate = CaptureGate::new(6, 70.0, 0.20);
        let signals = clean_signals();
        let spoof = clean_spoof();
        let fb = gate.evaluate(inputs(&signals, &spoof, false, 10.0));
        assert_eq!(
            fb,
            GateFeedback::HoldExpression { target: Expression::Happy, satisfied: 0, required: 2 }
        );
    }

    #[test]
    fn test_low_score_keeps_looking() {
        let mut gate = CaptureGate::new(6, 70.0, 0.20);
        let signals = clean_signals();
        let spoof = clean_spoof();
        let fb = gate.evaluate(inputs(&signals, &spoof, true, 50.0));
        assert_eq!(fb, GateFeedback::KeepLooking);
    }

    #[test]
    fn test_reopen_keeps_streak_clears_latch() {
        let mut gate = CaptureGate::new(2, 70.0, 0.20);
        let signals = clean_signals();
        let spoof = clean_spoof();
        gate.evaluate(inputs(&signals, &spoof, true, 90.0));
        assert_eq!(gate.evaluate(inputs(&signals, &spoof, true, 90.0)), GateFeedback::Ready);
        gate.reopen();
        // streak is still ≥ required: next clean tick re-triggers
        assert_eq!(gate.evaluate(inputs(&signals, &spoof, true, 90.0)), GateFeedback::Ready);
    }

    #[test]
    fn test_mirrored_direction_flips_horizontal_only() {
        assert_eq!(Direction::Left.mirrored(), Direction::Right);
        assert_eq!(Direction::Right.mirrored(), Direction::Left);
        assert_eq!(Direction::Up.mirrored(), Direction::Up);
        assert_eq!(Direction::Down.mirrored(), Direction::Down);
    }
}
