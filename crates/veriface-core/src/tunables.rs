//! Pipeline thresholds, grouped so the daemon can override any of them
//! from configuration while the defaults stay the calibrated values.

use crate::types::Expression;

/// All tunable thresholds of the capture pipeline.
#[derive(Debug, Clone)]
pub struct Tunables {
    /// Sampling tick period in milliseconds.
    pub tick_period_ms: u64,
    /// How long the face must hold centred before capture (wall clock).
    pub hold_duration_ms: u64,
    /// Normalized per-axis centre offset below which a face is centred.
    pub center_tolerance: f32,
    /// Face height / frame height above which the face is too close.
    pub close_ratio: f32,
    /// Face height / frame height below which the face is too far.
    pub far_ratio: f32,
    /// Minimum detector confidence for the confidence vote.
    pub min_confidence: f32,
    /// Inter-frame movement (px) above which the movement vote is granted.
    pub movement_threshold: f32,
    /// 10-sample positional variance above which the variance vote is granted.
    pub position_variance_min: f32,
    /// Smoothed score required before capture is considered.
    pub score_threshold: f32,
    /// Micro-movement (px) below which a frame counts as static.
    pub static_floor: f32,
    /// Consecutive static frames beyond which staticness is suspicious.
    pub static_ceiling: u32,
    /// Head-pose population variance below which the head is "not moving".
    pub pose_variance_floor: f32,
    /// Qualifying ticks an expression must hold to satisfy a challenge step.
    pub challenge_hold_ticks: u32,
    /// Minimum probability for a dominant expression to qualify.
    pub expression_min_probability: f32,
    /// Ordered expressions the challenge requires.
    pub required_expressions: Vec<Expression>,
}

impl Tunables {
    /// Centred ticks required before capture: hold duration ÷ tick period,
    /// at least 1.
    pub fn required_streak(&self) -> u32 {
        let ticks = self.hold_duration_ms / self.tick_period_ms.max(1);
        (ticks as u32).max(1)
    }
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            tick_period_ms: 250,
            hold_duration_ms: 1500,
            center_tolerance: 0.20,
            close_ratio: 0.55,
            far_ratio: 0.25,
            min_confidence: 0.5,
            movement_threshold: 8.0,
            position_variance_min: 5.0,
            score_threshold: 70.0,
            static_floor: 0.4,
            static_ceiling: 20,
            pose_variance_floor: 3.0,
            challenge_hold_ticks: 3,
            expression_min_probability: 0.5,
            required_expressions: vec![Expression::Happy, Expression::Surprised],
        }
    }
}
