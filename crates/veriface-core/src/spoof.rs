//! Photo / replay heuristics from abnormal staticness.
//!
//! Two sub-conditions must hold together before the flag raises: a long
//! run of frames whose landmark micro-movement sits below the natural
//! jitter floor, and a head-pose history whose variance says the head is
//! not moving at all. A completed expression challenge is strong
//! counter-evidence and suppresses the flag even under static geometry.

use crate::ring::RingBuffer;
use crate::tunables::Tunables;

/// Head-pose samples retained for variance.
pub const POSE_HISTORY_CAPACITY: usize = 15;

/// Samples required before pose variance is meaningful.
const POSE_MIN_SAMPLES: usize = 10;

/// Which sub-condition dominates a raised flag, for feedback wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoofHint {
    /// Head-pose variance is the stronger evidence: ask for head movement.
    MoveYourHead,
    /// Landmark staticness is the stronger evidence: likely a flat image.
    UseARealFace,
}

/// Per-tick monitor verdict.
#[derive(Debug, Clone, Copy)]
pub struct SpoofStatus {
    pub flagged: bool,
    pub hint: SpoofHint,
    pub static_streak: u32,
    pub pose_variance: Option<f32>,
}

/// Staticness monitor over micro-movement and head pose.
#[derive(Debug, Clone)]
pub struct AntiSpoofMonitor {
    static_streak: u32,
    pose_history: RingBuffer<(f32, f32)>,
    static_floor: f32,
    static_ceiling: u32,
    pose_variance_floor: f32,
}

impl AntiSpoofMonitor {
    pub fn new(tunables: &Tunables) -> Self {
        Self {
            static_streak: 0,
            pose_history: RingBuffer::new(POSE_HISTORY_CAPACITY),
            static_floor: tunables.static_floor,
            static_ceiling: tunables.static_ceiling,
            pose_variance_floor: tunables.pose_variance_floor,
        }
    }

    /// Feed one tick's micro-movement and head-pose reading.
    ///
    /// `challenge_complete` suppresses the flag: a subject that has just
    /// answered the expression script is not a photograph.
    pub fn observe(
        &mut self,
        micro_movement: f32,
        head_pose: Option<(f32, f32)>,
        challenge_complete: bool,
    ) -> SpoofStatus {
        // Zero micro-movement means "no landmark pair to compare", not
        // "perfectly still"; only a measured sub-floor reading counts.
        if micro_movement > 0.0 && micro_movement < self.static_floor {
            self.static_streak += 1;
        } else {
            self.static_streak = self.static_streak.saturating_sub(1);
        }

        if let Some(pose) = head_pose {
            self.pose_history.push(pose);
        }

        let pose_variance = self.pose_variance();
        let head_still = pose_variance.is_some_and(|v| v < self.pose_variance_floor);
        let abnormally_static = self.static_streak > self.static_ceiling;

        let flagged = abnormally_static && head_still && !challenge_complete;
        if flagged {
            tracing::debug!(
                streak = self.static_streak,
                variance = ?pose_variance,
                "spoof flag raised"
            );
        }

        SpoofStatus {
            flagged,
            hint: self.dominant_hint(pose_variance),
            static_streak: self.static_streak,
            pose_variance,
        }
    }

    /// Population variance of the pose vectors, summed across both axes.
    fn pose_variance(&self) -> Option<f32> {
        if self.pose_history.len() < POSE_MIN_SAMPLES {
            return None;
        }
        let n = self.pose_history.len() as f32;
        let (sx, sy) = self
            .pose_history
            .iter()
            .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.0, sy + p.1));
        let (mx, my) = (sx / n, sy / n);
        let var = self
            .pose_history
            .iter()
            .map(|p| (p.0 - mx).powi(2) + (p.1 - my).powi(2))
            .sum::<f32>()
            / n;
        Some(var)
    }

    /// Pick the prompt by how far each sub-condition exceeds its threshold.
    fn dominant_hint(&self, pose_variance: Option<f32>) -> SpoofHint {
        let static_excess = self.static_streak as f32 / self.static_ceiling.max(1) as f32;
        let pose_excess = match pose_variance {
            Some(v) if v > 0.0 => self.pose_variance_floor / v,
            Some(_) => f32::INFINITY,
            None => 0.0,
        };
        if pose_excess >= static_excess {
            SpoofHint::MoveYourHead
        } else {
            SpoofHint::UseARealFace
        }
    }

    pub fn reset(&mut self) {
        self.static_streak = 0;
        self.pose_history.clear();
    }
}
