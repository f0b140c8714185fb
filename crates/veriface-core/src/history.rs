//! Bounded history of recent frame observations.
//!
//! Feeds the positional-variance vote of the liveness scorer: a live
//! subject's face centre wanders measurably over a ten-sample window,
//! a tripod-mounted photo does not.

use crate::ring::RingBuffer;
use crate::types::ObservationSummary;

/// Number of recent frames kept.
pub const HISTORY_CAPACITY: usize = 30;

/// Window used for positional variance.
const VARIANCE_WINDOW: usize = 10;

/// Chronological ring of per-frame summaries.
#[derive(Debug, Clone)]
pub struct FrameHistory {
    ring: RingBuffer<ObservationSummary>,
}

impl FrameHistory {
    pub fn new() -> Self {
        Self { ring: RingBuffer::new(HISTORY_CAPACITY) }
    }

    pub fn push(&mut self, summary: ObservationSummary) {
        self.ring.push(summary);
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }

    /// Population variance of the face centre over the last ten samples,
    /// summed across both axes. `None` until ten samples are held.
    pub fn position_variance(&self) -> Option<f32> {
        if self.ring.len() < VARIANCE_WINDOW {
            return None;
        }
        let recent: Vec<(f32, f32)> = self
            .ring
            .iter_recent(VARIANCE_WINDOW)
            .map(|s| s.center)
            .collect();
        let n = recent.len() as f32;
        let mean_x = recent.iter().map(|p| p.0).sum::<f32>() / n;
        let mean_y = recent.iter().map(|p| p.1).sum::<f32>() / n;
        let var = recent
            .iter()
            .map(|p| (p.0 - mean_x).powi(2) + (p.1 - mean_y).powi(2))
            .sum::<f32>()
            / n;
        Some(var)
    }
}

impl Default for FrameHistory {
    fn default() -> Self {
        Self::new()
    }
}
