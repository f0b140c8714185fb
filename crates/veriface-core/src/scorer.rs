//! Rolling liveness confidence.
//!
//! Each tick a handful of independent indicators vote; the vote ratio
//! becomes the frame score and is folded into an exponentially smoothed
//! aggregate so a single good (or bad) frame cannot swing the outcome.

/// Smoothing: 70% prior, 30% fresh frame, at a ~250 ms tick period.
const EMA_RETAIN: f32 = 0.7;
const EMA_FRESH: f32 = 0.3;

/// Flat decay applied on a tick with no detected face.
const NO_FACE_DECAY: f32 = 5.0;

/// Maximum obtainable votes per frame.
const MAX_VOTES: i32 = 6;

/// Indicator votes gathered for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameVotes {
    /// Detector confidence met the floor. (+1)
    pub confident: bool,
    /// Inter-frame movement above the threshold. (+1)
    pub moving: bool,
    /// Ten-sample positional variance above the floor. (+1)
    pub positional_variance: bool,
    /// Expression challenge fully satisfied. (+2)
    pub challenge_complete: bool,
    /// Challenge advanced on this very tick. (+1)
    pub challenge_advanced: bool,
    /// Anti-spoof monitor flagged this frame. (−1)
    pub spoof_suspected: bool,
}

impl FrameVotes {
    fn tally(&self) -> i32 {
        let mut votes = 0;
        votes += self.confident as i32;
        votes += self.moving as i32;
        votes += self.positional_variance as i32;
        votes += 2 * self.challenge_complete as i32;
        votes += self.challenge_advanced as i32;
        votes -= self.spoof_suspected as i32;
        votes
    }
}

/// Exponentially smoothed 0–100 liveness confidence.
#[derive(Debug, Clone)]
pub struct LivenessScorer {
    smoothed: f32,
}

impl LivenessScorer {
    pub fn new() -> Self {
        Self { smoothed: 0.0 }
    }

    /// Fold one frame's votes into the smoothed score and return it.
    pub fn update(&mut self, votes: FrameVotes) -> f32 {
        let tally = votes.tally().max(0);
        let frame_score = tally as f32 / MAX_VOTES as f32 * 100.0;
        self.smoothed = (self.smoothed * EMA_RETAIN + frame_score * EMA_FRESH).clamp(0.0, 100.0);
        self.smoothed
    }

    /// Flat decay for a no-face tick.
    pub fn decay(&mut self) -> f32 {
        self.smoothed = (self.smoothed - NO_FACE_DECAY).clamp(0.0, 100.0);
        self.smoothed
    }

    pub fn score(&self) -> f32 {
        self.smoothed
    }

    /// Pin the score, used when an attempt finalizes successfully.
    pub fn freeze(&mut self, value: f32) {
        self.smoothed = value.clamp(0.0, 100.0);
    }

    pub fn reset(&mut self) {
        self.smoothed = 0.0;
    }
}

impl Default for LivenessScorer {
    fn default() -> Self {
        Self::new()
    }
}
