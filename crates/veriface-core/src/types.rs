use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of landmark points per face (ibug-68 convention).
pub const LANDMARK_COUNT: usize = 68;

// ibug-68 index ranges used by the signal extractor.
pub(crate) const LEFT_EYE_RANGE: std::ops::Range<usize> = 36..42;
pub(crate) const RIGHT_EYE_RANGE: std::ops::Range<usize> = 42..48;
pub(crate) const NOSE_TIP_INDEX: usize = 30;

/// Bounding box for a detected face, pixel coordinates, origin top-left.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceBox {
    /// Centre of the box in pixel coordinates.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// 68-point facial landmarks (ibug-68 ordering).
///
/// Indices 36–41 are the left eye, 42–47 the right eye, 30 the nose tip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f32, f32)>", into = "Vec<(f32, f32)>")]
pub struct Landmarks {
    points: Vec<(f32, f32)>,
}

impl Landmarks {
    /// Construct from exactly [`LANDMARK_COUNT`] points.
    pub fn new(points: Vec<(f32, f32)>) -> Result<Self, LandmarkError> {
        if points.len() != LANDMARK_COUNT {
            return Err(LandmarkError::WrongCount(points.len()));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    pub fn left_eye(&self) -> &[(f32, f32)] {
        &self.points[LEFT_EYE_RANGE]
    }

    pub fn right_eye(&self) -> &[(f32, f32)] {
        &self.points[RIGHT_EYE_RANGE]
    }

    pub fn nose_tip(&self) -> (f32, f32) {
        self.points[NOSE_TIP_INDEX]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LandmarkError {
    #[error("expected {LANDMARK_COUNT} landmark points, got {0}")]
    WrongCount(usize),
}

impl TryFrom<Vec<(f32, f32)>> for Landmarks {
    type Error = LandmarkError;

    fn try_from(points: Vec<(f32, f32)>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<Landmarks> for Vec<(f32, f32)> {
    fn from(lm: Landmarks) -> Self {
        lm.points
    }
}

/// Facial expression labels the challenge protocol can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    Neutral,
    Happy,
    Surprised,
    Angry,
    Sad,
}

impl Expression {
    /// Human-readable prompt for on-screen feedback.
    pub fn prompt(&self) -> &'static str {
        match self {
            Expression::Neutral => "a neutral face",
            Expression::Happy => "a smile",
            Expression::Surprised => "a surprised face",
            Expression::Angry => "a frown",
            Expression::Sad => "a sad face",
        }
    }
}

impl FromStr for Expression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neutral" => Ok(Expression::Neutral),
            "happy" | "smile" => Ok(Expression::Happy),
            "surprised" | "surprise" => Ok(Expression::Surprised),
            "angry" => Ok(Expression::Angry),
            "sad" => Ok(Expression::Sad),
            other => Err(format!("unknown expression label: {other}")),
        }
    }
}

/// A single face detected in one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceSample {
    pub bbox: FaceBox,
    pub landmarks: Option<Landmarks>,
    /// Per-label probabilities from the expression head, when available.
    pub expressions: Option<HashMap<Expression, f32>>,
    /// Detector confidence in [0, 1].
    pub confidence: f32,
}

impl FaceSample {
    /// Highest-probability expression label, if the expression head ran.
    pub fn dominant_expression(&self) -> Option<(Expression, f32)> {
        let probs = self.expressions.as_ref()?;
        probs
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(label, p)| (*label, *p))
    }
}

/// One raw observation from the face-analysis capability. Ephemeral,
/// produced per tick; `face` is `None` when no face was detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameObservation {
    pub timestamp_ms: i64,
    pub face: Option<FaceSample>,
}

/// Compact per-frame summary kept in the frame history ring.
#[derive(Debug, Clone, Copy)]
pub struct ObservationSummary {
    pub center: (f32, f32),
    pub width: f32,
    pub eye_aspect_ratio: Option<f32>,
    pub dominant_expression: Option<Expression>,
    pub confidence: f32,
}

/// Final immutable output of the face-match decision engine,
/// produced once per attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDecision {
    pub matched: bool,
    /// Reported similarity in [0, 100].
    pub similarity: u8,
    pub reason: String,
    pub local_distance: Option<f32>,
    pub remote_match: Option<bool>,
    pub remote_confidence: Option<u8>,
}
