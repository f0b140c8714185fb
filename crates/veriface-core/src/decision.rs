//! Face-match decision engine.
//!
//! Fuses two independently sourced signals — the local embedding distance
//! and the remote comparison verdict — through a fixed rule matrix. Pure
//! and deterministic: identical inputs always produce identical output,
//! which is what makes the final decision auditable.

use crate::types::MatchDecision;

// Local Euclidean-distance thresholds. The headline threshold is
// deliberately age-tolerant: reference photos may be years old.
const LOCAL_MATCH_DISTANCE: f32 = 0.70;
const LOCAL_STRONG_DISTANCE: f32 = 0.60;
const LOCAL_WEAK_DISTANCE: f32 = 0.75;
const LOCAL_REJECT_DISTANCE: f32 = 0.80;

// Remote-confidence floors per rule.
const REMOTE_STRONG_CONFIDENCE: u8 = 60;
const REMOTE_WEAK_CONFIDENCE: u8 = 40;
const REMOTE_REJECT_CONFIDENCE: u8 = 70;
const REMOTE_AGREE_CONFIDENCE: u8 = 50;

/// Raw inputs to the decision matrix.
#[derive(Debug, Clone, Default)]
pub struct MatchInputs {
    /// Euclidean distance between the two face embeddings. `None` when
    /// either image did not yield exactly one face.
    pub local_distance: Option<f32>,
    /// Remote comparison verdict, `None` when the remote was unavailable
    /// or declined to answer.
    pub remote_match: Option<bool>,
    /// Remote confidence in [0, 100], when reported.
    pub remote_confidence: Option<u8>,
    /// Remote reason text, echoed into the decision for audit.
    pub remote_reason: Option<String>,
}

/// Run the decision matrix. First applicable rule wins.
pub fn decide(inputs: &MatchInputs) -> MatchDecision {
    let d = inputs.local_distance;
    let r = inputs.remote_match;
    let c = inputs.remote_confidence.unwrap_or(0);

    let (matched, rule): (bool, &str) = if r == Some(true) && c >= REMOTE_STRONG_CONFIDENCE {
        (true, "remote match with strong confidence")
    } else if r == Some(true)
        && c >= REMOTE_WEAK_CONFIDENCE
        && d.map_or(true, |d| d < LOCAL_WEAK_DISTANCE)
    {
        (true, "remote match corroborated locally")
    } else if d.is_some_and(|d| d < LOCAL_STRONG_DISTANCE) && r != Some(false) {
        (true, "strong local match")
    } else if d.is_some_and(|d| d < LOCAL_MATCH_DISTANCE) && r.is_none() {
        (true, "local match, remote unavailable")
    } else if r == Some(false) && c >= REMOTE_REJECT_CONFIDENCE {
        (false, "remote mismatch with high confidence")
    } else if r == Some(false)
        && c >= REMOTE_AGREE_CONFIDENCE
        && d.is_some_and(|d| d >= LOCAL_WEAK_DISTANCE)
    {
        (false, "local and remote signals agree on mismatch")
    } else if d.is_some_and(|d| d >= LOCAL_REJECT_DISTANCE) && r != Some(true) {
        (false, "local distance decisively high")
    } else if r.is_none() && d.is_some_and(|d| d >= LOCAL_WEAK_DISTANCE) {
        (false, "local-only signal above mismatch threshold")
    } else {
        (true, "default accept on weak signals")
    };

    let decision = MatchDecision {
        matched,
        similarity: similarity(d, inputs.remote_confidence),
        reason: match &inputs.remote_reason {
            Some(remote) => format!("{rule} ({remote})"),
            None => rule.to_string(),
        },
        local_distance: d,
        remote_match: r,
        remote_confidence: inputs.remote_confidence,
    };
    tracing::info!(
        matched = decision.matched,
        similarity = decision.similarity,
        distance = ?d,
        remote = ?r,
        confidence = ?inputs.remote_confidence,
        rule,
        "face-match decision"
    );
    decision
}

/// Euclidean distance between two embedding vectors.
/// `None` when the vectors are empty or of mismatched length.
pub fn embedding_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let sum: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    Some(sum.sqrt())
}

/// Reported similarity: derived from the local distance when defined,
/// otherwise from the remote confidence, otherwise indeterminate (50).
fn similarity(distance: Option<f32>, remote_confidence: Option<u8>) -> u8 {
    match (distance, remote_confidence) {
        (Some(d), _) => ((1.0 - d) * 100.0).round().clamp(0.0, 100.0) as u8,
        (None, Some(c)) => 100 - c.min(100),
        (None, None) => 50,
    }
}
