//! Per-frame geometric and temporal feature extraction.
//!
//! Stateless: every feature is a function of the current face sample, the
//! previous one, and the frame dimensions. Temporal features (inter-frame
//! movement, micro-movement) read 0 when there is no previous sample —
//! a static photograph produces near-zero micro-movement even when a
//! previous sample exists, which is what the anti-spoof monitor keys on.

use crate::tunables::Tunables;
use crate::types::FaceSample;

/// Features extracted from one observation.
#[derive(Debug, Clone, Copy)]
pub struct FrameSignals {
    /// Normalized centre offset per axis, signed (positive = right/down).
    pub center_offset: (f32, f32),
    /// Both axes within the centring tolerance.
    pub centered: bool,
    /// Face height / frame height.
    pub size_ratio: f32,
    pub too_close: bool,
    pub too_far: bool,
    /// L1 of centre delta plus width delta vs the previous frame (px).
    pub movement: f32,
    /// Mean L1 landmark displacement vs the previous frame (px).
    pub micro_movement: f32,
    /// Mean of both eyes' openness ratio, when landmarks are present.
    pub eye_aspect_ratio: Option<f32>,
    /// Nose-tip offset from the inter-eye centre — a 2-D yaw/pitch proxy.
    pub head_pose: Option<(f32, f32)>,
}

/// Extract all signals for one face sample.
pub fn extract(
    current: &FaceSample,
    previous: Option<&FaceSample>,
    frame_width: f32,
    frame_height: f32,
    tunables: &Tunables,
) -> FrameSignals {
    let (cx, cy) = current.bbox.center();
    let offset_x = (cx - frame_width / 2.0) / frame_width.max(1.0);
    let offset_y = (cy - frame_height / 2.0) / frame_height.max(1.0);
    let centered = offset_x.abs() < tunables.center_tolerance
        && offset_y.abs() < tunables.center_tolerance;

    let size_ratio = current.bbox.height / frame_height.max(1.0);

    let movement = match previous {
        Some(prev) => {
            let (px, py) = prev.bbox.center();
            (cx - px).abs() + (cy - py).abs() + (current.bbox.width - prev.bbox.width).abs()
        }
        None => 0.0,
    };

    let micro_movement = match (current.landmarks.as_ref(), previous.and_then(|p| p.landmarks.as_ref())) {
        (Some(curr), Some(prev)) => {
            let total: f32 = curr
                .points()
                .iter()
                .zip(prev.points().iter())
                .map(|(c, p)| (c.0 - p.0).abs() + (c.1 - p.1).abs())
                .sum();
            total / curr.points().len() as f32
        }
        _ => 0.0,
    };

    let eye_aspect_ratio = current.landmarks.as_ref().map(|lm| {
        (eye_aspect_ratio(lm.left_eye()) + eye_aspect_ratio(lm.right_eye())) / 2.0
    });

    let head_pose = current.landmarks.as_ref().map(|lm| {
        let left = mean_point(lm.left_eye());
        let right = mean_point(lm.right_eye());
        let eye_center = ((left.0 + right.0) / 2.0, (left.1 + right.1) / 2.0);
        let nose = lm.nose_tip();
        (nose.0 - eye_center.0, nose.1 - eye_center.1)
    });

    FrameSignals {
        center_offset: (offset_x, offset_y),
        centered,
        size_ratio,
        too_close: size_ratio > tunables.close_ratio,
        too_far: size_ratio < tunables.far_ratio,
        movement,
        micro_movement,
        eye_aspect_ratio,
        head_pose,
    }
}

/// Six-point eye aspect ratio: mean vertical gap over horizontal span.
/// Ordering follows ibug-68: [outer, upper-outer, upper-inner, inner,
/// lower-inner, lower-outer].
fn eye_aspect_ratio(eye: &[(f32, f32)]) -> f32 {
    let v1 = dist(eye[1], eye[5]);
    let v2 = dist(eye[2], eye[4]);
    let h = dist(eye[0], eye[3]);
    if h > 0.0 {
        (v1 + v2) / (2.0 * h)
    } else {
        0.0
    }
}

fn dist(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn mean_point(points: &[(f32, f32)]) -> (f32, f32) {
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.0, sy + p.1));
    (sx / n, sy / n)
}
