use std::path::PathBuf;
use std::time::Duration;

use veriface_core::types::Expression;
use veriface_core::Tunables;

use crate::session::SessionConfig;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Directory the camera collaborator spools frames into.
    pub frame_spool_dir: PathBuf,
    /// Base URL of the remote judgment API.
    pub remote_base_url: String,
    /// Bearer token for the judgment API, if any.
    pub remote_token: Option<String>,
    /// Per-request timeout for remote calls.
    pub remote_timeout: Duration,
    /// Minimum remote liveness confidence before a capture is accepted.
    pub liveness_confidence_floor: u8,
    /// Core pipeline thresholds.
    pub tunables: Tunables,
}

impl Config {
    /// Load configuration from `VERIFACE_*` environment variables with
    /// calibrated defaults.
    pub fn from_env() -> Self {
        let defaults = Tunables::default();
        let tunables = Tunables {
            tick_period_ms: env_u64("VERIFACE_TICK_PERIOD_MS", defaults.tick_period_ms),
            hold_duration_ms: env_u64("VERIFACE_HOLD_DURATION_MS", defaults.hold_duration_ms),
            center_tolerance: env_f32("VERIFACE_CENTER_TOLERANCE", defaults.center_tolerance),
            close_ratio: env_f32("VERIFACE_CLOSE_RATIO", defaults.close_ratio),
            far_ratio: env_f32("VERIFACE_FAR_RATIO", defaults.far_ratio),
            min_confidence: env_f32("VERIFACE_MIN_CONFIDENCE", defaults.min_confidence),
            movement_threshold: env_f32(
                "VERIFACE_MOVEMENT_THRESHOLD",
                defaults.movement_threshold,
            ),
            position_variance_min: env_f32(
                "VERIFACE_POSITION_VARIANCE_MIN",
                defaults.position_variance_min,
            ),
            score_threshold: env_f32("VERIFACE_SCORE_THRESHOLD", defaults.score_threshold),
            static_floor: env_f32("VERIFACE_STATIC_FLOOR", defaults.static_floor),
            static_ceiling: env_u32("VERIFACE_STATIC_CEILING", defaults.static_ceiling),
            pose_variance_floor: env_f32(
                "VERIFACE_POSE_VARIANCE_FLOOR",
                defaults.pose_variance_floor,
            ),
            challenge_hold_ticks: env_u32(
                "VERIFACE_CHALLENGE_HOLD_TICKS",
                defaults.challenge_hold_ticks,
            ),
            expression_min_probability: env_f32(
                "VERIFACE_EXPRESSION_MIN_PROBABILITY",
                defaults.expression_min_probability,
            ),
            required_expressions: env_expressions(
                "VERIFACE_REQUIRED_EXPRESSIONS",
                defaults.required_expressions,
            ),
        };

        Self {
            frame_spool_dir: std::env::var("VERIFACE_FRAME_SPOOL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/run/veriface/frames")),
            remote_base_url: std::env::var("VERIFACE_REMOTE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8089/v1".to_string()),
            remote_token: std::env::var("VERIFACE_REMOTE_TOKEN").ok(),
            remote_timeout: Duration::from_secs(env_u64("VERIFACE_REMOTE_TIMEOUT_SECS", 8)),
            liveness_confidence_floor: env_u32("VERIFACE_LIVENESS_CONFIDENCE_FLOOR", 70)
                .min(100) as u8,
            tunables,
        }
    }

    /// Session-engine view of this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tunables: self.tunables.clone(),
            remote_timeout: self.remote_timeout,
            liveness_confidence_floor: self.liveness_confidence_floor,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse a comma-separated expression list. Unknown labels are dropped
/// with a warning; an empty result falls back to the default script.
fn env_expressions(key: &str, default: Vec<Expression>) -> Vec<Expression> {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    let parsed: Vec<Expression> = raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| match s.parse() {
            Ok(label) => Some(label),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring expression in {key}");
                None
            }
        })
        .collect();
    if parsed.is_empty() {
        default
    } else {
        parsed
    }
}
