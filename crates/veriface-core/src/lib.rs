//! veriface-core — deterministic liveness and face-match pipeline.
//!
//! Pure per-tick logic: signal extraction, rolling liveness scoring, the
//! scripted expression challenge, anti-spoof heuristics, the capture gate
//! and the face-match decision matrix. No I/O and no async — the session
//! scheduler in `verifaced` drives this crate and owns all timing.

pub mod attempt;
pub mod challenge;
pub mod decision;
pub mod gate;
pub mod history;
pub mod ring;
pub mod scorer;
pub mod signal;
pub mod spoof;
pub mod tunables;
pub mod types;

pub use attempt::{Attempt, TickOutcome};
pub use decision::{decide, MatchInputs};
pub use gate::{Direction, GateFeedback};
pub use tunables::Tunables;
pub use types::{Expression, FaceBox, FaceSample, FrameObservation, MatchDecision};
