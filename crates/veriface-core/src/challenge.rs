//! Scripted expression challenge.
//!
//! The user must display a fixed sequence of expressions, each held for a
//! few consecutive qualifying ticks. Photographs cannot answer the script;
//! video replays would need to answer it in order, on cue. Satisfied steps
//! never regress within an attempt — only an explicit recapture resets.

use crate::types::Expression;

/// Outcome of feeding one tick's dominant expression to the challenge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChallengeTick {
    /// A step was satisfied on this tick.
    pub advanced: bool,
    /// Every required step is satisfied.
    pub complete: bool,
    /// The step currently being asked for, `None` once complete.
    pub target: Option<Expression>,
}

/// Ordered proof-of-liveness state machine.
#[derive(Debug, Clone)]
pub struct ExpressionChallenge {
    required: Vec<Expression>,
    /// Steps satisfied so far; always a prefix of `required`.
    satisfied: usize,
    candidate: Option<Expression>,
    hold: u32,
    hold_ticks: u32,
    min_probability: f32,
}

impl ExpressionChallenge {
    pub fn new(required: Vec<Expression>, hold_ticks: u32, min_probability: f32) -> Self {
        Self {
            required,
            satisfied: 0,
            candidate: None,
            hold: 0,
            hold_ticks: hold_ticks.max(1),
            min_probability,
        }
    }

    /// The step currently targeted, `None` once the script is complete.
    pub fn target(&self) -> Option<Expression> {
        self.required.get(self.satisfied).copied()
    }

    pub fn is_complete(&self) -> bool {
        self.satisfied == self.required.len()
    }

    /// (satisfied, required) step counts for progress feedback.
    pub fn progress(&self) -> (usize, usize) {
        (self.satisfied, self.required.len())
    }

    /// Steps satisfied so far, in order.
    pub fn satisfied_labels(&self) -> &[Expression] {
        &self.required[..self.satisfied]
    }

    /// Feed one tick's dominant expression reading.
    pub fn observe(&mut self, dominant: Option<(Expression, f32)>) -> ChallengeTick {
        if self.is_complete() {
            return ChallengeTick { advanced: false, complete: true, target: None };
        }
        let target = self.target();

        let qualifies = matches!(
            (dominant, target),
            (Some((label, p)), Some(t)) if label == t && p >= self.min_probability
        );

        let mut advanced = false;
        if qualifies {
            if self.candidate == target {
                self.hold += 1;
            } else {
                self.candidate = target;
                self.hold = 1;
            }
            if self.hold >= self.hold_ticks {
                self.satisfied += 1;
                self.candidate = None;
                self.hold = 0;
                advanced = true;
                tracing::debug!(
                    step = self.satisfied,
                    total = self.required.len(),
                    "challenge step satisfied"
                );
            }
        } else {
            // wrong or absent expression: no partial credit carries over
            self.candidate = None;
            self.hold = 0;
        }

        ChallengeTick {
            advanced,
            complete: self.is_complete(),
            target: self.target(),
        }
    }

    /// Full reset, only for an explicit recapture.
    pub fn reset(&mut self) {
        self.satisfied = 0;
        self.candidate = None;
        self.hold = 0;
    }
}
