//! Terminal-result delivery.
//!
//! Session persistence and webhook fan-out live outside this daemon;
//! here the report is written to the audit log and kept so the D-Bus
//! status call can answer "how did the last attempt end".

use std::sync::Mutex;

use async_trait::async_trait;

use veriface_remote::capability::{AttemptReport, ResultSink};

/// Logs every report and retains the most recent one.
#[derive(Default)]
pub struct AuditSink {
    last: Mutex<Option<AttemptReport>>,
}

impl AuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent terminal report, if any attempt has finished.
    pub fn last_report(&self) -> Option<AttemptReport> {
        self.last.lock().expect("audit sink lock").clone()
    }
}

#[async_trait]
impl ResultSink for AuditSink {
    async fn report(&self, report: AttemptReport) {
        tracing::info!(
            attempt = %report.attempt_id,
            outcome = ?report.outcome,
            reason = ?report.reason,
            similarity = ?report.similarity,
            score = report.score,
            "attempt result"
        );
        *self.last.lock().expect("audit sink lock") = Some(report);
    }
}
