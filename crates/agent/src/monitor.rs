//! Operator-facing alerts for turns that didn't go cleanly.

use careerchat_core::prompt::Persona;
use careerchat_tools::{Alert, Notifier};
use std::sync::Arc;
use tracing::warn;

/// Sends gate alerts through the same notifier the tools use.
///
/// Delivery failures are logged and swallowed; the user's reply never
/// depends on them.
pub struct OperatorMonitor {
    notifier: Arc<dyn Notifier>,
    persona: Persona,
}

impl OperatorMonitor {
    pub fn new(notifier: Arc<dyn Notifier>, persona: Persona) -> Self {
        Self { notifier, persona }
    }

    /// A reply was released without a PASS.
    pub async fn forced_accept(&self, session_id: &str, attempts: u32, question: &str, feedback: &str) {
        let message = format!(
            "Session {session_id}: reply released after {attempts} attempt(s) without passing review.\n\
             Question: {question}\nLast feedback: {feedback}"
        );
        self.send(Alert::new(format!("Unreviewed reply from {}", self.persona.name), message))
            .await;
    }

    /// No draft could be produced; the user got the apology.
    pub async fn degraded(&self, session_id: &str, attempts: u32, question: &str, last_error: &str) {
        let message = format!(
            "Session {session_id}: backend failed on all {attempts} attempt(s).\n\
             Question: {question}\nLast error: {last_error}"
        );
        self.send(
            Alert::new(format!("{}'s assistant is degraded", self.persona.name), message).with_priority(1),
        )
        .await;
    }

    async fn send(&self, alert: Alert) {
        if let Err(e) = self.notifier.send(alert).await {
            warn!(error = %e, "Operator alert not delivered");
        }
    }
}
