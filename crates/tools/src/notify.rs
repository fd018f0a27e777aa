//! Operator notification — `record_unknown_question`.
//!
//! When the profile can't answer a question, the operator gets an alert so
//! they can follow up in person. The same [`Notifier`] carries gate alerts
//! (forced accepts, backend failures) from the operator monitor.

use async_trait::async_trait;
use careerchat_core::error::ToolError;
use careerchat_core::tool::{ToolCall, ToolKind, ToolResult};
use careerchat_core::Persona;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// An outbound alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
    /// Pushover scale: -2 (silent) to 2 (emergency)
    pub priority: i8,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i8) -> Self {
        // 2 requires retry/expire parameters we don't send
        self.priority = priority.clamp(-2, 1);
        self
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an alert; returns a delivery acknowledgment.
    async fn send(&self, alert: Alert) -> Result<String, ToolError>;
}

fn notify_failed(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: ToolKind::Notify.name().into(),
        reason,
    }
}

/// Pushover push notifications.
pub struct PushoverNotifier {
    token: String,
    user: String,
    url: String,
    client: reqwest::Client,
}

impl PushoverNotifier {
    pub fn new(
        token: impl Into<String>,
        user: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            token: token.into(),
            user: user.into(),
            url: url.into(),
            client,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PushoverResponse {
    status: i32,
    #[serde(default)]
    request: String,
    #[serde(default)]
    errors: Vec<String>,
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn send(&self, alert: Alert) -> Result<String, ToolError> {
        let priority = alert.priority.to_string();
        let form = [
            ("token", self.token.as_str()),
            ("user", self.user.as_str()),
            ("title", alert.title.as_str()),
            ("message", alert.message.as_str()),
            ("priority", priority.as_str()),
        ];

        let response = self
            .client
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .map_err(|e| notify_failed(e.to_string()))?;

        let status = response.status();
        let body: PushoverResponse = response
            .json()
            .await
            .map_err(|e| notify_failed(format!("push service returned {status}: {e}")))?;

        if body.status != 1 {
            return Err(notify_failed(format!(
                "push service rejected alert: {}",
                body.errors.join("; ")
            )));
        }

        Ok(body.request)
    }
}

/// Writes alerts to the log instead of delivering them. Used when no push
/// credentials are configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, alert: Alert) -> Result<String, ToolError> {
        warn!(title = %alert.title, priority = alert.priority, "ALERT: {}", alert.message);
        Ok("logged".into())
    }
}

/// Keeps alerts in memory. Used by tests and dry runs.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Alert> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, alert: Alert) -> Result<String, ToolError> {
        let mut sent = self.sent.lock().map_err(|e| notify_failed(e.to_string()))?;
        sent.push(alert);
        Ok(format!("recorded-{}", sent.len()))
    }
}

pub struct NotifyTool {
    notifier: Arc<dyn Notifier>,
    persona: Persona,
}

impl NotifyTool {
    pub fn new(notifier: Arc<dyn Notifier>, persona: Persona) -> Self {
        Self { notifier, persona }
    }

    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let question = call
            .arguments
            .get("question")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .trim();

        let alert = Alert::new(
            format!("Unanswered question for {}", self.persona.name),
            question.to_string(),
        );
        let ack = self.notifier.send(alert).await?;
        info!(ack = %ack, "Unknown question reported");

        Ok(ToolResult::success(
            call,
            format!(
                "The question was passed on to {}. Offer the user direct contact.",
                self.persona.name
            ),
            Some(serde_json::json!({ "delivered": true, "ack": ack })),
        ))
    }
}
