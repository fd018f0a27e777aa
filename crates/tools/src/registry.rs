//! The closed tool registry and per-cycle deduplication.
//!
//! Dispatch is a match over [`ToolKind`]; there is no dynamic registration.
//! A call goes through three steps:
//!
//! 1. resolve the name to an enabled kind
//! 2. validate the arguments against the kind's schema
//! 3. execute, unless the [`CycleScope`] already holds a result for the
//!    call's dedup key
//!
//! Every failure along the way becomes a `ToolResult` with `succeeded = false`.

use careerchat_core::error::ToolError;
use careerchat_core::event::{DomainEvent, EventBus};
use careerchat_core::provider::ToolDefinition;
use careerchat_core::tool::{ToolCall, ToolKind, ToolResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::contact::ContactTool;
use crate::job_match::JobMatchTool;
use crate::notify::NotifyTool;
use crate::repo_search::RepoSearchTool;

/// Dedup state for one gate cycle (one user turn, all its attempts).
///
/// Created by the gate at the start of a turn and dropped when the reply
/// leaves. Concurrent calls with the same key share one execution.
pub struct CycleScope {
    session_id: String,
    slots: Mutex<HashMap<String, Arc<OnceCell<ToolResult>>>>,
}

impl CycleScope {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn slot(&self, key: String) -> (Arc<OnceCell<ToolResult>>, bool) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        match slots.get(&key) {
            Some(cell) => (Arc::clone(cell), true),
            None => {
                let cell = Arc::new(OnceCell::new());
                slots.insert(key, Arc::clone(&cell));
                (cell, false)
            }
        }
    }

    /// Number of distinct calls seen in this cycle.
    pub fn distinct_calls(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or_default()
    }
}

/// Registry over the closed set of tools. A `None` slot is a disabled tool.
#[derive(Default)]
pub struct ToolRegistry {
    contact: Option<ContactTool>,
    job_match: Option<JobMatchTool>,
    repo_search: Option<RepoSearchTool>,
    notify: Option<NotifyTool>,
    events: Option<Arc<EventBus>>,
}

impl ToolRegistry {
    /// An empty registry: every tool disabled.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contact(mut self, tool: ContactTool) -> Self {
        self.contact = Some(tool);
        self
    }

    pub fn with_job_match(mut self, tool: JobMatchTool) -> Self {
        self.job_match = Some(tool);
        self
    }

    pub fn with_repo_search(mut self, tool: RepoSearchTool) -> Self {
        self.repo_search = Some(tool);
        self
    }

    pub fn with_notify(mut self, tool: NotifyTool) -> Self {
        self.notify = Some(tool);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_enabled(&self, kind: ToolKind) -> bool {
        match kind {
            ToolKind::Contact => self.contact.is_some(),
            ToolKind::JobMatch => self.job_match.is_some(),
            ToolKind::RepoSearch => self.repo_search.is_some(),
            ToolKind::Notify => self.notify.is_some(),
        }
    }

    pub fn enabled(&self) -> Vec<ToolKind> {
        ToolKind::ALL
            .into_iter()
            .filter(|k| self.is_enabled(*k))
            .collect()
    }

    /// Definitions advertised to the backend. Disabled tools are left out.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.enabled().into_iter().map(ToolKind::definition).collect()
    }

    /// Execute one call within a cycle. Never fails: errors come back as a
    /// result with `succeeded = false`.
    pub async fn dispatch(&self, scope: &CycleScope, call: ToolCall) -> ToolResult {
        let kind = match call.kind() {
            Some(kind) => kind,
            None => {
                warn!(tool = %call.name, "Backend requested an unknown tool");
                return ToolResult::failure(&call, &ToolError::NotFound(call.name.clone()));
            }
        };

        if !self.is_enabled(kind) {
            warn!(tool = %kind, "Backend requested a disabled tool");
            return ToolResult::failure(&call, &ToolError::Disabled(kind.name().into()));
        }

        if let Err(e) = kind.validate(&call.arguments) {
            debug!(tool = %kind, error = %e, "Tool arguments rejected");
            return ToolResult::failure(&call, &e);
        }

        let (slot, seen) = scope.slot(kind.dedup_key(&call.arguments));
        let start = Instant::now();
        let mut executed = false;

        let result = slot
            .get_or_init(|| async {
                executed = true;
                match self.execute(kind, &call).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(tool = %kind, error = %e, "Tool execution failed");
                        ToolResult::failure(&call, &e)
                    }
                }
            })
            .await
            .for_call(&call);

        let deduplicated = seen || !executed;
        if deduplicated {
            info!(
                session_id = %scope.session_id(),
                tool = %kind,
                "Duplicate tool call in this cycle; reusing earlier result"
            );
        } else {
            info!(
                session_id = %scope.session_id(),
                tool = %kind,
                success = result.succeeded,
                "Tool executed"
            );
        }

        if let Some(events) = &self.events {
            events.publish(DomainEvent::ToolExecuted {
                session_id: scope.session_id().to_string(),
                tool_name: kind.name().to_string(),
                success: result.succeeded,
                deduplicated,
                duration_ms: start.elapsed().as_millis() as u64,
                timestamp: chrono::Utc::now(),
            });
        }

        result
    }

    async fn execute(&self, kind: ToolKind, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let disabled = || ToolError::Disabled(kind.name().into());
        match kind {
            ToolKind::Contact => match &self.contact {
                Some(tool) => tool.execute(call).await,
                None => Err(disabled()),
            },
            ToolKind::JobMatch => match &self.job_match {
                Some(tool) => tool.execute(call).await,
                None => Err(disabled()),
            },
            ToolKind::RepoSearch => match &self.repo_search {
                Some(tool) => tool.execute(call).await,
                None => Err(disabled()),
            },
            ToolKind::Notify => match &self.notify {
                Some(tool) => tool.execute(call).await,
                None => Err(disabled()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::{ContactStore, MemoryContactStore};
    use crate::notify::{Notifier, RecordingNotifier};
    use crate::repo_search::{RepoSource, StaticRepoSource};
    use careerchat_core::Persona;
    use serde_json::json;

    fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: args,
        }
    }

    fn registry() -> (ToolRegistry, Arc<RecordingNotifier>, Arc<MemoryContactStore>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let contacts = Arc::new(MemoryContactStore::default());
        let repos = Arc::new(StaticRepoSource::new(vec![]));
        let registry = ToolRegistry::new()
            .with_contact(ContactTool::new(contacts.clone() as Arc<dyn ContactStore>))
            .with_repo_search(RepoSearchTool::new(repos as Arc<dyn RepoSource>))
            .with_notify(NotifyTool::new(
                notifier.clone() as Arc<dyn Notifier>,
                Persona::new("Ada"),
            ));
        (registry, notifier, contacts)
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failed_result() {
        let (registry, _, _) = registry();
        let scope = CycleScope::new("s1");
        let result = registry.dispatch(&scope, call("c1", "delete_everything", json!({}))).await;
        assert!(!result.succeeded);
        assert!(result.output.contains("not found"));
    }

    #[tokio::test]
    async fn disabled_tool_is_not_advertised_or_run() {
        let (registry, _, _) = registry();
        assert!(!registry.is_enabled(ToolKind::JobMatch));
        assert!(!registry
            .definitions()
            .iter()
            .any(|d| d.name == "evaluate_job_match"));

        let scope = CycleScope::new("s1");
        let result = registry
            .dispatch(&scope, call("c1", "evaluate_job_match", json!({"job_description": "x"})))
            .await;
        assert!(!result.succeeded);
        assert!(result.error.unwrap().contains("disabled"));
    }

    #[tokio::test]
    async fn invalid_arguments_are_a_failed_result() {
        let (registry, notifier, _) = registry();
        let scope = CycleScope::new("s1");
        let result = registry
            .dispatch(&scope, call("c1", "record_unknown_question", json!({"q": "typo"})))
            .await;
        assert!(!result.succeeded);
        assert_eq!(notifier.sent().len(), 0);
        // Rejected calls don't take a dedup slot
        assert_eq!(scope.distinct_calls(), 0);
    }

    #[tokio::test]
    async fn notify_fires_once_per_cycle() {
        let (registry, notifier, _) = registry();
        let scope = CycleScope::new("s1");

        let first = registry
            .dispatch(&scope, call("c1", "record_unknown_question", json!({"question": "Project X?"})))
            .await;
        let second = registry
            .dispatch(
                &scope,
                call("c2", "record_unknown_question", json!({"question": "What was Project X?"})),
            )
            .await;

        assert!(first.succeeded && second.succeeded);
        assert_eq!(second.call_id, "c2");
        assert_eq!(notifier.sent().len(), 1);

        // A new cycle may alert again
        let next = CycleScope::new("s1");
        registry
            .dispatch(&next, call("c3", "record_unknown_question", json!({"question": "Other?"})))
            .await;
        assert_eq!(notifier.sent().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_duplicates_share_one_execution() {
        let (registry, _, contacts) = registry();
        let scope = CycleScope::new("s1");
        let args = json!({"email": "visitor@example.com"});

        let (a, b) = tokio::join!(
            registry.dispatch(&scope, call("c1", "record_user_details", args.clone())),
            registry.dispatch(&scope, call("c2", "record_user_details", args)),
        );

        assert!(a.succeeded && b.succeeded);
        assert_eq!(contacts.records().len(), 1);
        assert_eq!(a.data, b.data);
    }

    #[tokio::test]
    async fn tool_events_are_published() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let (registry, _, _) = registry();
        let registry = registry.with_events(bus);
        let scope = CycleScope::new("s9");

        registry
            .dispatch(&scope, call("c1", "search_repositories", json!({})))
            .await;

        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::ToolExecuted { session_id, tool_name, deduplicated, .. } => {
                assert_eq!(session_id, "s9");
                assert_eq!(tool_name, "search_repositories");
                assert!(!deduplicated);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
