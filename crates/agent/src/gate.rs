//! The gate controller: draft, evaluate, and either accept or retry.
//!
//! ```text
//! DRAFTING ──► EVALUATING ──► ACCEPTED ──► DONE
//!    ▲             │
//!    │             ▼
//!    └──────── RETRYING        (attempt < ceiling)
//!
//! EVALUATING ──► DONE          (FAIL at the ceiling: forced accept)
//! DRAFTING   ──► DONE          (regenerated draft identical to the last rejected one)
//! ```
//!
//! Backend errors and timeouts never escape the cycle. A failed generation
//! consumes its attempt; a failed evaluation counts as FAIL. If no draft is
//! ever produced the user gets the degraded apology.

use careerchat_config::GateConfig;
use careerchat_core::draft::{Draft, TurnReply, Verdict};
use careerchat_core::error::ProviderError;
use careerchat_core::event::{DomainEvent, EventBus};
use careerchat_core::message::{ConversationTurn, latest_user_message};
use careerchat_core::profile::ProfessionalContext;
use careerchat_core::prompt::{Persona, PromptTemplates, TemplateId};
use careerchat_tools::CycleScope;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::evaluator::Evaluator;
use crate::monitor::OperatorMonitor;
use crate::responder::{PriorFeedback, Responder};

/// Retry ceiling and backend deadlines for one cycle.
#[derive(Debug, Clone, Copy)]
pub struct GateLimits {
    pub max_attempts: u32,
    pub generation_timeout: Duration,
    pub evaluation_timeout: Duration,
}

impl Default for GateLimits {
    fn default() -> Self {
        Self::from(&GateConfig::default())
    }
}

impl From<&GateConfig> for GateLimits {
    fn from(config: &GateConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            generation_timeout: Duration::from_millis(config.generation_timeout_ms),
            evaluation_timeout: Duration::from_millis(config.evaluation_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Drafting,
    Evaluating,
    Accepted,
    Retrying,
    Done,
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Reply(TurnReply),
    /// The session ended mid-cycle; results were discarded
    Cancelled,
}

impl TurnOutcome {
    pub fn into_reply(self) -> Option<TurnReply> {
        match self {
            TurnOutcome::Reply(reply) => Some(reply),
            TurnOutcome::Cancelled => None,
        }
    }
}

pub struct GateController {
    responder: Responder,
    evaluator: Evaluator,
    templates: Arc<PromptTemplates>,
    limits: GateLimits,
    events: Arc<EventBus>,
    monitor: Option<OperatorMonitor>,
}

impl GateController {
    pub fn new(
        responder: Responder,
        evaluator: Evaluator,
        templates: Arc<PromptTemplates>,
        limits: GateLimits,
    ) -> Self {
        Self {
            responder,
            evaluator,
            templates,
            limits,
            events: Arc::new(EventBus::default()),
            monitor: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_monitor(mut self, monitor: OperatorMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn limits(&self) -> GateLimits {
        self.limits
    }

    pub fn responder(&self) -> &Responder {
        &self.responder
    }

    /// Run one cycle for the latest user message in `history`.
    pub async fn run_cycle(
        &self,
        session_id: &str,
        history: &[ConversationTurn],
        context: &ProfessionalContext,
        persona: &Persona,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let started = Instant::now();
        let question = latest_user_message(history).unwrap_or_default();
        let scope = CycleScope::new(session_id);

        let mut state = GateState::Drafting;
        let mut attempt: u32 = 1;
        let mut prior: Option<PriorFeedback> = None;
        let mut pending: Option<Draft> = None;
        let mut latest: Option<Draft> = None;
        // Last draft the evaluator actually judged and rejected
        let mut last_rejected: Option<Draft> = None;
        let mut accepted = false;
        let mut last_feedback = String::new();
        let mut last_error: Option<ProviderError> = None;

        while state != GateState::Done {
            state = match state {
                GateState::Drafting => {
                    if cancel.is_cancelled() {
                        return self.cancelled(session_id, attempt);
                    }

                    let generated = with_deadline(
                        self.limits.generation_timeout,
                        "generation",
                        self.responder
                            .generate(history, context, persona, prior.as_ref(), attempt, &scope),
                    )
                    .await;

                    if cancel.is_cancelled() {
                        return self.cancelled(session_id, attempt);
                    }

                    match generated {
                        Ok(draft) => {
                            debug!(session_id, attempt, chars = draft.text.len(), "Draft generated");
                            self.events.publish(DomainEvent::DraftGenerated {
                                session_id: session_id.to_string(),
                                attempt,
                                chars: draft.text.len(),
                                tool_calls: draft.tool_results.len(),
                                timestamp: chrono::Utc::now(),
                            });

                            let repeated = last_rejected.as_ref().is_some_and(|prev| prev.same_text(&draft));
                            latest = Some(draft.clone());
                            if repeated {
                                info!(session_id, attempt, "Regenerated draft ignores the feedback; accepting it");
                                GateState::Done
                            } else {
                                pending = Some(draft);
                                GateState::Evaluating
                            }
                        }
                        Err(e) => {
                            self.backend_failure(session_id, attempt, "generation", &e);
                            last_error = Some(e);
                            // Prior feedback, if any, still applies to the next attempt
                            if attempt < self.limits.max_attempts {
                                GateState::Retrying
                            } else {
                                GateState::Done
                            }
                        }
                    }
                }

                GateState::Evaluating => {
                    let Some(draft) = pending.take() else {
                        break;
                    };

                    let evaluated = with_deadline(
                        self.limits.evaluation_timeout,
                        "evaluation",
                        self.evaluator.evaluate(&draft, question, history, context, persona),
                    )
                    .await;

                    if cancel.is_cancelled() {
                        return self.cancelled(session_id, attempt);
                    }

                    let (verdict, synthetic) = match evaluated {
                        Ok(verdict) => (verdict, false),
                        Err(e) => {
                            self.backend_failure(session_id, attempt, "evaluation", &e);
                            let verdict = Verdict::fail(format!("evaluation unavailable: {e}"), "", attempt);
                            last_error = Some(e);
                            (verdict, true)
                        }
                    };

                    info!(session_id, attempt, outcome = %verdict.outcome, "Draft evaluated");
                    self.events.publish(DomainEvent::VerdictIssued {
                        session_id: session_id.to_string(),
                        attempt,
                        outcome: verdict.outcome,
                        feedback: verdict.feedback.clone(),
                        timestamp: chrono::Utc::now(),
                    });

                    if verdict.passed() {
                        GateState::Accepted
                    } else {
                        last_feedback = verdict.feedback.clone();
                        // A failed evaluation has nothing for the responder to fix
                        if !synthetic {
                            prior = Some(PriorFeedback {
                                previous_draft: draft.text.clone(),
                                feedback: verdict.feedback,
                            });
                            last_rejected = Some(draft);
                        }
                        if attempt < self.limits.max_attempts {
                            GateState::Retrying
                        } else {
                            GateState::Done
                        }
                    }
                }

                GateState::Accepted => {
                    accepted = true;
                    GateState::Done
                }

                GateState::Retrying => {
                    attempt += 1;
                    GateState::Drafting
                }

                GateState::Done => GateState::Done,
            };
        }

        let reply = match latest {
            Some(draft) => {
                let forced_accept = !accepted;
                if forced_accept {
                    warn!(session_id, attempts = attempt, "Releasing reply without a passing verdict");
                    if let Some(monitor) = &self.monitor {
                        monitor.forced_accept(session_id, attempt, question, &last_feedback).await;
                    }
                }
                TurnReply {
                    reply_text: draft.text,
                    forced_accept,
                    degraded: false,
                    attempts: attempt,
                }
            }
            None => {
                let reason = last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no draft produced".into());
                warn!(session_id, attempts = attempt, error = %reason, "No draft produced; replying with apology");
                if let Some(monitor) = &self.monitor {
                    monitor.degraded(session_id, attempt, question, &reason).await;
                }
                TurnReply {
                    reply_text: self.templates.render(TemplateId::DegradedApology, persona, &[]),
                    forced_accept: false,
                    degraded: true,
                    attempts: attempt,
                }
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        self.events.publish(DomainEvent::TurnCompleted {
            session_id: session_id.to_string(),
            attempts: reply.attempts,
            forced_accept: reply.forced_accept,
            degraded: reply.degraded,
            duration_ms,
            timestamp: chrono::Utc::now(),
        });
        info!(
            session_id,
            attempts = reply.attempts,
            forced_accept = reply.forced_accept,
            degraded = reply.degraded,
            duration_ms,
            "Turn completed"
        );

        TurnOutcome::Reply(reply)
    }

    fn cancelled(&self, session_id: &str, attempt: u32) -> TurnOutcome {
        info!(session_id, attempt, "Session ended mid-turn; discarding results");
        TurnOutcome::Cancelled
    }

    fn backend_failure(&self, session_id: &str, attempt: u32, stage: &str, error: &ProviderError) {
        warn!(
            session_id,
            attempt,
            stage,
            timed_out = error.is_timeout(),
            error = %error,
            "Backend call failed"
        );
        self.events.publish(DomainEvent::BackendFailure {
            session_id: session_id.to_string(),
            stage: stage.to_string(),
            error_message: error.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }
}

/// Await `call`, turning an elapsed deadline into [`ProviderError::Timeout`].
async fn with_deadline<T>(
    deadline: Duration,
    stage: &str,
    call: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(format!(
            "{stage} exceeded {}ms",
            deadline.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{ScopeGuard, ToneLint};
    use crate::test_helpers::*;
    use careerchat_tools::{RecordingNotifier, ToolRegistry};

    struct Harness {
        gate: GateController,
        responder: Arc<SequentialMockProvider>,
        evaluator: Arc<SequentialMockProvider>,
        notifier: Arc<RecordingNotifier>,
        events: Arc<EventBus>,
    }

    fn harness(responder_script: Vec<Scripted>, evaluator_script: Vec<Scripted>) -> Harness {
        let responder_provider = Arc::new(SequentialMockProvider::scripted(responder_script));
        let evaluator_provider = Arc::new(SequentialMockProvider::scripted(evaluator_script));
        let templates = Arc::new(PromptTemplates::builtin());
        let notifier = Arc::new(RecordingNotifier::default());
        let events = Arc::new(EventBus::new(64));

        let responder = Responder::new(
            responder_provider.clone(),
            "mock-model",
            Arc::new(ToolRegistry::new()),
            templates.clone(),
            ScopeGuard::new(&[]),
        );
        let evaluator = Evaluator::new(
            evaluator_provider.clone(),
            "judge-model",
            templates.clone(),
            ToneLint::new(&[]),
        );
        let limits = GateLimits {
            max_attempts: 3,
            generation_timeout: Duration::from_millis(500),
            evaluation_timeout: Duration::from_millis(500),
        };
        let gate = GateController::new(responder, evaluator, templates, limits)
            .with_events(events.clone())
            .with_monitor(OperatorMonitor::new(notifier.clone(), persona()));

        Harness {
            gate,
            responder: responder_provider,
            evaluator: evaluator_provider,
            notifier,
            events,
        }
    }

    fn text(s: &str) -> Scripted {
        Scripted::Reply(make_text_response(s))
    }

    fn verdict(outcome: &str, feedback: &str) -> Scripted {
        Scripted::Reply(make_verdict_response(outcome, feedback))
    }

    async fn run(h: &Harness) -> TurnOutcome {
        h.gate
            .run_cycle("s1", &history("Where has Ada worked?"), &context(), &persona(), &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn accepts_on_first_pass() {
        let h = harness(vec![text("Acme and Beta Labs.")], vec![verdict("PASS", "")]);
        let reply = run(&h).await.into_reply().unwrap();

        assert_eq!(reply.reply_text, "Acme and Beta Labs.");
        assert!(!reply.forced_accept);
        assert!(!reply.degraded);
        assert_eq!(reply.attempts, 1);
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn retries_with_feedback_then_accepts() {
        let h = harness(
            vec![text("Acme, Beta Labs and Initech."), text("Acme and Beta Labs.")],
            vec![verdict("FAIL", "Initech is not in the context."), verdict("PASS", "")],
        );
        let reply = run(&h).await.into_reply().unwrap();

        assert_eq!(reply.reply_text, "Acme and Beta Labs.");
        assert_eq!(reply.attempts, 2);
        assert!(!reply.forced_accept);

        let retry = h.responder.request(1);
        let instruction = &retry.messages.last().unwrap().content;
        assert!(instruction.contains("Initech is not in the context."));
        assert!(instruction.contains("Acme, Beta Labs and Initech."));
    }

    #[tokio::test]
    async fn forces_accept_at_the_ceiling() {
        let h = harness(
            vec![text("one"), text("two"), text("three")],
            vec![verdict("FAIL", "a"), verdict("FAIL", "b"), verdict("FAIL", "c")],
        );
        let reply = run(&h).await.into_reply().unwrap();

        assert!(reply.forced_accept);
        assert_eq!(reply.reply_text, "three");
        assert_eq!(reply.attempts, 3);
        assert_eq!(h.responder.call_count(), 3);
        assert_eq!(h.evaluator.call_count(), 3);

        let alerts = h.notifier.sent();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.contains("Last feedback: c"));
    }

    #[tokio::test]
    async fn identical_regeneration_is_accepted_without_evaluation() {
        let h = harness(
            vec![text("Acme and Beta Labs."), text("  Acme and Beta Labs.\n")],
            vec![verdict("FAIL", "Say more.")],
        );
        let reply = run(&h).await.into_reply().unwrap();

        assert!(reply.forced_accept);
        assert_eq!(reply.attempts, 2);
        assert_eq!(h.evaluator.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unjudged_repeat_is_evaluated_again() {
        let same = "Acme and Beta Labs.";
        let h = harness(
            vec![text(same), text(same), text(same)],
            vec![
                Scripted::Stall(Duration::from_secs(5), make_verdict_response("PASS", "")),
                verdict("PASS", ""),
            ],
        );
        let reply = run(&h).await.into_reply().unwrap();

        assert_eq!(reply.reply_text, same);
        assert!(!reply.forced_accept);
        assert_eq!(reply.attempts, 2);
        assert_eq!(h.evaluator.call_count(), 2);
    }

    #[tokio::test]
    async fn generation_failures_end_in_apology() {
        let down = || Scripted::Fail(ProviderError::ServiceUnavailable("503".into()));
        let h = harness(vec![down(), down(), down()], vec![]);
        let reply = run(&h).await.into_reply().unwrap();

        assert!(reply.degraded);
        assert!(!reply.forced_accept);
        assert_eq!(reply.attempts, 3);
        assert!(reply.reply_text.contains("Ada will follow up"));
        assert!(!reply.reply_text.contains("503"));
        assert_eq!(h.notifier.sent()[0].priority, 1);
    }

    #[tokio::test]
    async fn generation_failure_consumes_an_attempt() {
        let h = harness(
            vec![Scripted::Fail(ProviderError::ServiceUnavailable("503".into())), text("Acme and Beta Labs.")],
            vec![verdict("PASS", "")],
        );
        let reply = run(&h).await.into_reply().unwrap();
        assert_eq!(reply.attempts, 2);
        assert!(!reply.degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn evaluation_timeout_counts_as_fail() {
        let h = harness(
            vec![text("first"), text("second")],
            vec![
                Scripted::Stall(Duration::from_secs(5), make_verdict_response("PASS", "")),
                verdict("PASS", ""),
            ],
        );
        let reply = run(&h).await.into_reply().unwrap();

        assert_eq!(reply.reply_text, "second");
        assert_eq!(reply.attempts, 2);
        // No synthetic feedback reaches the responder
        let retry = h.responder.request(1);
        assert!(!retry.messages.last().unwrap().content.contains("evaluation unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn generation_timeout_consumes_an_attempt() {
        let h = harness(
            vec![
                Scripted::Stall(Duration::from_secs(5), make_text_response("late")),
                text("on time"),
            ],
            vec![verdict("PASS", "")],
        );
        let reply = run(&h).await.into_reply().unwrap();
        assert_eq!(reply.reply_text, "on time");
        assert_eq!(reply.attempts, 2);
    }

    #[tokio::test]
    async fn cancelled_turn_discards_results() {
        let h = harness(vec![text("Acme.")], vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = h
            .gate
            .run_cycle("s1", &history("Where?"), &context(), &persona(), &cancel)
            .await;

        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert_eq!(h.evaluator.call_count(), 0);
    }

    #[tokio::test]
    async fn publishes_cycle_events() {
        let h = harness(vec![text("one"), text("two")], vec![verdict("FAIL", "x"), verdict("PASS", "")]);
        let mut rx = h.events.subscribe();
        run(&h).await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event.as_ref() {
                DomainEvent::DraftGenerated { .. } => "draft",
                DomainEvent::VerdictIssued { .. } => "verdict",
                DomainEvent::TurnCompleted { .. } => "done",
                DomainEvent::BackendFailure { .. } => "failure",
                DomainEvent::ToolExecuted { .. } => "tool",
            });
        }
        assert_eq!(kinds, vec!["draft", "verdict", "draft", "verdict", "done"]);
    }
}
