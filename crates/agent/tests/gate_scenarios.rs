//! End-to-end scenarios for the gate cycle.
//!
//! Each test wires a full `ChatService` around reactive mock backends: the
//! responder mock answers based on what its request contains, and the judge
//! mock grades the draft it is shown. A scenario only passes if prompts,
//! feedback and tool results actually flow between the stages.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use careerchat_agent::{
    ChatService, Evaluator, GateController, GateLimits, OperatorMonitor, Responder, ScopeGuard, ToneLint,
};
use careerchat_core::error::ProviderError;
use careerchat_core::event::{DomainEvent, EventBus};
use careerchat_core::message::{ConversationTurn, Role, SessionId, TurnToolCall};
use careerchat_core::profile::ProfessionalContext;
use careerchat_core::prompt::{Persona, PromptTemplates, TemplateId};
use careerchat_core::provider::{Provider, ProviderRequest, ProviderResponse};
use careerchat_tools::{Notifier, NotifyTool, RecordingNotifier, ToolRegistry};

// ── Reactive mock backend ────────────────────────────────────────────────

type Reply = dyn Fn(&ProviderRequest, usize) -> ProviderResponse + Send + Sync;

/// A provider whose reply is computed from the request and the call index.
struct ReactiveProvider {
    reply: Box<Reply>,
    calls: AtomicUsize,
}

impl ReactiveProvider {
    fn new(reply: impl Fn(&ProviderRequest, usize) -> ProviderResponse + Send + Sync + 'static) -> Self {
        Self {
            reply: Box::new(reply),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Provider for ReactiveProvider {
    fn name(&self) -> &str {
        "reactive_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.reply)(&request, n))
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: ConversationTurn::assistant(text),
        usage: None,
        model: "mock".into(),
    }
}

fn tool_response(calls: Vec<TurnToolCall>) -> ProviderResponse {
    let mut message = ConversationTurn::assistant("");
    message.tool_calls = calls;
    ProviderResponse {
        message,
        usage: None,
        model: "mock".into(),
    }
}

fn verdict(outcome: &str, feedback: &str) -> ProviderResponse {
    text_response(
        &serde_json::json!({"outcome": outcome, "reasoning": "checked", "feedback": feedback}).to_string(),
    )
}

/// The draft text embedded in an evaluation request.
fn draft_under_review(request: &ProviderRequest) -> String {
    let body = &request.messages[1].content;
    let start = body.find("## Draft reply\n").map(|i| i + "## Draft reply\n".len()).unwrap_or(0);
    let end = body[start..].find("\n\n## Tool results").map(|i| start + i).unwrap_or(body.len());
    body[start..end].to_string()
}

/// The retry instruction, if the responder was given one.
fn retry_instruction(request: &ProviderRequest) -> Option<&str> {
    request
        .messages
        .iter()
        .skip(1)
        .rfind(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
}

// ── Fixture ──────────────────────────────────────────────────────────────

fn context() -> ProfessionalContext {
    ProfessionalContext::from_parts(
        "Senior Engineer, Acme Corp (2019-2023). Staff Engineer, Beta Labs (2023-present).\nSkills: Rust, Kafka, Postgres.",
        "Ada builds streaming data platforms.",
        "Ada is a backend engineer.",
    )
}

struct Pipeline {
    service: ChatService,
    responder: Arc<ReactiveProvider>,
    judge: Arc<ReactiveProvider>,
    notifier: Arc<RecordingNotifier>,
    events: Arc<EventBus>,
}

fn pipeline(responder: ReactiveProvider, judge: ReactiveProvider, topics: &[&str], markers: &[&str]) -> Pipeline {
    let responder = Arc::new(responder);
    let judge = Arc::new(judge);
    let notifier = Arc::new(RecordingNotifier::default());
    let events = Arc::new(EventBus::new(256));
    let templates = Arc::new(PromptTemplates::builtin());
    let persona = Persona::new("Ada");
    let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    let tools = ToolRegistry::new()
        .with_notify(NotifyTool::new(notifier.clone() as Arc<dyn Notifier>, persona.clone()))
        .with_events(events.clone());

    let gate = GateController::new(
        Responder::new(
            responder.clone(),
            "responder-model",
            Arc::new(tools),
            templates.clone(),
            ScopeGuard::new(&owned(topics)),
        ),
        Evaluator::new(judge.clone(), "judge-model", templates.clone(), ToneLint::new(&owned(markers))),
        templates,
        GateLimits {
            max_attempts: 3,
            ..GateLimits::default()
        },
    )
    .with_events(events.clone())
    .with_monitor(OperatorMonitor::new(Arc::new(RecordingNotifier::default()), persona.clone()));

    Pipeline {
        service: ChatService::new(gate, Arc::new(context()), persona).with_events(events.clone()),
        responder,
        judge,
        notifier,
        events,
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_names_only_companies_in_context() {
    let responder = ReactiveProvider::new(|request, _| {
        let system = &request.messages[0].content;
        let named: Vec<&str> = ["Acme Corp", "Beta Labs"]
            .into_iter()
            .filter(|c| system.contains(c))
            .collect();
        text_response(&format!("Ada has worked at {}.", named.join(" and ")))
    });
    let judge = ReactiveProvider::new(|request, _| {
        let draft = draft_under_review(request);
        let grounded = ["Acme", "Beta", "Initech", "Globex"]
            .into_iter()
            .filter(|c| draft.contains(c))
            .all(|c| request.messages[0].content.contains(c));
        if grounded {
            verdict("PASS", "")
        } else {
            verdict("FAIL", "Names a company not in the context.")
        }
    });
    let p = pipeline(responder, judge, &[], &[]);

    let reply = p
        .service
        .handle_turn(&SessionId::new(), "What companies has this person worked at?")
        .await
        .unwrap();

    assert_eq!(reply.reply_text, "Ada has worked at Acme Corp and Beta Labs.");
    assert!(!reply.forced_accept);
    assert_eq!(reply.attempts, 1);
    assert_eq!(p.judge.calls(), 1);
}

#[tokio::test]
async fn scenario_b_refuses_salary_question() {
    let responder = ReactiveProvider::new(|_, _| panic!("refusal must not reach the backend"));
    let judge = ReactiveProvider::new(|request, _| {
        if draft_under_review(request).contains("not something I can discuss") {
            verdict("PASS", "")
        } else {
            verdict("FAIL", "Personal topic must be refused.")
        }
    });
    let p = pipeline(responder, judge, &["salary", "family"], &[]);
    let mut rx = p.events.subscribe();

    let reply = p
        .service
        .handle_turn(&SessionId::new(), "What is your salary expectation?")
        .await
        .unwrap();

    let refusal = PromptTemplates::builtin().render(TemplateId::Refusal, &Persona::new("Ada"), &[]);
    assert_eq!(reply.reply_text, refusal);
    assert!(!reply.forced_accept);
    assert_eq!(p.responder.calls(), 0);
    assert_eq!(p.judge.calls(), 1);

    while let Ok(event) = rx.try_recv() {
        match event.as_ref() {
            DomainEvent::DraftGenerated { tool_calls, .. } => assert_eq!(*tool_calls, 0),
            DomainEvent::ToolExecuted { .. } => panic!("refusal must not call tools"),
            _ => {}
        }
    }
}

#[tokio::test]
async fn scenario_c_unknown_project_notifies_once_across_retries() {
    // Every attempt reports the question, then offers direct contact
    let responder = ReactiveProvider::new(|request, n| {
        let last = request.messages.last().map(|m| m.role);
        if last == Some(Role::Tool) {
            text_response(&format!(
                "I don't have details on Project Zephyr. I've let Ada know; you can reach Ada directly by sharing your email. (draft {n})"
            ))
        } else {
            tool_response(vec![TurnToolCall {
                id: format!("call_{n}"),
                name: "record_unknown_question".into(),
                arguments: r#"{"question": "What did you build on Project Zephyr?"}"#.into(),
            }])
        }
    });
    let judge = ReactiveProvider::new(|_, _| verdict("FAIL", "Be more specific."));
    let p = pipeline(responder, judge, &[], &[]);
    let mut rx = p.events.subscribe();

    let reply = p
        .service
        .handle_turn(&SessionId::new(), "What did you build on Project Zephyr?")
        .await
        .unwrap();

    assert!(reply.reply_text.contains("reach Ada directly"));
    assert_eq!(reply.attempts, 3);
    assert_eq!(p.notifier.sent().len(), 1);
    assert_eq!(p.notifier.sent()[0].message, "What did you build on Project Zephyr?");

    let mut executed = 0;
    let mut deduplicated = 0;
    while let Ok(event) = rx.try_recv() {
        if let DomainEvent::ToolExecuted { deduplicated: d, .. } = event.as_ref() {
            executed += 1;
            if *d {
                deduplicated += 1;
            }
        }
    }
    assert_eq!(executed, 3);
    assert_eq!(deduplicated, 2);
}

#[tokio::test]
async fn scenario_d_persistent_fail_forces_accept_within_ceiling() {
    let responder = ReactiveProvider::new(|_, n| text_response(&format!("Ada has worked at Acme Corp. ({n})")));
    let judge = ReactiveProvider::new(|_, _| verdict("FAIL", "Not good enough."));
    let p = pipeline(responder, judge, &[], &[]);

    let reply = p
        .service
        .handle_turn(&SessionId::new(), "Where has Ada worked?")
        .await
        .unwrap();

    assert!(reply.forced_accept);
    assert!(!reply.degraded);
    assert_eq!(reply.attempts, 3);
    assert_eq!(reply.reply_text, "Ada has worked at Acme Corp. (2)");
    assert_eq!(p.responder.calls(), 3);
    assert_eq!(p.judge.calls(), 3);
}

// ── Feedback regression fixtures ─────────────────────────────────────────

/// A flawed first draft, the evaluator's objection, and the corrected draft
/// the responder produces once it is shown that objection.
struct Fixture {
    question: &'static str,
    flawed: &'static str,
    corrected: &'static str,
    /// Judge-side defect check
    is_flawed: fn(&str) -> bool,
    feedback: &'static str,
    /// Substring of the retry instruction that proves the objection arrived
    cue: &'static str,
    casual_markers: &'static [&'static str],
}

async fn assert_feedback_is_acted_on(fixture: Fixture) {
    let Fixture {
        question,
        flawed,
        corrected,
        is_flawed,
        feedback,
        cue,
        casual_markers,
    } = fixture;

    let responder = ReactiveProvider::new(move |request, _| match retry_instruction(request) {
        Some(instruction) if instruction.contains(cue) => {
            assert!(instruction.contains(flawed), "retry must quote the rejected draft");
            text_response(corrected)
        }
        _ => text_response(flawed),
    });
    let judge = ReactiveProvider::new(move |request, _| {
        if is_flawed(&draft_under_review(request)) {
            verdict("FAIL", feedback)
        } else {
            verdict("PASS", "")
        }
    });
    let p = pipeline(responder, judge, &[], casual_markers);

    let reply = p.service.handle_turn(&SessionId::new(), question).await.unwrap();

    assert_eq!(reply.reply_text, corrected);
    assert!(!is_flawed(&reply.reply_text));
    assert_eq!(reply.attempts, 2);
    assert!(!reply.forced_accept);
}

#[tokio::test]
async fn regression_unsupported_claim_is_dropped() {
    assert_feedback_is_acted_on(Fixture {
        question: "Where has Ada worked?",
        flawed: "Ada has worked at Acme Corp, Beta Labs and Initech.",
        corrected: "Ada has worked at Acme Corp and Beta Labs.",
        is_flawed: |draft| draft.contains("Initech"),
        feedback: "Initech does not appear in the context; remove it.",
        cue: "Initech does not appear",
        casual_markers: &[],
    })
    .await;
}

#[tokio::test]
async fn regression_wrong_refusal_is_answered() {
    assert_feedback_is_acted_on(Fixture {
        question: "Which databases has Ada used?",
        flawed: "I'm sorry, that is not something I can discuss.",
        corrected: "Ada has used Postgres in production, alongside Kafka for streaming.",
        is_flawed: |draft| draft.contains("can discuss"),
        feedback: "This is a professional question; answer it from the context instead of refusing.",
        cue: "instead of refusing",
        casual_markers: &[],
    })
    .await;
}

#[tokio::test]
async fn regression_incomplete_answer_is_completed() {
    assert_feedback_is_acted_on(Fixture {
        question: "Which languages does Ada use, and where does Ada work now?",
        flawed: "Ada works mainly in Rust.",
        corrected: "Ada works mainly in Rust and is currently a Staff Engineer at Beta Labs.",
        is_flawed: |draft| !draft.contains("Beta Labs"),
        feedback: "The second part (current employer) was not answered.",
        cue: "current employer",
        casual_markers: &[],
    })
    .await;
}

#[tokio::test]
async fn regression_casual_tone_is_rewritten() {
    assert_feedback_is_acted_on(Fixture {
        question: "How strong is Ada's Rust?",
        flawed: "Honestly, Ada totally rocks at Rust.",
        corrected: "Ada has used Rust in production at Acme Corp and Beta Labs.",
        is_flawed: |draft| draft.contains("totally"),
        feedback: "Casual phrasing.",
        // Caught by the tone lint, whose feedback names the phrase
        cue: "\"totally\"",
        casual_markers: &["totally"],
    })
    .await;
}
