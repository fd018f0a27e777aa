//! `ChatService`: the single entry point the chat surface calls.

use careerchat_config::AppConfig;
use careerchat_core::draft::TurnReply;
use careerchat_core::error::Error;
use careerchat_core::event::EventBus;
use careerchat_core::message::{ConversationTurn, SessionId};
use careerchat_core::profile::{ContextSources, ContextStore, ProfessionalContext};
use careerchat_core::prompt::{Persona, PromptTemplates};
use careerchat_core::tool::ToolKind;
use std::sync::Arc;
use tracing::{info, warn};

use crate::evaluator::Evaluator;
use crate::gate::{GateController, GateLimits, TurnOutcome};
use crate::guard::{ScopeGuard, ToneLint};
use crate::monitor::OperatorMonitor;
use crate::responder::Responder;
use crate::session::SessionStore;

/// Reply sent when a session ends while its turn is still running.
pub const SESSION_ENDED_REPLY: &str = "This conversation has ended.";

pub struct ChatService {
    gate: GateController,
    context: Arc<ProfessionalContext>,
    persona: Persona,
    sessions: SessionStore,
    events: Arc<EventBus>,
}

impl ChatService {
    pub fn new(gate: GateController, context: Arc<ProfessionalContext>, persona: Persona) -> Self {
        Self {
            gate,
            context,
            persona,
            sessions: SessionStore::default(),
            events: Arc::new(EventBus::default()),
        }
    }

    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    /// The bus the gate and tools publish to.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Wire the whole pipeline from configuration.
    ///
    /// Fails if the context documents or prompt templates can't be loaded,
    /// or if the configured providers can't be resolved.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let context = ContextStore::new(ContextSources {
            resume: config.profile.resume_path.clone(),
            profile: config.profile.profile_path.clone(),
            summary: config.profile.summary_path.clone(),
        })
        .load()?;
        let templates = Arc::new(PromptTemplates::load(config.profile.templates_dir.as_deref())?);

        if !config.has_api_key() {
            warn!("No API key configured; hosted providers will reject requests");
        }

        let backends = careerchat_providers::build_from_config(config)?.backends(config)?;
        let provider = backends.responder;
        let evaluator_model = config.evaluator_target().1;

        let events = Arc::new(EventBus::default());
        let persona = config.persona();
        let notifier = careerchat_tools::build_notifier(config);
        let registry = careerchat_tools::build_registry(
            config,
            provider.clone(),
            context.clone(),
            templates.clone(),
            notifier.clone(),
        )
        .with_events(events.clone());

        let responder = Responder::new(
            provider,
            &config.default_model,
            Arc::new(registry),
            templates.clone(),
            ScopeGuard::new(&config.scope.personal_topics),
        )
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens)
        .with_max_tool_rounds(config.gate.max_tool_rounds);

        let evaluator = Evaluator::new(
            backends.evaluator,
            evaluator_model,
            templates.clone(),
            ToneLint::new(&config.scope.casual_markers),
        )
        .with_temperature(config.evaluator.temperature);

        let gate = GateController::new(responder, evaluator, templates, GateLimits::from(&config.gate))
            .with_events(events.clone())
            .with_monitor(OperatorMonitor::new(notifier, persona.clone()));

        info!(
            persona = %persona.name,
            context_version = %context.version,
            model = %config.default_model,
            evaluator_model = %evaluator_model,
            "Chat service ready"
        );

        Ok(Self::new(gate, context, persona)
            .with_events(events)
            .with_sessions(SessionStore::new(config.gateway.max_sessions)))
    }

    /// Answer one user message.
    ///
    /// Turns within a session are serialized. The chat surface always gets a
    /// reply; only an empty message is an error.
    pub async fn handle_turn(&self, session_id: &SessionId, message: &str) -> Result<TurnReply, Error> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::InvalidInput("message is empty".into()));
        }

        let session = self.sessions.get_or_create(session_id).await;
        let mut history = session.history.lock().await;
        history.push(ConversationTurn::user(message));

        let outcome = self
            .gate
            .run_cycle(&session_id.0, &history, &self.context, &self.persona, &session.cancel)
            .await;

        match outcome {
            TurnOutcome::Reply(reply) => {
                history.push(ConversationTurn::assistant(&reply.reply_text));
                session.touch();
                Ok(reply)
            }
            TurnOutcome::Cancelled => {
                history.pop();
                Ok(TurnReply {
                    reply_text: SESSION_ENDED_REPLY.into(),
                    forced_accept: false,
                    degraded: false,
                    attempts: 0,
                })
            }
        }
    }

    /// End a session, cancelling any turn in flight.
    pub async fn end_session(&self, session_id: &SessionId) -> bool {
        self.sessions.end(session_id).await
    }

    pub fn context(&self) -> &ProfessionalContext {
        &self.context
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn enabled_tools(&self) -> Vec<ToolKind> {
        self.gate.responder().tools().enabled()
    }

    pub async fn live_sessions(&self) -> usize {
        self.sessions.len().await
    }
}
