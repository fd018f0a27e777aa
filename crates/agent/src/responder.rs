//! The responder: turns a conversation into a draft.
//!
//! One call to [`Responder::generate`] produces exactly one [`Draft`]. Tool
//! calls requested by the backend are resolved before the draft is returned,
//! so a draft never carries unresolved calls.

use careerchat_core::draft::Draft;
use careerchat_core::error::ProviderError;
use careerchat_core::message::{ConversationTurn, Role, latest_user_message};
use careerchat_core::profile::ProfessionalContext;
use careerchat_core::prompt::{Persona, PromptTemplates, TemplateId};
use careerchat_core::provider::{Provider, ProviderRequest};
use careerchat_core::tool::{ToolCall, ToolResult};
use careerchat_tools::{CycleScope, ToolRegistry};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::guard::ScopeGuard;

/// What a retry must fix.
#[derive(Debug, Clone)]
pub struct PriorFeedback {
    /// Text of the rejected draft
    pub previous_draft: String,
    /// The evaluator's correction
    pub feedback: String,
}

pub struct Responder {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    templates: Arc<PromptTemplates>,
    scope_guard: ScopeGuard,
    max_tool_rounds: u32,
}

impl Responder {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        templates: Arc<PromptTemplates>,
        scope_guard: ScopeGuard,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            templates,
            scope_guard,
            max_tool_rounds: 4,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Produce one draft for the latest user message in `history`.
    ///
    /// On the first attempt a personal question is refused by the scope guard
    /// without a backend call. Retries always go to the backend so the
    /// feedback can be acted on.
    pub async fn generate(
        &self,
        history: &[ConversationTurn],
        context: &ProfessionalContext,
        persona: &Persona,
        prior: Option<&PriorFeedback>,
        attempt: u32,
        scope: &CycleScope,
    ) -> Result<Draft, ProviderError> {
        let question = latest_user_message(history).unwrap_or_default();

        if prior.is_none()
            && let Some(topic) = self.scope_guard.out_of_scope(question)
        {
            info!(session_id = %scope.session_id(), attempt, topic, "Question out of scope; refusing");
            let text = self.templates.render(TemplateId::Refusal, persona, &[]);
            return Ok(Draft::refusal(text, attempt, &context.version));
        }

        let mut messages = self.build_messages(history, context, persona, prior);
        let definitions = self.tools.definitions();
        let mut tool_results: Vec<ToolResult> = Vec::new();

        for round in 1..=self.max_tool_rounds {
            let request = self.request(messages.clone()).with_tools(definitions.clone());
            let response = self.provider.complete(request).await?;

            if response.message.tool_calls.is_empty() {
                return finish(response.message.content, tool_results, attempt, context);
            }

            debug!(
                session_id = %scope.session_id(),
                attempt,
                round,
                calls = response.message.tool_calls.len(),
                "Resolving tool calls"
            );

            let calls: Vec<ToolCall> = response
                .message
                .tool_calls
                .iter()
                .map(ToolCall::from_turn)
                .collect();
            messages.push(response.message);

            // All calls in one response are independent; run them together
            let results = join_all(calls.into_iter().map(|call| self.tools.dispatch(scope, call))).await;

            for result in results {
                messages.push(ConversationTurn::tool_result(&result.call_id, &result.output));
                tool_results.push(result);
            }
        }

        warn!(
            session_id = %scope.session_id(),
            attempt,
            rounds = self.max_tool_rounds,
            "Tool round limit reached; requesting a final answer without tools"
        );
        let response = self.provider.complete(self.request(messages)).await?;
        finish(response.message.content, tool_results, attempt, context)
    }

    fn request(&self, messages: Vec<ConversationTurn>) -> ProviderRequest {
        ProviderRequest::new(&self.model, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }

    /// System prompt, the visible conversation, and the retry instruction.
    fn build_messages(
        &self,
        history: &[ConversationTurn],
        context: &ProfessionalContext,
        persona: &Persona,
        prior: Option<&PriorFeedback>,
    ) -> Vec<ConversationTurn> {
        let system = self.templates.render(
            TemplateId::ResponderSystem,
            persona,
            &[("context", &context.render())],
        );

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ConversationTurn::system(system));
        messages.extend(
            history
                .iter()
                .filter(|t| matches!(t.role, Role::User | Role::Assistant))
                .cloned(),
        );

        if let Some(prior) = prior {
            let instruction = self.templates.render(
                TemplateId::RetryFeedback,
                persona,
                &[
                    ("previous_draft", &prior.previous_draft),
                    ("feedback", &prior.feedback),
                ],
            );
            messages.push(ConversationTurn::system(instruction));
        }

        messages
    }
}

fn finish(
    text: String,
    tool_results: Vec<ToolResult>,
    attempt: u32,
    context: &ProfessionalContext,
) -> Result<Draft, ProviderError> {
    if text.trim().is_empty() {
        return Err(ProviderError::MalformedResponse("backend returned an empty reply".into()));
    }
    Ok(Draft::answer(text.trim(), attempt, &context.version).with_tool_results(tool_results))
}
