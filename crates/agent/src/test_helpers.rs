//! Shared test helpers for agent tests.

use careerchat_core::error::ProviderError;
use careerchat_core::message::{ConversationTurn, TurnToolCall};
use careerchat_core::profile::ProfessionalContext;
use careerchat_core::prompt::Persona;
use careerchat_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted backend reaction.
pub enum Scripted {
    Reply(ProviderResponse),
    Fail(ProviderError),
    /// Reply only after sleeping; used to trip timeouts
    Stall(Duration, ProviderResponse),
}

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and keeps
/// the request it was given. Panics if more calls are made than responses
/// provided.
pub struct SequentialMockProvider {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Scripted::Reply).collect())
    }

    pub fn scripted(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// Create a provider that first returns tool calls, then a final answer.
    pub fn tool_then_answer(tool_calls: Vec<TurnToolCall>, answer: &str) -> Self {
        Self::new(vec![
            make_tool_call_response(tool_calls, ""),
            make_text_response(answer),
        ])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The `n`th request this provider received.
    pub fn request(&self, n: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[n].clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let count = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let next = self.script.lock().unwrap().pop_front();

        match next {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::Fail(error)) => Err(error),
            Some(Scripted::Stall(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            None => panic!("SequentialMockProvider: no more responses (call #{count})"),
        }
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: ConversationTurn::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<TurnToolCall>, thought: &str) -> ProviderResponse {
    let mut msg = ConversationTurn::assistant(thought);
    msg.tool_calls = tool_calls;
    ProviderResponse {
        message: msg,
        usage: None,
        model: "mock-model".into(),
    }
}

/// An evaluator reply in the structured verdict format.
pub fn make_verdict_response(outcome: &str, feedback: &str) -> ProviderResponse {
    make_text_response(
        &serde_json::json!({
            "outcome": outcome,
            "reasoning": format!("{outcome} after review"),
            "feedback": feedback,
        })
        .to_string(),
    )
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> TurnToolCall {
    TurnToolCall {
        id: format!("call_{}", name),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

pub fn context() -> ProfessionalContext {
    ProfessionalContext::from_parts(
        "Senior Engineer, Acme Corp (2019-2023). Staff Engineer, Beta Labs (2023-present). Rust, Kafka, Postgres.",
        "Ada builds data platforms.",
        "Ada is a backend engineer focused on streaming systems.",
    )
}

pub fn persona() -> Persona {
    Persona::new("Ada")
}

pub fn history(question: &str) -> Vec<ConversationTurn> {
    vec![ConversationTurn::user(question)]
}
