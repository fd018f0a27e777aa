//! The evaluator: one structured verdict per draft.
//!
//! A verdict is strictly PASS or FAIL. Anything that prevents a clean PASS
//! (casual phrasing caught by the lint, a stale context version, output the
//! parser can't read) becomes FAIL with feedback the responder can act on.
//! Backend errors are returned to the caller, which treats them as FAIL too.

use careerchat_core::draft::{Draft, Outcome, Verdict};
use careerchat_core::error::{EvaluatorError, ProviderError};
use careerchat_core::message::{ConversationTurn, Role};
use careerchat_core::profile::ProfessionalContext;
use careerchat_core::prompt::{Persona, PromptTemplates, TemplateId};
use careerchat_core::provider::{Provider, ProviderRequest, ResponseSchema, structured_content};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::guard::ToneLint;

const MALFORMED_FEEDBACK: &str =
    "The reply could not be verified. Answer again using only facts from the context, in a professional tone.";

pub struct Evaluator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    templates: Arc<PromptTemplates>,
    tone: ToneLint,
}

/// Wire shape of the backend's verdict.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    outcome: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    feedback: String,
}

impl Evaluator {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        templates: Arc<PromptTemplates>,
        tone: ToneLint,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            templates,
            tone,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// The JSON schema the backend must answer in.
    pub fn schema() -> ResponseSchema {
        ResponseSchema {
            name: "verdict".into(),
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "outcome": { "type": "string", "enum": ["PASS", "FAIL"] },
                    "reasoning": { "type": "string" },
                    "feedback": { "type": "string" }
                },
                "required": ["outcome", "reasoning", "feedback"],
                "additionalProperties": false
            }),
        }
    }

    /// Judge `draft` as an answer to `question`.
    pub async fn evaluate(
        &self,
        draft: &Draft,
        question: &str,
        history: &[ConversationTurn],
        context: &ProfessionalContext,
        persona: &Persona,
    ) -> Result<Verdict, ProviderError> {
        let casual = self.tone.violations(&draft.text);
        if !casual.is_empty() {
            let quoted = casual.iter().map(|p| format!("\"{p}\"")).collect::<Vec<_>>().join(", ");
            debug!(attempt = draft.attempt, phrases = %quoted, "Tone lint failed draft");
            return Ok(Verdict::fail(
                format!("Casual phrasing: {quoted}"),
                format!("Remove the casual phrasing ({quoted}) and answer in a professional register."),
                draft.attempt,
            ));
        }

        if draft.context_version != context.version {
            warn!(
                attempt = draft.attempt,
                draft_version = %draft.context_version,
                context_version = %context.version,
                "Draft grounded on a different context version"
            );
            return Ok(Verdict::fail(
                "Draft was grounded on a different version of the context",
                "Answer again from the current context.",
                draft.attempt,
            ));
        }

        let system = self.templates.render(
            TemplateId::EvaluatorSystem,
            persona,
            &[("context", &context.render())],
        );
        let body = self.templates.render(
            TemplateId::EvaluatorRequest,
            persona,
            &[
                ("history", &render_history(history)),
                ("question", question),
                ("draft", &draft.text),
                ("tool_results", &render_tool_results(draft)),
            ],
        );

        let request = ProviderRequest::new(
            &self.model,
            vec![ConversationTurn::system(system), ConversationTurn::user(body)],
        )
        .with_temperature(self.temperature)
        .with_schema(Self::schema());

        let response = self.provider.complete(request).await?;

        match parse_verdict(&response.message.content, draft.attempt) {
            Ok(verdict) => Ok(verdict),
            Err(e) => {
                warn!(attempt = draft.attempt, error = %e, "Evaluator output unreadable; failing draft");
                Ok(Verdict::fail(e.to_string(), MALFORMED_FEEDBACK, draft.attempt))
            }
        }
    }
}

/// Read the backend's structured verdict.
pub fn parse_verdict(raw: &str, attempt: u32) -> Result<Verdict, EvaluatorError> {
    let parsed: RawVerdict = serde_json::from_str(structured_content(raw))
        .map_err(|e| EvaluatorError::MalformedOutput(format!("not a verdict object: {e}")))?;

    let outcome = match parsed.outcome.trim().to_ascii_uppercase().as_str() {
        "PASS" => Outcome::Pass,
        "FAIL" => Outcome::Fail,
        other => {
            return Err(EvaluatorError::MalformedOutput(format!(
                "outcome must be PASS or FAIL, got '{other}'"
            )));
        }
    };

    Ok(match outcome {
        Outcome::Pass => Verdict::pass(parsed.reasoning, attempt),
        Outcome::Fail => Verdict::fail(parsed.reasoning, parsed.feedback, attempt),
    })
}

/// Earlier turns, excluding the question under evaluation.
fn render_history(history: &[ConversationTurn]) -> String {
    let end = history
        .iter()
        .rposition(|t| t.role == Role::User)
        .unwrap_or(history.len());

    let lines: Vec<String> = history[..end]
        .iter()
        .filter_map(|t| match t.role {
            Role::User => Some(format!("User: {}", t.content)),
            Role::Assistant if !t.content.is_empty() => Some(format!("Assistant: {}", t.content)),
            _ => None,
        })
        .collect();

    if lines.is_empty() {
        "(no earlier messages)".into()
    } else {
        lines.join("\n")
    }
}

fn render_tool_results(draft: &Draft) -> String {
    if draft.tool_results.is_empty() {
        return "(none)".into();
    }
    draft
        .tool_results
        .iter()
        .map(|r| {
            let status = if r.succeeded { "ok" } else { "failed" };
            format!("- {} [{status}]: {}", r.tool_name, r.output)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use careerchat_core::tool::{ToolCall, ToolResult};
    use serde_json::json;

    fn evaluator(provider: Arc<SequentialMockProvider>) -> Evaluator {
        Evaluator::new(
            provider,
            "judge-model",
            Arc::new(PromptTemplates::builtin()),
            ToneLint::new(&["lol".to_string(), "gonna".to_string()]),
        )
    }

    fn draft(text: &str) -> Draft {
        Draft::answer(text, 1, context().version)
    }

    #[test]
    fn parses_pass_and_fail() {
        let pass = parse_verdict(r#"{"outcome":"PASS","reasoning":"grounded","feedback":""}"#, 2).unwrap();
        assert!(pass.passed());
        assert_eq!(pass.draft_attempt, 2);

        let fail = parse_verdict(
            "```json\n{\"outcome\":\"fail\",\"reasoning\":\"Initech not in context\",\"feedback\":\"Drop Initech.\"}\n```",
            1,
        )
        .unwrap();
        assert!(!fail.passed());
        assert_eq!(fail.feedback, "Drop Initech.");
    }

    #[test]
    fn rejects_non_binary_outcomes() {
        assert!(matches!(
            parse_verdict(r#"{"outcome":"MOSTLY_PASS","reasoning":"x"}"#, 1),
            Err(EvaluatorError::MalformedOutput(_))
        ));
        assert!(parse_verdict(r#"{"score": 0.8}"#, 1).is_err());
        assert!(parse_verdict("Looks good to me!", 1).is_err());
    }

    #[tokio::test]
    async fn malformed_output_is_a_fail_never_a_pass() {
        let provider = Arc::new(SequentialMockProvider::single_text("PASS, looks great"));
        let verdict = evaluator(provider)
            .evaluate(&draft("Ada worked at Acme."), "Where?", &[], &context(), &persona())
            .await
            .unwrap();
        assert_eq!(verdict.outcome, Outcome::Fail);
        assert_eq!(verdict.feedback, MALFORMED_FEEDBACK);
    }

    #[tokio::test]
    async fn tone_lint_fails_without_backend() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let verdict = evaluator(provider.clone())
            .evaluate(&draft("Ada's gonna crush it lol"), "Any good?", &[], &context(), &persona())
            .await
            .unwrap();
        assert!(!verdict.passed());
        assert!(verdict.feedback.contains("\"lol\""));
        assert!(verdict.feedback.contains("\"gonna\""));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn stale_context_version_fails() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let stale = Draft::answer("Ada worked at Acme.", 1, "000000000000");
        let verdict = evaluator(provider.clone())
            .evaluate(&stale, "Where?", &[], &context(), &persona())
            .await
            .unwrap();
        assert!(!verdict.passed());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn request_carries_schema_history_and_tool_results() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_verdict_response("PASS", "")]));
        let call = ToolCall {
            id: "c1".into(),
            name: "search_repositories".into(),
            arguments: json!({}),
        };
        let with_tools = draft("Ada maintains pipeline-kit.").with_tool_results(vec![ToolResult::success(
            &call,
            "- pipeline-kit: Streaming ETL",
            None,
        )]);
        let history = vec![
            ConversationTurn::user("Hi"),
            ConversationTurn::assistant("Hello, I'm Ada."),
            ConversationTurn::user("What are you building?"),
        ];

        let verdict = evaluator(provider.clone())
            .evaluate(&with_tools, "What are you building?", &history, &context(), &persona())
            .await
            .unwrap();
        assert!(verdict.passed());

        let request = provider.request(0);
        assert_eq!(request.model, "judge-model");
        assert_eq!(request.response_schema.unwrap().name, "verdict");
        assert!(request.tools.is_empty());
        let body = &request.messages[1].content;
        assert!(body.contains("User: Hi\nAssistant: Hello, I'm Ada."));
        assert!(!body.contains("User: What are you building?"));
        assert!(body.contains("- search_repositories [ok]: - pipeline-kit: Streaming ETL"));
    }

    #[tokio::test]
    async fn backend_errors_are_returned() {
        let provider = Arc::new(SequentialMockProvider::scripted(vec![Scripted::Fail(
            ProviderError::ServiceUnavailable("503".into()),
        )]));
        let result = evaluator(provider)
            .evaluate(&draft("Ada worked at Acme."), "Where?", &[], &context(), &persona())
            .await;
        assert!(matches!(result, Err(ProviderError::ServiceUnavailable(_))));
    }
}
