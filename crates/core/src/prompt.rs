//! Prompt templates and the assistant persona.
//!
//! Templates are a typed map keyed by [`TemplateId`]. Built-in defaults cover
//! every id; a templates directory may override any of them with a
//! `<id>.md` file. The map is loaded once at startup, next to the context.
//!
//! Placeholders use `{name}` syntax and are filled by [`PromptTemplates::render`].
//! The persona is never baked into a template: callers pass it explicitly.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::ContextLoadError;

/// Who the assistant speaks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// The person whose profile is being discussed
    pub name: String,

    /// Code-hosting username, when repository lookup is available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_username: Option<String>,
}

impl Persona {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            github_username: None,
        }
    }

    pub fn with_github(mut self, username: impl Into<String>) -> Self {
        self.github_username = Some(username.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateId {
    ResponderSystem,
    RetryFeedback,
    Refusal,
    DegradedApology,
    EvaluatorSystem,
    EvaluatorRequest,
    JobMatchSystem,
}

impl TemplateId {
    pub const ALL: [TemplateId; 7] = [
        TemplateId::ResponderSystem,
        TemplateId::RetryFeedback,
        TemplateId::Refusal,
        TemplateId::DegradedApology,
        TemplateId::EvaluatorSystem,
        TemplateId::EvaluatorRequest,
        TemplateId::JobMatchSystem,
    ];

    /// File stem used for overrides.
    pub fn key(self) -> &'static str {
        match self {
            TemplateId::ResponderSystem => "responder_system",
            TemplateId::RetryFeedback => "retry_feedback",
            TemplateId::Refusal => "refusal",
            TemplateId::DegradedApology => "degraded_apology",
            TemplateId::EvaluatorSystem => "evaluator_system",
            TemplateId::EvaluatorRequest => "evaluator_request",
            TemplateId::JobMatchSystem => "job_match_system",
        }
    }

    fn default_text(self) -> &'static str {
        match self {
            TemplateId::ResponderSystem => concat!(
                "You are acting as {persona_name}. You are answering questions on {persona_name}'s ",
                "website, particularly questions related to {persona_name}'s career, background, ",
                "skills and experience. Represent {persona_name} faithfully and professionally, as ",
                "if talking to a potential client or future employer.\n\n",
                "Follow these rules in order:\n",
                "1. If the question is personal or not about {persona_name}'s professional life ",
                "(salary, family, health, politics, religion and similar), politely decline and ",
                "steer back to professional topics. Do not call any tool.\n",
                "2. Answer from the context below when it holds the information. Never mention a ",
                "company, date, title or project that does not appear in the context or in a tool ",
                "result.\n",
                "3. For current projects or code samples call search_repositories{github_note}. ",
                "For questions about fit with a specific role call evaluate_job_match. When the ",
                "user shares an email address call record_user_details.\n",
                "4. If neither the context nor a tool can answer, say so plainly, offer to put the ",
                "user in touch with {persona_name} directly, ask for their email, and call ",
                "record_unknown_question once with the question.\n",
                "5. Address every part of a multi-part question. Keep a professional register.\n\n",
                "## Context\n\n{context}",
            ),
            TemplateId::RetryFeedback => concat!(
                "Your previous answer was rejected by quality control.\n\n",
                "## Previous answer\n{previous_draft}\n\n",
                "## Reason for rejection\n{feedback}\n\n",
                "Write a new answer to the user's last message that fixes every point above. ",
                "Do not repeat any claim that was flagged.",
            ),
            TemplateId::Refusal => concat!(
                "Thank you for the question. I keep this conversation focused on {persona_name}'s ",
                "professional background, so that is not something I can discuss here. I would be ",
                "glad to answer questions about {persona_name}'s experience, skills or projects, ",
                "or to pass along a message if you share your email address.",
            ),
            TemplateId::DegradedApology => concat!(
                "I'm sorry, I'm unable to give a reliable answer right now. Please try again in a ",
                "moment, or share your email address and {persona_name} will follow up with you ",
                "directly.",
            ),
            TemplateId::EvaluatorSystem => concat!(
                "You are an evaluator that decides whether a reply is acceptable. The assistant is ",
                "playing the role of {persona_name} on {persona_name}'s website and must stay ",
                "professional and engaging.\n\n",
                "Fail the reply if any of these checks fails, and name the exact problem in the ",
                "feedback:\n",
                "- Groundedness: every factual claim (companies, dates, titles, projects, skills) ",
                "must appear in the context below or in an attached tool result.\n",
                "- Scope: personal or inappropriate questions must be politely refused; ",
                "professional questions must be answered, not refused.\n",
                "- Completeness: every part of a multi-part question must be addressed.\n",
                "- Tone: professional register; no slang or overly casual phrasing.\n",
                "- Unknowns: when the answer is not available, the reply must offer direct ",
                "contact instead of guessing.\n\n",
                "Respond only with JSON: {\"outcome\": \"PASS\" | \"FAIL\", \"reasoning\": string, ",
                "\"feedback\": string}. Leave feedback empty on PASS.\n\n",
                "## Context\n\n{context}",
            ),
            TemplateId::EvaluatorRequest => concat!(
                "## Conversation so far\n{history}\n\n",
                "## Latest question\n{question}\n\n",
                "## Draft reply\n{draft}\n\n",
                "## Tool results attached to this draft\n{tool_results}\n\n",
                "Evaluate the draft reply.",
            ),
            TemplateId::JobMatchSystem => concat!(
                "You assess how well {persona_name} fits a job, using only the context below. ",
                "Do not credit skills or experience the context does not show.\n\n",
                "Respond only with JSON: {\"overall_fit\": \"strong\" | \"moderate\" | \"weak\", ",
                "\"score\": integer 0-100, \"matching_skills\": [string], \"gaps\": [string], ",
                "\"summary\": string}.\n\n",
                "## Context\n\n{context}",
            ),
        }
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// The loaded template map.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    templates: HashMap<TemplateId, String>,
}

impl PromptTemplates {
    /// Built-in templates only.
    pub fn builtin() -> Self {
        Self {
            templates: TemplateId::ALL
                .into_iter()
                .map(|id| (id, id.default_text().to_string()))
                .collect(),
        }
    }

    /// Built-in templates, overridden by `<id>.md` files in `dir` when present.
    pub fn load(dir: Option<&Path>) -> Result<Self, ContextLoadError> {
        let mut templates = Self::builtin();
        let Some(dir) = dir else {
            return Ok(templates);
        };

        for id in TemplateId::ALL {
            let path = dir.join(format!("{}.md", id.key()));
            if !path.is_file() {
                continue;
            }
            let text = std::fs::read_to_string(&path).map_err(|e| ContextLoadError::Template {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            if text.trim().is_empty() {
                continue;
            }
            debug!(template = %id, file = %path.display(), "Template override loaded");
            templates.templates.insert(id, text.trim().to_string());
        }

        Ok(templates)
    }

    /// Replace a template in place.
    pub fn set(&mut self, id: TemplateId, text: impl Into<String>) {
        self.templates.insert(id, text.into());
    }

    pub fn raw(&self, id: TemplateId) -> &str {
        self.templates
            .get(&id)
            .map(String::as_str)
            .unwrap_or_else(|| id.default_text())
    }

    /// Fill a template. Persona placeholders are always available; `vars`
    /// supplies the rest. Unknown placeholders are left as-is.
    pub fn render(&self, id: TemplateId, persona: &Persona, vars: &[(&str, &str)]) -> String {
        let github_note = persona
            .github_username
            .as_deref()
            .map(|u| format!(" (repositories of GitHub user {u})"))
            .unwrap_or_default();

        let lookup = |name: &str| match name {
            "persona_name" => Some(persona.name.as_str()),
            "github_note" => Some(github_note.as_str()),
            _ => vars.iter().find(|(key, _)| *key == name).map(|(_, value)| *value),
        };

        // Single pass: inserted values are never scanned for placeholders
        let template = self.raw(id);
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open + 1..];
            let value = tail
                .find('}')
                .and_then(|close| lookup(&tail[..close]).map(|value| (value, close)));
            match value {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = tail;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::builtin()
    }
}
