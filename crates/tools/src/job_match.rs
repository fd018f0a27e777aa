//! Role-fit scoring — `evaluate_job_match`.
//!
//! Asks the backend for a structured assessment of a job description
//! against the professional context.

use careerchat_core::error::ToolError;
use careerchat_core::message::ConversationTurn;
use careerchat_core::profile::ProfessionalContext;
use careerchat_core::prompt::{Persona, PromptTemplates, TemplateId};
use careerchat_core::provider::{Provider, ProviderRequest, ResponseSchema, structured_content};
use careerchat_core::tool::{ToolCall, ToolKind, ToolResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fit {
    Strong,
    Moderate,
    Weak,
}

/// A structured role-fit assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMatch {
    pub overall_fit: Fit,
    pub score: u8,
    #[serde(default)]
    pub matching_skills: Vec<String>,
    #[serde(default)]
    pub gaps: Vec<String>,
    pub summary: String,
}

impl JobMatch {
    pub fn schema() -> ResponseSchema {
        ResponseSchema {
            name: "job_match".into(),
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "overall_fit": { "type": "string", "enum": ["strong", "moderate", "weak"] },
                    "score": { "type": "integer", "minimum": 0, "maximum": 100 },
                    "matching_skills": { "type": "array", "items": { "type": "string" } },
                    "gaps": { "type": "array", "items": { "type": "string" } },
                    "summary": { "type": "string" }
                },
                "required": ["overall_fit", "score", "matching_skills", "gaps", "summary"],
                "additionalProperties": false
            }),
        }
    }

    fn render(&self) -> String {
        let list = |items: &[String]| {
            if items.is_empty() {
                "none".to_string()
            } else {
                items.join(", ")
            }
        };
        format!(
            "Overall fit: {:?} ({}/100)\nMatching skills: {}\nGaps: {}\nSummary: {}",
            self.overall_fit,
            self.score,
            list(&self.matching_skills),
            list(&self.gaps),
            self.summary
        )
    }
}

pub struct JobMatchTool {
    provider: Arc<dyn Provider>,
    model: String,
    context: Arc<ProfessionalContext>,
    templates: Arc<PromptTemplates>,
    persona: Persona,
}

impl JobMatchTool {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        context: Arc<ProfessionalContext>,
        templates: Arc<PromptTemplates>,
        persona: Persona,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            context,
            templates,
            persona,
        }
    }

    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: ToolKind::JobMatch.name().into(),
            reason,
        };

        let description = call
            .arguments
            .get("job_description")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let title = call.arguments.get("role_title").and_then(|v| v.as_str());

        let system = self.templates.render(
            TemplateId::JobMatchSystem,
            &self.persona,
            &[("context", &self.context.render())],
        );
        let mut prompt = String::new();
        if let Some(title) = title {
            prompt.push_str(&format!("Role: {title}\n\n"));
        }
        prompt.push_str("Job description:\n");
        prompt.push_str(description);

        let request = ProviderRequest::new(
            &self.model,
            vec![ConversationTurn::system(system), ConversationTurn::user(prompt)],
        )
        .with_temperature(0.0)
        .with_schema(JobMatch::schema());

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| failed(e.to_string()))?;

        let assessment: JobMatch = serde_json::from_str(structured_content(&response.message.content))
            .map_err(|e| failed(format!("assessment was not valid JSON: {e}")))?;
        if assessment.score > 100 {
            return Err(failed(format!("score {} is out of range", assessment.score)));
        }

        debug!(fit = ?assessment.overall_fit, score = assessment.score, "Job match assessed");

        let data = serde_json::to_value(&assessment).map_err(|e| failed(e.to_string()))?;
        Ok(ToolResult::success(call, assessment.render(), Some(data)))
    }
}
