//! Drafts, verdicts and the reply that leaves a gate cycle.

use serde::{Deserialize, Serialize};

use crate::tool::ToolResult;

/// How a draft came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftKind {
    /// Generated by the backend
    Answer,
    /// Produced by the scope guard without calling the backend
    Refusal,
}

/// A candidate reply. Exactly one evaluation is made per draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub text: String,

    /// Results of the tools invoked while producing this draft
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,

    /// 1-based attempt number within the cycle
    pub attempt: u32,

    /// Version of the context the draft was grounded on
    pub context_version: String,

    pub kind: DraftKind,
}

impl Draft {
    pub fn answer(text: impl Into<String>, attempt: u32, context_version: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_results: Vec::new(),
            attempt,
            context_version: context_version.into(),
            kind: DraftKind::Answer,
        }
    }

    pub fn refusal(text: impl Into<String>, attempt: u32, context_version: impl Into<String>) -> Self {
        Self {
            kind: DraftKind::Refusal,
            ..Self::answer(text, attempt, context_version)
        }
    }

    pub fn with_tool_results(mut self, results: Vec<ToolResult>) -> Self {
        self.tool_results = results;
        self
    }

    /// Whether two drafts say the same thing, ignoring surrounding whitespace.
    pub fn same_text(&self, other: &Draft) -> bool {
        self.text.trim() == other.text.trim()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Pass => f.write_str("PASS"),
            Outcome::Fail => f.write_str("FAIL"),
        }
    }
}

/// The evaluator's judgement of one draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: Outcome,
    pub reasoning: String,

    /// Actionable correction; non-empty whenever the outcome is FAIL
    #[serde(default)]
    pub feedback: String,

    /// Attempt number of the draft this verdict judges
    #[serde(default)]
    pub draft_attempt: u32,
}

impl Verdict {
    pub fn pass(reasoning: impl Into<String>, draft_attempt: u32) -> Self {
        Self {
            outcome: Outcome::Pass,
            reasoning: reasoning.into(),
            feedback: String::new(),
            draft_attempt,
        }
    }

    /// A failing verdict. Blank feedback falls back to the reasoning so a
    /// FAIL always carries something to act on.
    pub fn fail(reasoning: impl Into<String>, feedback: impl Into<String>, draft_attempt: u32) -> Self {
        let reasoning = reasoning.into();
        let mut feedback = feedback.into();
        if feedback.trim().is_empty() {
            feedback = if reasoning.trim().is_empty() {
                "The reply did not meet the quality bar. Answer again from the context only.".into()
            } else {
                reasoning.clone()
            };
        }
        Self {
            outcome: Outcome::Fail,
            reasoning,
            feedback,
            draft_attempt,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Pass
    }
}

/// What the chat surface receives for one user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReply {
    pub reply_text: String,

    /// Released without a PASS because the retry ceiling was reached
    pub forced_accept: bool,

    /// No usable draft was ever produced; the reply is a fallback message
    pub degraded: bool,

    /// Drafts attempted in this cycle
    pub attempts: u32,
}
