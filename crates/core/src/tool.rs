//! Tool kinds, calls and results.
//!
//! The set of tools is closed: [`ToolKind`] enumerates every capability the
//! responder may invoke, and each variant declares its wire name, description
//! and argument schema. Dispatch lives in the tools crate; this module only
//! owns the shapes and the schema check.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// Every tool the responder can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Capture a visitor's contact details for follow-up
    Contact,
    /// Score a job description against the profile
    JobMatch,
    /// Look up public code repositories
    RepoSearch,
    /// Alert the operator about a question the profile cannot answer
    Notify,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::Contact,
        ToolKind::JobMatch,
        ToolKind::RepoSearch,
        ToolKind::Notify,
    ];

    /// The function name advertised to the backend.
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Contact => "record_user_details",
            ToolKind::JobMatch => "evaluate_job_match",
            ToolKind::RepoSearch => "search_repositories",
            ToolKind::Notify => "record_unknown_question",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::Contact => {
                "Record that a user wants to get in touch and has provided an email address. \
                 Use this whenever the user shares contact details."
            }
            ToolKind::JobMatch => {
                "Assess how well the profile fits a job description. Returns an overall fit, \
                 a 0-100 score, matching skills, gaps and a short summary."
            }
            ToolKind::RepoSearch => {
                "List public code repositories, optionally filtered by a keyword. \
                 Use this for questions about current projects or code samples."
            }
            ToolKind::Notify => {
                "Record a question that could not be answered from the profile or other tools, \
                 so the person can follow up directly. Call at most once per question."
            }
        }
    }

    /// JSON schema for this tool's arguments.
    pub fn parameters_schema(self) -> Value {
        match self {
            ToolKind::Contact => serde_json::json!({
                "type": "object",
                "properties": {
                    "email": { "type": "string", "description": "The user's email address" },
                    "name": { "type": "string", "description": "The user's name, if provided" },
                    "notes": { "type": "string", "description": "Context worth passing on" }
                },
                "required": ["email"]
            }),
            ToolKind::JobMatch => serde_json::json!({
                "type": "object",
                "properties": {
                    "job_description": { "type": "string", "description": "Full text of the job posting" },
                    "role_title": { "type": "string", "description": "Title of the role, if known" }
                },
                "required": ["job_description"]
            }),
            ToolKind::RepoSearch => serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Keyword to filter repositories by" }
                },
                "required": []
            }),
            ToolKind::Notify => serde_json::json!({
                "type": "object",
                "properties": {
                    "question": { "type": "string", "description": "The question that could not be answered" }
                },
                "required": ["question"]
            }),
        }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }

    /// Key under which a call is deduplicated within one gate cycle.
    ///
    /// A user turn raises at most one operator alert, so `Notify` keys on the
    /// kind alone. Contact capture keys on the address. Read-only tools key on
    /// their full canonical arguments.
    pub fn dedup_key(self, arguments: &Value) -> String {
        match self {
            ToolKind::Notify => self.name().to_string(),
            ToolKind::Contact => {
                let email = arguments
                    .get("email")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_lowercase();
                format!("{}:{}", self.name(), email)
            }
            ToolKind::JobMatch | ToolKind::RepoSearch => {
                format!("{}:{}", self.name(), canonical_json(arguments))
            }
        }
    }

    /// Check arguments against the declared schema.
    pub fn validate(self, arguments: &Value) -> Result<(), ToolError> {
        let invalid = |reason: String| ToolError::InvalidArguments {
            tool_name: self.name().to_string(),
            reason,
        };

        let args = arguments
            .as_object()
            .ok_or_else(|| invalid("arguments must be a JSON object".into()))?;

        let schema = self.parameters_schema();
        let properties = schema["properties"].as_object().cloned().unwrap_or_default();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        for key in &required {
            match args.get(*key) {
                None | Some(Value::Null) => {
                    return Err(invalid(format!("missing required field '{key}'")));
                }
                _ => {}
            }
        }

        for (key, value) in args {
            let Some(declared) = properties.get(key) else {
                return Err(invalid(format!("unknown field '{key}'")));
            };
            if value.is_null() {
                continue;
            }
            let expected = declared["type"].as_str().unwrap_or("string");
            if !type_matches(expected, value) {
                return Err(invalid(format!("field '{key}' must be of type {expected}")));
            }
            if required.contains(&key.as_str()) && value.as_str().is_some_and(|s| s.trim().is_empty())
            {
                return Err(invalid(format!("field '{key}' must not be empty")));
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

/// Serialize with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut sorted = Map::new();
                for k in keys {
                    sorted.insert(k.clone(), sort(&map[k]));
                }
                Value::Object(sorted)
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

/// A request to execute a tool. Immutable once issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call ID (matches the backend's tool_call.id)
    pub id: String,

    /// Name of the tool to execute, as the backend spelled it
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: Value,
}

impl ToolCall {
    /// Build a call from an assistant turn's raw tool call. Unparsable
    /// argument text becomes a string value so validation can reject it.
    pub fn from_turn(call: &crate::message::TurnToolCall) -> Self {
        let arguments = serde_json::from_str(&call.arguments)
            .unwrap_or_else(|_| Value::String(call.arguments.clone()));
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        }
    }

    pub fn kind(&self) -> Option<ToolKind> {
        ToolKind::from_name(&self.name)
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result answers
    pub call_id: String,

    /// Which tool produced it
    pub tool_name: String,

    /// Whether the tool executed successfully
    pub succeeded: bool,

    /// Human-readable output fed back to the responder
    pub output: String,

    /// Optional structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Why the call failed, when it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(call: &ToolCall, output: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            succeeded: true,
            output: output.into(),
            data,
            error: None,
        }
    }

    pub fn failure(call: &ToolCall, error: &ToolError) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            succeeded: false,
            output: format!("Error: {error}"),
            data: None,
            error: Some(error.to_string()),
        }
    }

    /// Re-address a cached result to a new call ID.
    pub fn for_call(&self, call: &ToolCall) -> Self {
        Self {
            call_id: call.id.clone(),
            ..self.clone()
        }
    }
}
