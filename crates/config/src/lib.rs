//! Configuration loading, validation, and management for careerchat.
//!
//! Loads configuration from `~/.careerchat/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use careerchat_core::Persona;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.careerchat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default backend provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per backend response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Whose profile this assistant speaks for
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Regeneration loop bounds
    #[serde(default)]
    pub gate: GateConfig,

    /// Evaluator backend overrides
    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    /// Context documents and prompt templates
    #[serde(default)]
    pub profile: ProfileConfig,

    /// Tool enable flags and side-channel settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Deterministic scope and tone checks
    #[serde(default)]
    pub scope: ScopeConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("persona", &self.persona)
            .field("gate", &self.gate)
            .field("evaluator", &self.evaluator)
            .field("profile", &self.profile)
            .field("tools", &self.tools)
            .field("scope", &self.scope)
            .field("gateway", &self.gateway)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("contact_enabled", &self.contact_enabled)
            .field("job_match_enabled", &self.job_match_enabled)
            .field("repo_search_enabled", &self.repo_search_enabled)
            .field("notify_enabled", &self.notify_enabled)
            .field("github_username", &self.github_username)
            .field("github_api_url", &self.github_api_url)
            .field("contact_store_path", &self.contact_store_path)
            .field("pushover_token", &redact(&self.pushover_token))
            .field("pushover_user", &redact(&self.pushover_user))
            .field("pushover_url", &self.pushover_url)
            .field("http_timeout_ms", &self.http_timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_persona_name")]
    pub name: String,
}

fn default_persona_name() -> String {
    "Alex Morgan".into()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: default_persona_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Attempt ceiling per user turn
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,

    #[serde(default = "default_evaluation_timeout_ms")]
    pub evaluation_timeout_ms: u64,

    /// Backend round-trips allowed for tool calls within one draft
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
}

fn default_max_retries() -> u32 {
    3
}
fn default_generation_timeout_ms() -> u64 {
    45_000
}
fn default_evaluation_timeout_ms() -> u64 {
    30_000
}
fn default_max_tool_rounds() -> u32 {
    4
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            generation_timeout_ms: default_generation_timeout_ms(),
            evaluation_timeout_ms: default_evaluation_timeout_ms(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Provider for evaluation; falls back to `default_provider`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Model for evaluation; falls back to `default_model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_evaluator_temperature")]
    pub temperature: f32,
}

fn default_evaluator_temperature() -> f32 {
    0.0
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            temperature: default_evaluator_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default = "default_resume_path")]
    pub resume_path: PathBuf,

    #[serde(default = "default_profile_path")]
    pub profile_path: PathBuf,

    #[serde(default = "default_summary_path")]
    pub summary_path: PathBuf,

    /// Directory of `<template>.md` overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<PathBuf>,
}

fn default_resume_path() -> PathBuf {
    AppConfig::config_dir().join("me").join("resume.pdf")
}
fn default_profile_path() -> PathBuf {
    AppConfig::config_dir().join("me").join("linkedin.pdf")
}
fn default_summary_path() -> PathBuf {
    AppConfig::config_dir().join("me").join("summary.txt")
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            resume_path: default_resume_path(),
            profile_path: default_profile_path(),
            summary_path: default_summary_path(),
            templates_dir: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_true")]
    pub contact_enabled: bool,

    #[serde(default = "default_true")]
    pub job_match_enabled: bool,

    #[serde(default = "default_true")]
    pub repo_search_enabled: bool,

    #[serde(default = "default_true")]
    pub notify_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_username: Option<String>,

    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// JSONL file that captured contacts are appended to
    #[serde(default = "default_contact_store_path")]
    pub contact_store_path: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pushover_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pushover_user: Option<String>,

    #[serde(default = "default_pushover_url")]
    pub pushover_url: String,

    /// Timeout for outbound side-channel requests
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
}

fn default_github_api_url() -> String {
    "https://api.github.com".into()
}
fn default_contact_store_path() -> PathBuf {
    AppConfig::config_dir().join("contacts.jsonl")
}
fn default_pushover_url() -> String {
    "https://api.pushover.net/1/messages.json".into()
}
fn default_http_timeout_ms() -> u64 {
    10_000
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            contact_enabled: true,
            job_match_enabled: true,
            repo_search_enabled: true,
            notify_enabled: true,
            github_username: None,
            github_api_url: default_github_api_url(),
            contact_store_path: default_contact_store_path(),
            pushover_token: None,
            pushover_user: None,
            pushover_url: default_pushover_url(),
            http_timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl ToolsConfig {
    pub fn has_pushover(&self) -> bool {
        self.pushover_token.is_some() && self.pushover_user.is_some()
    }
}

/// Phrase lists for the deterministic pre-checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Topics refused without calling the backend
    #[serde(default = "default_personal_topics")]
    pub personal_topics: Vec<String>,

    /// Phrases that fail a draft on tone
    #[serde(default = "default_casual_markers")]
    pub casual_markers: Vec<String>,
}

fn default_personal_topics() -> Vec<String> {
    [
        "salary",
        "salary expectation",
        "compensation",
        "how much do you earn",
        "how old are you",
        "your age",
        "religion",
        "religious",
        "girlfriend",
        "boyfriend",
        "married",
        "relationship status",
        "health condition",
        "home address",
        "where do you live",
        "political views",
        "who did you vote",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_casual_markers() -> Vec<String> {
    ["lol", "lmao", "gonna", "wanna", "dude", "bro", "omg", "ya know", "kinda"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            personal_topics: default_personal_topics(),
            casual_markers: default_casual_markers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Live sessions kept before the least recently used idle one is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Browser origins allowed to call the API; empty means same-origin only
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    7860
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_sessions() -> usize {
    1000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_sessions: default_max_sessions(),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.careerchat/config.toml).
    ///
    /// Environment overrides:
    /// - `CAREERCHAT_API_KEY`, then `OPENAI_API_KEY` (only when no key is configured)
    /// - `CAREERCHAT_MODEL`
    /// - `CAREERCHAT_PERSONA`
    /// - `GITHUB_USERNAME`
    /// - `PUSHOVER_TOKEN`, `PUSHOVER_USER`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = var("CAREERCHAT_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }
        if let Some(model) = var("CAREERCHAT_MODEL") {
            self.default_model = model;
        }
        if let Some(name) = var("CAREERCHAT_PERSONA") {
            self.persona.name = name;
        }
        if let Some(user) = var("GITHUB_USERNAME") {
            self.tools.github_username = Some(user);
        }
        if let Some(token) = var("PUSHOVER_TOKEN") {
            self.tools.pushover_token = Some(token);
        }
        if let Some(user) = var("PUSHOVER_USER") {
            self.tools.pushover_user = Some(user);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".careerchat")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, t) in [
            ("default_temperature", self.default_temperature),
            ("evaluator.temperature", self.evaluator.temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 2.0"
                )));
            }
        }

        if self.gate.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "gate.max_retries must be at least 1".into(),
            ));
        }

        if self.gate.generation_timeout_ms == 0 || self.gate.evaluation_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "gate timeouts must be greater than 0".into(),
            ));
        }

        if self.gate.max_tool_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "gate.max_tool_rounds must be at least 1".into(),
            ));
        }

        if self.persona.name.trim().is_empty() {
            return Err(ConfigError::ValidationError("persona.name must not be empty".into()));
        }

        if self.gateway.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_sessions must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The persona every prompt is rendered for.
    pub fn persona(&self) -> Persona {
        Persona {
            name: self.persona.name.clone(),
            github_username: self.tools.github_username.clone(),
        }
    }

    /// Provider and model the evaluator should use.
    pub fn evaluator_target(&self) -> (&str, &str) {
        (
            self.evaluator.provider.as_deref().unwrap_or(&self.default_provider),
            self.evaluator.model.as_deref().unwrap_or(&self.default_model),
        )
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            persona: PersonaConfig::default(),
            gate: GateConfig::default(),
            evaluator: EvaluatorConfig::default(),
            profile: ProfileConfig::default(),
            tools: ToolsConfig::default(),
            scope: ScopeConfig::default(),
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
