//! Backend resolution: maps the configured provider names onto clients.
//!
//! The responder and the evaluator are resolved independently so the judge
//! can run on a different vendor (or a local model) than the drafter.

use careerchat_config::AppConfig;
use careerchat_core::error::ProviderError;
use careerchat_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::openai_compat::OpenAiCompatProvider;

/// Named backends available to the pipeline.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
}

/// The two backends one gate cycle talks to.
pub struct Backends {
    pub responder: Arc<dyn Provider>,
    pub evaluator: Arc<dyn Provider>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Pick the responder and evaluator backends named by `config`.
    pub fn backends(&self, config: &AppConfig) -> Result<Backends, ProviderError> {
        let lookup = |name: &str| {
            self.get(name)
                .ok_or_else(|| ProviderError::NotConfigured(format!("no backend named '{name}'")))
        };
        let (evaluator_name, _) = config.evaluator_target();
        Ok(Backends {
            responder: lookup(&config.default_provider)?,
            evaluator: lookup(evaluator_name)?,
        })
    }
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a client for every provider the config mentions.
///
/// Explicit `[providers.<name>]` tables win; the responder and evaluator
/// providers are added from well-known defaults when they have no table.
/// A name with neither a table nor a known endpoint is an error.
pub fn build_from_config(config: &AppConfig) -> Result<ProviderRouter, ProviderError> {
    let mut router = ProviderRouter::new();

    for (name, entry) in &config.providers {
        let key = entry.api_key.as_deref().or(config.api_key.as_deref()).unwrap_or_default();
        let url = match &entry.api_url {
            Some(url) => url.clone(),
            None => known_endpoint(name)
                .ok_or_else(|| ProviderError::NotConfigured(format!("'{name}' needs an api_url")))?
                .to_string(),
        };
        debug!(provider = %name, url = %url, "Registering configured backend");
        router.register(name.clone(), Arc::new(OpenAiCompatProvider::new(name, url, key)));
    }

    let (evaluator_name, _) = config.evaluator_target();
    for name in [config.default_provider.as_str(), evaluator_name] {
        if router.get(name).is_some() {
            continue;
        }
        let url = known_endpoint(name)
            .ok_or_else(|| ProviderError::NotConfigured(format!("'{name}' has no [providers] entry")))?;
        let key = config.api_key.as_deref().unwrap_or_default();
        router.register(name, Arc::new(OpenAiCompatProvider::new(name, url, key)));
    }

    Ok(router)
}

/// Chat-completions endpoint for vendors that don't need an `api_url`.
fn known_endpoint(name: &str) -> Option<&'static str> {
    Some(match name {
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "gemini" | "google" => "https://generativelanguage.googleapis.com/v1beta/openai",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "ollama" => "http://localhost:11434/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" => "http://localhost:8080/v1",
        _ => return None,
    })
}
