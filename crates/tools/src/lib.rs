//! Tool implementations for careerchat.
//!
//! Tools let the responder reach outside the fixed context:
//! capture a visitor's contact details, score a job description, list
//! public repositories, and alert the operator about unanswered questions.
//!
//! Each tool talks to its side channel through a narrow trait
//! ([`ContactStore`], [`RepoSource`], [`Notifier`]) so tests and dry runs
//! can swap in in-memory implementations.

pub mod contact;
pub mod job_match;
pub mod notify;
pub mod registry;
pub mod repo_search;

pub use contact::{ContactRecord, ContactStore, ContactTool, FileContactStore, MemoryContactStore};
pub use job_match::{Fit, JobMatch, JobMatchTool};
pub use notify::{Alert, LogNotifier, Notifier, NotifyTool, PushoverNotifier, RecordingNotifier};
pub use registry::{CycleScope, ToolRegistry};
pub use repo_search::{GitHubRepoSource, RepoSearchTool, RepoSource, Repository, StaticRepoSource};

use careerchat_config::AppConfig;
use careerchat_core::{Persona, ProfessionalContext, PromptTemplates, Provider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The notifier configured for this process: Pushover when credentials are
/// present, the log otherwise.
pub fn build_notifier(config: &AppConfig) -> Arc<dyn Notifier> {
    let tools = &config.tools;
    match (&tools.pushover_token, &tools.pushover_user) {
        (Some(token), Some(user)) => Arc::new(PushoverNotifier::new(
            token,
            user,
            &tools.pushover_url,
            Duration::from_millis(tools.http_timeout_ms),
        )),
        _ => {
            warn!("No Pushover credentials configured; alerts will only be logged");
            Arc::new(LogNotifier)
        }
    }
}

/// Build the registry from config. Tools switched off in `[tools]` stay
/// disabled; repository search is also disabled without a GitHub username.
pub fn build_registry(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    context: Arc<ProfessionalContext>,
    templates: Arc<PromptTemplates>,
    notifier: Arc<dyn Notifier>,
) -> ToolRegistry {
    let tools = &config.tools;
    let persona: Persona = config.persona();
    let mut registry = ToolRegistry::new();

    if tools.contact_enabled {
        registry = registry.with_contact(ContactTool::new(Arc::new(FileContactStore::new(
            &tools.contact_store_path,
        ))));
    }

    if tools.job_match_enabled {
        registry = registry.with_job_match(JobMatchTool::new(
            provider,
            &config.default_model,
            context,
            templates,
            persona.clone(),
        ));
    }

    if tools.repo_search_enabled {
        match &tools.github_username {
            Some(user) => {
                registry = registry.with_repo_search(RepoSearchTool::new(Arc::new(
                    GitHubRepoSource::new(
                        user,
                        &tools.github_api_url,
                        Duration::from_millis(tools.http_timeout_ms),
                    ),
                )));
            }
            None => warn!("Repository search enabled but no GitHub username is set; disabling it"),
        }
    }

    if tools.notify_enabled {
        registry = registry.with_notify(NotifyTool::new(notifier, persona));
    }

    info!(tools = ?registry.enabled(), "Tool registry ready");
    registry
}
