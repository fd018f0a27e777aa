//! `careerchat context` — Load the professional context and show what was read.

use careerchat_core::profile::{ContextSources, ContextStore};
use careerchat_core::prompt::{PromptTemplates, TemplateId};

use super::load_config;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    let context = ContextStore::new(ContextSources {
        resume: config.profile.resume_path.clone(),
        profile: config.profile.profile_path.clone(),
        summary: config.profile.summary_path.clone(),
    })
    .load()
    .map_err(|e| format!("Context could not be loaded: {e}"))?;

    let templates = PromptTemplates::load(config.profile.templates_dir.as_deref())
        .map_err(|e| format!("Templates could not be loaded: {e}"))?;
    let builtin = PromptTemplates::builtin();

    println!("careerchat context");
    println!("==================");
    println!("  Persona: {}", config.persona.name);
    println!();
    print!("{}", context.diagnostic_summary());
    println!();
    println!("  Templates:");
    for id in TemplateId::ALL {
        let source = if templates.raw(id) == builtin.raw(id) {
            "built-in"
        } else {
            "override"
        };
        println!("    {:<18} {source}", id.key());
    }

    Ok(())
}
