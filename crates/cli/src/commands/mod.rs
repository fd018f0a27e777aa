pub mod chat;
pub mod context;
pub mod onboard;
pub mod serve;

use careerchat_config::AppConfig;

/// Load config, turning errors into a message fit for the terminal.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Refuse to start against a hosted provider without a key.
pub fn require_api_key(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let local = matches!(config.default_provider.as_str(), "ollama" | "vllm" | "llamacpp");
    if config.has_api_key() || local {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    CAREERCHAT_API_KEY = 'sk-...'   (generic)");
    eprintln!("    OPENAI_API_KEY     = 'sk-...'   (for OpenAI direct)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}
