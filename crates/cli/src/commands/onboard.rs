//! `careerchat onboard` — First-time setup.

use careerchat_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let profile_dir = config_dir.join("me");

    println!("careerchat — First-Time Setup");
    println!("=============================\n");

    // Create directories
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if !profile_dir.exists() {
        std::fs::create_dir_all(&profile_dir)?;
        println!("Created profile directory: {}", profile_dir.display());
    }

    let summary_path = profile_dir.join("summary.txt");
    if !summary_path.exists() {
        std::fs::write(
            &summary_path,
            concat!(
                "Replace this file with a short professional summary.\n",
                "It is shown to the assistant alongside your resume and profile.\n",
            ),
        )?;
        println!("Created summary.txt");
    }

    // Create config file
    if config_path.exists() {
        println!("\nConfig already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("Created config.toml at: {}", config_path.display());
        println!("\nNext steps:");
        println!("   1. Set persona.name and your API key in {}", config_path.display());
        println!("   2. Put resume.pdf and linkedin.pdf in {}", profile_dir.display());
        println!("   3. Run: careerchat context");
        println!("   4. Run: careerchat chat\n");
    }

    Ok(())
}
