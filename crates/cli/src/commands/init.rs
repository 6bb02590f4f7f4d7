//! `tailortalk init`: write a default config file.

use std::path::Path;
use tailortalk_config::AppConfig;

pub fn run(config_path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_path(config_path);

    println!("TailorTalk Setup");
    println!("================\n");

    if path.exists() && !force {
        println!("Config already exists at: {}", path.display());
        println!("   Edit it manually or re-run with --force.\n");
        return Ok(());
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, AppConfig::default_toml())?;

    println!("Created config at: {}", path.display());
    println!("\nNext steps:");
    println!("   1. Set GEMINI_API_KEY or add api_key to the config");
    println!("   2. Point calendar.credentials_file at your service-account key");
    println!("      and share the calendar with that account");
    println!("   3. Run: tailortalk doctor\n");

    Ok(())
}
