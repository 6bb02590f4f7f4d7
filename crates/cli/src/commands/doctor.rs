//! `tailortalk doctor`: diagnose configuration and connectivity.

use std::path::Path;
use tailortalk_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("TailorTalk Doctor: System Diagnostics");
    println!("=====================================\n");

    let mut issues: usize = 0;
    let path = super::config_path(config_path);

    if path.exists() {
        println!("  [ok]   Config file found: {}", path.display());
    } else {
        println!("  [warn] No config file at {} (using defaults)", path.display());
    }

    let config = match AppConfig::load_with_env(&path) {
        Ok(config) => {
            println!("  [ok]   Config valid");
            config
        }
        Err(e) => {
            println!("  [fail] Config invalid: {e}");
            println!("\n  1 issue(s) found. Fix the config and re-run.");
            return Err(summary(1).into());
        }
    };

    match tailortalk_calendar::parse_timezone(&config.calendar.timezone) {
        Ok(tz) => println!("  [ok]   Timezone {tz}"),
        Err(e) => {
            println!("  [fail] {e}");
            issues += 1;
        }
    }

    match tailortalk_calendar::build_from_config(&config.calendar) {
        Ok(binding) if config.calendar.backend == "memory" => {
            println!("  [warn] In-memory calendar '{}'; events are not persisted", binding.calendar_id);
        }
        Ok(binding) => println!("  [ok]   Calendar credentials loaded for '{}'", binding.calendar_id),
        Err(e) => {
            println!("  [fail] Calendar: {e}");
            issues += 1;
        }
    }

    match tailortalk_providers::build_from_config(&config) {
        Ok(provider) => {
            println!("  [ok]   Provider '{}' configured", provider.name());
            match provider.health_check().await {
                Ok(true) => println!("  [ok]   Reasoning service reachable"),
                Ok(false) => {
                    println!("  [warn] Reasoning service reported unhealthy");
                    issues += 1;
                }
                Err(e) => {
                    println!("  [fail] Reasoning service: {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  [fail] Provider: {e}");
            issues += 1;
        }
    }

    println!();
    if issues > 0 {
        println!("  {issues} issue(s) found. See above for details.");
        return Err(summary(issues).into());
    }
    println!("  All checks passed!");
    Ok(())
}

fn summary(issues: usize) -> String {
    format!("doctor found {issues} issue(s)")
}
