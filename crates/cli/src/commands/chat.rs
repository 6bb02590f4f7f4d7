//! `tailortalk chat`: single-shot or interactive chat.
//!
//! Every line is its own session; the agent does not remember earlier lines.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tailortalk_agent::{AgentLoop, run_session};
use tailortalk_core::event::EventBus;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    // Check for API key early; give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GEMINI_API_KEY=...       (Gemini, the default provider)");
        eprintln!("    OPENAI_API_KEY=sk-...    (with default_provider = \"openai\")");
        eprintln!("    TAILORTALK_API_KEY=...   (generic)");
        eprintln!();
        eprintln!("  Or add api_key to {}", super::config_path(config_path).display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let agent = AgentLoop::from_config(&config, Arc::new(EventBus::default()))?;

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let outcome = run_session(&agent, &msg).await;
        eprint!("\r              \r");
        println!("{}", outcome?.answer);
        return Ok(());
    }

    println!();
    println!("  TailorTalk: Interactive Mode");
    println!();
    println!("  Model:     {}", config.provider_model());
    println!("  Calendar:  {}", config.calendar.calendar_id);
    println!("  Timezone:  {}", config.calendar.timezone);
    println!("  Tools:     {}", agent.tools().names().join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        eprint!("  ...");
        match run_session(&agent, line).await {
            Ok(outcome) => {
                eprint!("\r     \r");
                println!();
                for text in outcome.answer.lines() {
                    println!("  Assistant > {text}");
                }
                println!();
            }
            Err(e) => {
                tracing::debug!(error = %e, "Session failed");
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
