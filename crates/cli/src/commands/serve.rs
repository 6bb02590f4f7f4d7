//! `tailortalk serve`: start the HTTP API server.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    println!("TailorTalk Gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {} ({})", config.provider_model(), config.default_provider);
    println!("   Calendar:  {} [{}]", config.calendar.calendar_id, config.calendar.timezone);

    tailortalk_gateway::start(config).await?;

    Ok(())
}
