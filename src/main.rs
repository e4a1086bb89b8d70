use anyhow::Result;
use ratewarden::config::Config;
use ratewarden::config_validator::ConfigValidator;
use ratewarden::logging;
use ratewarden::server::Server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = Config::from_env();

    logging::init(&config.log_level, config.log_format);

    ConfigValidator::validate(&config)
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    tracing::info!(app = %config.app_name, "Starting rate limit service");
    tracing::info!(
        bind_addr = %config.bind_addr(),
        in_memory_store = config.in_memory_store,
        "Configuration loaded"
    );

    let server = Server::new(&config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create server: {}", e))?;

    server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    tracing::info!("Rate limit service stopped");
    Ok(())
}
