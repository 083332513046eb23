pub mod cli;
pub mod client;
pub mod llm;
pub mod media;
pub mod models;
pub mod server;
pub mod session;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use cli::ServeArgs;
use llm::ProviderConfig;
use llm::gemini::GeminiClient;
use log::info;
use server::Server;

pub async fn run_server(args: ServeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Relay Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Gemini Model: {}", args.gemini_model);
    info!("Gemini Base URL: {}", args.gemini_base_url);
    info!(
        "Access Gate: {}",
        if args.chat_password.is_some() { "enabled" } else { "disabled" }
    );
    info!("Upstream Timeout: {}s", args.upstream_timeout_secs);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("---------------------------");

    let provider = Arc::new(GeminiClient::new(ProviderConfig {
        api_key: args.gemini_api_key.clone(),
        model: args.gemini_model.clone(),
        base_url: args.gemini_base_url.clone(),
        first_byte_timeout: Duration::from_secs(args.upstream_timeout_secs),
    }));

    let addr = args.server_addr.clone();
    info!("Starting relay on: {}", addr);
    let server = Server::new(addr, provider, args);
    server.run().await
}
