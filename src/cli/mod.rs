use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat relay endpoint
    Serve(ServeArgs),
    /// Open an interactive chat against a running relay
    Chat(ChatArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Host address and port for the relay to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// API key for the Gemini API.
    #[arg(long, env = "GEMINI_API_KEY", default_value = "")]
    pub gemini_api_key: String,

    /// Model name for chat completion.
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.5-flash")]
    pub gemini_model: String,

    /// Base URL of the Gemini API.
    #[arg(
        long,
        env = "GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    pub gemini_base_url: String,

    /// Shared-secret password clients must present. Leave unset to disable
    /// the access gate.
    #[arg(long, env = "CHAT_PASSWORD")]
    pub chat_password: Option<String>,

    /// Seconds to wait for Gemini to start answering before the call fails.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "120")]
    pub upstream_timeout_secs: u64,

    /// Optional path to the TLS certificate file (PEM format) for serving
    /// HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for serving
    /// HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// URL of the relay's chat endpoint.
    #[arg(long, env = "RELAY_URL", default_value = "http://127.0.0.1:4000/api/chat")]
    pub relay_url: String,

    /// Password for an access-gated relay. Prompted for interactively when
    /// the relay demands one and this is unset.
    #[arg(long, env = "CHAT_PASSWORD")]
    pub password: Option<String>,
}
