use clap::Parser;
use dotenv::dotenv;
use mct_chat::cli::{Cli, Command};
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => mct_chat::run_server(args).await,
        Command::Chat(args) => mct_chat::client::run(args).await,
    }
}
