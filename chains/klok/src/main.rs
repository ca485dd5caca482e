use klok_project::account::AccountEnv;
use klok_project::client::HttpSessionFactory;
use klok_project::events::{EventKind, EventSinkExt, TracingSink};
use klok_project::prompt::PromptSource;
use klok_project::{Driver, KlokConfig};

use anyhow::Result;
use clap::Parser;
use core_logic::{setup_logger, CredentialLoader, TerminalCountdown, TokioSleeper};
use dotenv::dotenv;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::error;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chains/klok/config.toml")]
    config: String,
    /// Overrides `token_file` from the config.
    #[arg(long)]
    tokens: Option<String>,
    /// Overrides `proxy_file` from the config.
    #[arg(long)]
    proxies: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = setup_logger();
    // Keep guard alive for file logging
    std::mem::forget(_log_guard);
    dotenv().ok();

    let args = Args::parse();
    let events = Arc::new(TracingSink);
    events.global(EventKind::Custom, "Klok chat bot starting...");

    let config = match KlokConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let token_file = args.tokens.unwrap_or_else(|| config.token_file.clone());
    let proxy_file = args.proxies.unwrap_or_else(|| config.proxy_file.clone());

    let credentials = match CredentialLoader::load(&token_file, &proxy_file) {
        Ok(c) => c,
        Err(e) => {
            events.global(EventKind::Error, format!("Cannot start: {}", e));
            std::process::exit(1);
        }
    };
    events.global(
        EventKind::Success,
        format!("Loaded {} accounts", credentials.len()),
    );

    let env = AccountEnv {
        factory: Arc::new(HttpSessionFactory::new(&config)),
        events,
        prompts: PromptSource::new(),
        policy: config.account_policy(),
    };

    let mut driver = Driver::bootstrap(
        credentials,
        env,
        config.schedule(),
        Arc::new(TokioSleeper),
        Arc::new(TerminalCountdown),
        StdRng::from_entropy(),
    )
    .await;

    driver.run().await;
    Ok(())
}
