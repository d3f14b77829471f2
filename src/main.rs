//! menor-preco - Nota Paraná price search and Google Sheets export.

use std::process::ExitCode;

use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    let default_filter = if menor_preco::cli::is_verbose() {
        "menor_preco=info"
    } else {
        "menor_preco=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match menor_preco::cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", style("✗").red(), e);
            ExitCode::FAILURE
        }
    }
}
