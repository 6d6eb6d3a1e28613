//! # kbc: Knowledge Base Construction CLI
//!
//! Thin entry point for the `kbc` binary. All logic lives in the `kbc_cli`
//! library crate.

use anyhow::Result;
use clap::Parser;
use kbc_cli::{run, Cli};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Setup logging
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive("kbc=info".parse()?))
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Run the command and report failures
    if let Err(e) = run(cli).await {
        eprintln!("[kbc error] {e:?}");
        std::process::exit(1);
    }

    Ok(())
}
