//! `nfce` command-line tool.

mod cli;
mod output;
mod prompt;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use nfce_core::{AppConfig, Receipt};
use nfce_parser::ParserRegistry;
use nfce_scraper::{HttpTransport, ScrapeEngine};
use prompt::PromptSolver;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,nfce=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("cannot load config {}", path.display()))?;
            config.apply_env(|name| std::env::var(name).ok());
            config.validate()?;
            config
        }
        None => AppConfig::load_with_env()?,
    };
    Ok(config)
}

fn print_receipt(receipt: &Receipt, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(receipt)?);
    } else {
        print!("{}", output::ReceiptText(receipt));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Parse { file, portal } => {
            let html = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("cannot read {}", file.display()))?;
            let receipt = ParserRegistry::with_defaults().parse(portal, &html)?;
            print_receipt(&receipt, cli.json)?;
        }
        Command::Scrape {
            key,
            output: pages_dir,
            captcha_output,
        } => {
            let transport = HttpTransport::new(&config.portal)?;
            let mut engine = ScrapeEngine::new(transport)
                .with_solver(Arc::new(PromptSolver::new(captcha_output)))
                .with_max_captcha_attempts(config.scraping.max_captcha_attempts);

            let result = engine.fetch_by_access_key(&key).await?;
            if let Some(dir) = pages_dir {
                output::save_pages(&dir, &result.pages)
                    .await
                    .with_context(|| format!("cannot save pages to {}", dir.display()))?;
                tracing::info!("Saved raw pages to {}", dir.display());
            }
            print_receipt(&result.receipt, cli.json)?;
        }
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            nfce_server::run(&config).await?;
        }
    }

    Ok(())
}
