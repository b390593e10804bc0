//! Command-line arguments.

use clap::{Parser, Subcommand};
use nfce_core::Portal;
use std::path::PathBuf;

/// Retrieve and decode NFC-e receipts from the SEFAZ-BA portal.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print receipts as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse a saved tabbed-view page.
    Parse {
        /// HTML file to read
        #[arg(short, long)]
        file: PathBuf,
        /// Portal the page came from
        #[arg(long, default_value = "BA")]
        portal: Portal,
    },
    /// Fetch a receipt from the portal, asking for the captcha on stdin.
    Scrape {
        /// 44-digit access key, any spacing
        #[arg(short, long)]
        key: String,
        /// Directory to save the raw pages into
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Where to write the captcha image
        #[arg(long, default_value = "captcha.png")]
        captcha_output: PathBuf,
    },
    /// Run the HTTP API.
    Serve {
        /// Listen address, overrides the config file
        #[arg(short, long)]
        bind: Option<String>,
    },
}
