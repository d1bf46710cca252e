mod app;
mod commands;
mod progress;
mod render;
mod shell;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use paperdb_core::config::{Settings, SettingsSource};

use crate::app::App;
use crate::shell::Shell;

/// Ask questions about a folder of PDF documents.
#[derive(Debug, Parser)]
#[command(name = "paperdb", version)]
struct Cli {
    /// Base settings file (default: ./config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Environment overlay, e.g. dev or prod (default: $RUST_ENV or dev)
    #[arg(long, value_name = "NAME")]
    env: Option<String>,

    /// Run one shell command and exit, e.g. `paperdb ask "..."`
    #[arg(trailing_var_arg = true, value_name = "COMMAND")]
    command: Vec<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,lance=warn,lancedb=warn,lance_core=warn,reqwest=warn,hyper=warn")
    });
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let source = SettingsSource { config_file: cli.config, env: cli.env };
    let settings = Settings::load(&source).context("loading settings")?;
    let app = App::build(settings).await?;
    let mut shell = Shell::new(app);

    if cli.command.is_empty() {
        shell.run().await
    } else {
        shell.run_once(&cli.command.join(" ")).await
    }
}
