use clap::Parser;

mod app;
mod catalogue;
mod cli;
mod config;
mod db;
mod error;
mod models;

use app::App;
use cli::{Cli, Command};
use config::Config;
use error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration, then apply command line overrides
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(catalogue) = cli.catalogue {
        config.catalogue_dir = catalogue;
    }

    // Initialize app (starts the background import)
    let mut app = App::new(&config).await?;

    let command = cli.command.unwrap_or(Command::Home);
    if let Err(e) = app.run(command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
