use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod classify;
mod cli;
mod config;
mod errors;
mod identity;
mod images;
mod index;
mod loader;
mod search;
mod semantic;
#[cfg(test)]
mod tests;
mod web;

use classify::LabelVocabulary;
use config::Config;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_logging();

    match args.command {
        cli::Command::Serve { config } => {
            let config = Config::load(config.as_deref())?;
            web::start_daemon(config)
        }

        cli::Command::IndexCsv { base_url, csv } => {
            let summary = loader::index_csv(&base_url, &csv)?;
            if summary.indexed == 0 && summary.failed > 0 {
                anyhow::bail!("no rows were indexed");
            }
            Ok(())
        }

        cli::Command::Vocabulary => {
            let entries = LabelVocabulary::marketplace().entries();
            println!("{}", serde_json::to_string_pretty(entries)?);
            Ok(())
        }
    }
}
