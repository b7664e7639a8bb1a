/// Client for the Internet Game Database
mod catalog;
/// checks for permission to execute a specific command
pub mod checks;
/// All available discord commands
mod commands;
/// discord setup
mod discord;
/// Listeners reacting to guild events
mod events;
#[cfg(test)]
mod http_stub;
mod logger;
/// Tag database
mod repository;
/// Bot Settings
mod settings;
/// Bot state
mod state;
mod utils;

use anyhow::{Context, Result};
use repository::Repository;
use settings::Settings;
use state::State;

#[tokio::main]
async fn main() -> Result<()> {
    logger::init()?;

    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) if Settings::exists() => {
            return Err(e).context("Failed to load settings.");
        }
        Err(_) => {
            Settings::default()
                .save()
                .await
                .context("Failed to save default config.")?;
            println!("Created default settings. Please fill out. Exiting...");
            std::process::exit(0);
        }
    };

    let state = State::new().unwrap_or_else(|e| {
        log::warn!("Failed to load state, starting with every module enabled: {}", e);
        State::default()
    });
    for module in state.disabled() {
        log::info!("Module {} is disabled", module);
    }

    let repository = Repository::open(&settings.database)
        .await
        .context("Failed to open tag database.")?;
    discord::run(settings, state, repository)
        .await
        .context("Failed to start discord.")
}
