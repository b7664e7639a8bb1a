use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const FILENAME: &str = "settings.yaml";

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Discord's bot token
    pub token: String,
    /// Command prefix
    pub prefix: String,
    /// Guild used to test application commands before syncing them globally
    pub dev_guild: Option<u64>,
    /// Members with this role may use privileged commands
    pub superuser_role: String,
    /// Role picked during onboarding by members who did not accept the rules
    pub restricted_role: String,
    /// Date (UTC, `YYYY-MM-DD`) the onboarding gate was introduced
    pub onboarding_enabled_date: String,
    /// Path of the tag database
    pub database: PathBuf,
    pub channels: Channels,
    /// Message posted for newly onboarded members.
    ///
    /// Placeholders: `{new_member}`, `{announcements}`, `{home}`, `{general}`, `{matchmaking}`, `{bot}` (or `{botemkin}`)
    pub welcome_text: String,
    pub igdb: Igdb,
    pub kok: Kok,
}

/// Channel names the bot posts into.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Channels {
    pub announcements: String,
    pub moderation: String,
    pub home: String,
    pub general: String,
    pub matchmaking: String,
}

/// Credentials of the Internet Game Database (through Twitch).
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Igdb {
    pub client_id: String,
    pub client_secret: String,
}

/// King of the Hill setup.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Kok {
    pub moderation_channel: String,
    pub log_channel: String,
    /// Every game has a matching `King of <game>` role.
    pub games: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: String::from("DISCORD_BOT_TOKEN_HERE"),
            prefix: String::from("!"),
            dev_guild: None,
            superuser_role: String::from("Superuser"),
            restricted_role: String::from("Restricted"),
            onboarding_enabled_date: String::from("2024-01-01"),
            database: PathBuf::from("data/gametag.db"),
            channels: Channels::default(),
            welcome_text: String::from(
                "Welcome {new_member}! Check {announcements} and say hi in {general}. \
                 Looking for matches? Head to {matchmaking} and ask {bot} for tags.",
            ),
            igdb: Igdb::default(),
            kok: Kok::default(),
        }
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self {
            announcements: String::from("announcements"),
            moderation: String::from("moderation"),
            home: String::from("home"),
            general: String::from("general"),
            matchmaking: String::from("matchmaking"),
        }
    }
}

impl Default for Kok {
    fn default() -> Self {
        Self {
            moderation_channel: String::from("kok-moderation"),
            log_channel: String::from("kok-log"),
            games: ["SF", "TEKKEN", "BazBlue", "FatalFury", "GG", "GB"]
                .iter()
                .map(|game| game.to_string())
                .collect(),
        }
    }
}

impl Settings {
    fn path() -> String {
        std::env::var("BOT_SETTINGS").unwrap_or_else(|_| FILENAME.to_string())
    }

    /// Whether a settings file was written before.
    pub fn exists() -> bool {
        Path::new(&Self::path()).exists()
    }

    pub fn new() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(&Self::path()))
            // Eg.. `BOT__IGDB__CLIENT_ID=abc` would set the `igdb.client_id` key
            .add_source(Environment::with_prefix("BOT").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Start of the day the onboarding gate got enabled.
    pub fn onboarding_enabled_at(&self) -> Result<DateTime<Utc>> {
        let date = NaiveDate::parse_from_str(&self.onboarding_enabled_date, "%Y-%m-%d")
            .with_context(|| {
                format!(
                    "Invalid onboarding_enabled_date '{}', expected YYYY-MM-DD",
                    self.onboarding_enabled_date
                )
            })?;

        Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    pub async fn save(&self) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        let settings_path = Self::path();

        if let Some(parent) = PathBuf::from(&settings_path).parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        let mut file = tokio::fs::File::create(&settings_path).await?;
        file.write_all(
            serde_yaml::to_string(&self)
                .context("Failed to serialize settings")?
                .as_bytes(),
        )
        .await?;
        file.sync_all().await?;
        Ok(())
    }
}
