use anyhow::{Context, Result};
use config::{Config, ConfigError, File};
use linked_hash_set::LinkedHashSet;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, path::PathBuf};

const FILENAME: &str = "state.yaml";

/// Bot state which is not intended to be edited manually.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    /// Modules switched off by a developer, in the order they were disabled.
    disabled: LinkedHashSet<Module>,
}

/// Feature modules compiled into the bot. Each can be switched on and off at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Module {
    Developer,
    Gametags,
    Fun,
    LinkFix,
    Kok,
}

impl Module {
    pub const ALL: [Module; 5] = [
        Module::Developer,
        Module::Gametags,
        Module::Fun,
        Module::LinkFix,
        Module::Kok,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Module::Developer => "Developer",
            Module::Gametags => "Gametags",
            Module::Fun => "Fun",
            Module::LinkFix => "LinkFix",
            Module::Kok => "Kok",
        }
    }

    /// Resolves command categories back to their module.
    pub fn from_name(name: &str) -> Option<Module> {
        Self::ALL
            .iter()
            .copied()
            .find(|module| module.name().eq_ignore_ascii_case(name))
    }

    /// First module whose name starts with `prefix`, ignoring case.
    pub fn find_by_prefix(prefix: &str) -> Option<Module> {
        let prefix = prefix.to_lowercase();
        if prefix.is_empty() {
            return None;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|module| module.name().to_lowercase().starts_with(&prefix))
    }

    /// The developer module hosts the commands to toggle modules.
    pub fn can_disable(&self) -> bool {
        *self != Module::Developer
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl State {
    pub fn new() -> Result<Self, ConfigError> {
        let state_path = std::env::var("BOT_STATE").unwrap_or_else(|_| FILENAME.to_string());

        Config::builder()
            .add_source(File::with_name(&state_path))
            .build()?
            .try_deserialize()
    }

    pub fn is_enabled(&self, module: Module) -> bool {
        !self.disabled.contains(&module)
    }

    /// Returns false if the module was enabled already.
    pub fn enable(&mut self, module: Module) -> bool {
        self.disabled.remove(&module)
    }

    /// Returns false if the module was disabled already or can't be disabled.
    pub fn disable(&mut self, module: Module) -> bool {
        if !module.can_disable() {
            return false;
        }
        self.disabled.insert(module)
    }

    pub fn disabled(&self) -> impl Iterator<Item = &Module> {
        self.disabled.iter()
    }

    pub async fn save(&self) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        let state_path = std::env::var("BOT_STATE").unwrap_or_else(|_| FILENAME.to_string());

        if let Some(parent) = PathBuf::from(&state_path).parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        let mut file = tokio::fs::File::create(&state_path).await?;
        file.write_all(
            serde_yaml::to_string(&self)
                .context("Failed to serialize state")?
                .as_bytes(),
        )
        .await?;
        file.sync_all().await?;
        Ok(())
    }
}
