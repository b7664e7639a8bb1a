use crate::{
    discord::{Context, Error},
    state::Module,
};
use poise::serenity_prelude::{self as serenity, GuildId};
use std::{fmt::Display, str::FromStr};

/// Where application commands get registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
}

#[derive(Debug)]
pub struct UnknownScope(String);

impl Display for UnknownScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown scope '{}', use 'global' or 'local'", self.0)
    }
}

impl std::error::Error for UnknownScope {}

impl FromStr for Scope {
    type Err = UnknownScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "global" => Ok(Scope::Global),
            "local" => Ok(Scope::Local),
            _ => Err(UnknownScope(s.to_string())),
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Target {
    Global,
    Guild(GuildId),
}

/// `None` if local was requested without a developer guild.
fn target(scope: Scope, dev_guild: Option<u64>) -> Option<Target> {
    match scope {
        Scope::Global => Some(Target::Global),
        Scope::Local => dev_guild.map(|id| Target::Guild(GuildId::new(id))),
    }
}

fn default_scope(dev_guild: Option<u64>) -> Scope {
    if dev_guild.is_some() {
        Scope::Local
    } else {
        Scope::Global
    }
}

/// Handle extensions.
#[poise::command(
    prefix_command,
    aliases("x", "ex", "ext", "exte", "exten", "extens", "extensi"),
    subcommands("list", "load", "unload", "reload"),
    category = "Developer",
    check = "crate::checks::is_superuser"
)]
pub async fn extension(ctx: Context<'_>) -> Result<(), Error> {
    list_extensions(ctx).await
}

/// List available extensions.
#[poise::command(
    prefix_command,
    aliases("ls", "li", "lis"),
    category = "Developer",
    check = "crate::checks::is_superuser"
)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    list_extensions(ctx).await
}

/// Load given extension.
#[poise::command(
    prefix_command,
    aliases("l", "lo", "loa"),
    category = "Developer",
    check = "crate::checks::is_superuser"
)]
pub async fn load(
    ctx: Context<'_>,
    #[description = "Extension name or its beginning"] extension: String,
) -> Result<(), Error> {
    let Some(module) = Module::find_by_prefix(&extension) else {
        ctx.say("Unrecognized extension.").await?;
        return Ok(());
    };

    let mut state = ctx.data().state.lock().await;
    if state.enable(module) {
        state.save().await?;
        log::info!("Enabled module {}", module);
    }
    ctx.say(format!("Loaded extension: `{}`", module)).await?;

    Ok(())
}

/// Unload given extension.
#[poise::command(
    prefix_command,
    aliases("u", "un", "unl", "unlo", "unloa"),
    category = "Developer",
    check = "crate::checks::is_superuser"
)]
pub async fn unload(
    ctx: Context<'_>,
    #[description = "Extension name or its beginning"] extension: String,
) -> Result<(), Error> {
    let Some(module) = Module::find_by_prefix(&extension) else {
        ctx.say("Unrecognized extension.").await?;
        return Ok(());
    };
    if !module.can_disable() {
        ctx.say(format!("Extension `{}` cannot be unloaded.", module))
            .await?;
        return Ok(());
    }

    let mut state = ctx.data().state.lock().await;
    if state.disable(module) {
        state.save().await?;
        log::info!("Disabled module {}", module);
    }
    ctx.say(format!("Unloaded extension: `{}`", module)).await?;

    Ok(())
}

/// Reload given extension.
#[poise::command(
    prefix_command,
    aliases("r", "re", "rel", "relo", "reloa"),
    category = "Developer",
    check = "crate::checks::is_superuser"
)]
pub async fn reload(
    ctx: Context<'_>,
    #[description = "Extension name or its beginning"] extension: String,
) -> Result<(), Error> {
    let Some(module) = Module::find_by_prefix(&extension) else {
        ctx.say("Unrecognized extension.").await?;
        return Ok(());
    };

    // Modules are compiled in, reloading only makes sure they are switched on.
    let mut state = ctx.data().state.lock().await;
    if state.enable(module) {
        state.save().await?;
    }
    ctx.say(format!("Reloaded extension: `{}`", module)).await?;

    Ok(())
}

async fn list_extensions(ctx: Context<'_>) -> Result<(), Error> {
    let names = {
        let state = ctx.data().state.lock().await;
        Module::ALL
            .iter()
            .map(|module| {
                if state.is_enabled(*module) {
                    format!("`{}`", module)
                } else {
                    format!("`{}` (unloaded)", module)
                }
            })
            .collect::<Vec<_>>()
    };

    ctx.say(format!("Available extensions: {}", names.join(", ")))
        .await?;
    Ok(())
}

/// Sync application (aka slash) commands. (superuser-only)
///
/// Only required if a new slash command is added or an existing one's signature changes.
/// Scope defaults to 'local' if the developer guild is set, otherwise 'global'.
#[poise::command(
    prefix_command,
    aliases("sy", "syn", "sync", "sync_", "sync_s", "sync_sl", "sync_sla"),
    category = "Developer",
    check = "crate::checks::is_superuser"
)]
pub async fn sync_slash(
    ctx: Context<'_>,
    #[description = "'global' or 'local'"] scope: Option<Scope>,
) -> Result<(), Error> {
    let dev_guild = ctx.data().settings.dev_guild;
    let scope = scope.unwrap_or_else(|| default_scope(dev_guild));
    let Some(target) = target(scope, dev_guild) else {
        ctx.say("Developer guild not set, no action performed").await?;
        return Ok(());
    };

    let commands = &ctx.framework().options().commands;
    let result = match target {
        Target::Global => poise::builtins::register_globally(ctx, commands).await,
        Target::Guild(guild_id) => poise::builtins::register_in_guild(ctx, commands, guild_id).await,
    };
    if let Err(e) = result {
        ctx.say(format!("⚠️ Failed to sync: `{}`, reason: `{}`", scope, e))
            .await?;
        return Ok(());
    }

    let synced = commands
        .iter()
        .filter(|command| command.slash_action.is_some())
        .map(|command| command.name.as_str())
        .collect::<Vec<_>>();
    log::info!("Following {} commands got synced: {}", scope, synced.join(", "));
    ctx.say(format!("Synced: `{}`", scope)).await?;

    Ok(())
}

/// Clear application (aka slash) commands. (superuser-only)
///
/// Only required if a slash command has been removed but still shows up on the client.
/// Scope defaults to 'local' if the developer guild is set, otherwise 'global'.
#[poise::command(
    prefix_command,
    aliases("cl", "cle", "clea", "clear", "clear_", "clear_s", "clear_sl", "clear_sla"),
    category = "Developer",
    check = "crate::checks::is_superuser"
)]
pub async fn clear_slash(
    ctx: Context<'_>,
    #[description = "'global' or 'local'"] scope: Option<Scope>,
) -> Result<(), Error> {
    let dev_guild = ctx.data().settings.dev_guild;
    let scope = scope.unwrap_or_else(|| default_scope(dev_guild));
    let Some(target) = target(scope, dev_guild) else {
        ctx.say("Developer guild not set, no action performed").await?;
        return Ok(());
    };

    match target {
        Target::Global => {
            serenity::Command::set_global_commands(ctx, Vec::new()).await?;
        }
        Target::Guild(guild_id) => {
            guild_id.set_commands(ctx, Vec::new()).await?;
        }
    }
    log::info!("Cleared {} commands", scope);
    ctx.say(format!("Cleared `{}` commands", scope)).await?;

    Ok(())
}
