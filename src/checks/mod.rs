use crate::discord::{Context, Error};
use crate::state::Module;
use crate::utils;
use poise::serenity_prelude as serenity;

/// Checks whether the author has the superuser role.
pub async fn is_superuser(ctx: Context<'_>) -> Result<bool, Error> {
    let role_name = &ctx.data().settings.superuser_role;

    if author_has_role_named(ctx, role_name).await {
        Ok(true)
    } else {
        ctx.say(format!(
            "This command is only available to {} role.",
            role_name
        ))
        .await?;
        Ok(false)
    }
}

/// Checks whether the module the command belongs to is enabled.
///
/// Commands of disabled modules behave like unknown ones.
/// Commands without a module (help) are always available.
pub async fn module_enabled(ctx: Context<'_>) -> Result<bool, Error> {
    let Some(module) = ctx.command().category.as_deref().and_then(Module::from_name) else {
        return Ok(true);
    };

    if ctx.data().is_enabled(module).await {
        Ok(true)
    } else {
        ctx.say(format!(
            "Command not found. Use **{}help** to print commands.",
            ctx.prefix()
        ))
        .await?;
        Ok(false)
    }
}

async fn author_has_role_named(ctx: Context<'_>, role_name: &str) -> bool {
    let Some(guild_id) = ctx.guild_id() else {
        return false;
    };
    let Some(member) = ctx.author_member().await else {
        return false;
    };

    has_role_named(ctx.serenity_context(), guild_id, &member.roles, role_name)
}

/// Whether any of `roles` is named `role_name`, ignoring case.
pub fn has_role_named(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    roles: &[serenity::RoleId],
    role_name: &str,
) -> bool {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return false;
    };

    roles
        .iter()
        .filter_map(|id| guild.roles.get(id))
        .any(|role| utils::same_name(&role.name, role_name))
}
