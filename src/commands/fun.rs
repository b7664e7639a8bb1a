//! Fun module. Your mileage may vary.

use crate::{
    discord::{Context, Error},
    utils,
};
use anyhow::Context as AnyhowContext;
use poise::{serenity_prelude::{Mentionable, ReactionType}, CreateReply};
use std::time::Duration;

const BUSTER_DELAY: Duration = Duration::from_secs(2);
const CLOWN_VIDEO: &str =
    "https://cdn.discordapp.com/attachments/706976180703854705/1005032221402484736/Akkor_bohoc.mp4";

/// Busts.
#[poise::command(prefix_command, category = "Fun", guild_only)]
pub async fn buster(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().context("Emojis only exist in guilds")?;
    let Some(emoji) = utils::guild_emoji(ctx.serenity_context(), guild_id, "buster") else {
        log::warn!("buster called but missing emoji");
        return Ok(());
    };

    let reply = ctx.say("４８の必殺技！").await?;
    tokio::time::sleep(BUSTER_DELAY).await;
    reply
        .edit(ctx, CreateReply::default().content("ボチョムキン……！！"))
        .await?;
    tokio::time::sleep(BUSTER_DELAY).await;
    reply
        .edit(
            ctx,
            CreateReply::default().content(format!("バスターァ！！！！ {}", emoji)),
        )
        .await?;

    Ok(())
}

/// ???
#[poise::command(prefix_command, category = "Fun", guild_only)]
pub async fn waifu(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().context("Emojis only exist in guilds")?;
    let serenity_ctx = ctx.serenity_context();

    if let (Some(emoji), poise::Context::Prefix(prefix)) =
        (utils::find_emoji(serenity_ctx, guild_id, "igenytelenseg"), ctx)
    {
        prefix.msg.react(ctx, ReactionType::from(emoji)).await?;
    }

    let destr = utils::guild_emoji(serenity_ctx, guild_id, "destr");
    let royed = utils::guild_emoji(serenity_ctx, guild_id, "royed");
    let response = match (destr, royed) {
        (Some(destr), Some(royed)) => format!(
            "{} {}{} your laifu!",
            ctx.author().mention(),
            destr,
            royed
        ),
        _ => {
            log::warn!("waifu called but missing emoji");
            format!("{} Get a laifu!", ctx.author().mention())
        }
    };
    ctx.say(response).await?;

    Ok(())
}

/// Honk Honk
#[poise::command(prefix_command, category = "Fun")]
pub async fn clown(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say(CLOWN_VIDEO).await?;
    Ok(())
}
