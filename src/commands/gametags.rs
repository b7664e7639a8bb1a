//! Self-assignable roles (aka tags) for the games and platforms members play.

use crate::{
    discord::{self, send_command_help, Context, Data, Error},
    repository::{ItemTag, ItemType, TagId},
    utils::{self, Paginator},
};
use anyhow::Context as AnyhowContext;
use poise::{
    serenity_prelude::{
        self as serenity, CreateAllowedMentions, EditRole, Mentionable, MessageBuilder,
        Permissions, ReactionType, RoleId, UserId,
    },
    CreateReply,
};
use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
    time::Duration,
};

const IGDB: &str = "*Internet Game Database* (<https://www.igdb.com>)";
const THUMBS_UP: &str = "👍";
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);
/// What `push_codeblock_safe` adds around a css page.
const CSS_FENCE: &str = "```css\n\n```";

/// Search IGDB for given game name. (superuser-only)
///
/// Use to get the game id to be used with the tag_game command.
///
/// Usage examples:
///
/// !search puyo tetris
/// !s dong never die
#[poise::command(
    prefix_command,
    aliases("search", "sg", "s"),
    category = "Gametags",
    check = "crate::checks::is_superuser",
    on_error = "verbose_error",
    guild_only
)]
pub async fn search_game(
    ctx: Context<'_>,
    #[description = "Name of the game"]
    #[rest]
    game_name: String,
) -> Result<(), Error> {
    search_item(ctx, ItemType::Game, &game_name).await
}

/// Search IGDB for given platform name. (superuser-only)
///
/// Use to get the platform id to be used with the tag_platform command.
///
/// Usage examples:
///
/// !search_plat plebstation
/// !sp pc masterrace
#[poise::command(
    prefix_command,
    aliases("search_plat", "sp"),
    category = "Gametags",
    check = "crate::checks::is_superuser",
    on_error = "verbose_error",
    guild_only
)]
pub async fn search_platform(
    ctx: Context<'_>,
    #[description = "Name of the platform"]
    #[rest]
    platform_name: String,
) -> Result<(), Error> {
    search_item(ctx, ItemType::Platform, &platform_name).await
}

async fn search_item(ctx: Context<'_>, kind: ItemType, name: &str) -> Result<(), Error> {
    let items = match ctx.data().catalog.find_items_by_name(kind, name).await {
        Ok(items) => items,
        Err(e) => {
            ctx.say(format!("An error occured while accessing the {}.", IGDB))
                .await?;
            return Err(e);
        }
    };

    if items.is_empty() {
        ctx.say(format!("No search results from the {}.", IGDB))
            .await?;
        return Ok(());
    }

    let rows = items
        .iter()
        .map(|item| {
            format!(
                "#{} {} ({})",
                item.id,
                item.name,
                item.slug.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    ctx.say(format!(
        "Search results from the {}:```css\n{}```",
        IGDB, rows
    ))
    .await?;

    Ok(())
}

/// Lists available tags.
///
/// Use with 'all' to show all games/platforms imported from IGDB including ones without tags associated with them.
///
/// Usage examples:
///
/// !list
/// !ls all
/// !l a
#[poise::command(prefix_command, aliases("ls", "l"), category = "Gametags", guild_only)]
pub async fn list(
    ctx: Context<'_>,
    #[description = "'all' to include imported items without tags"] arg: Option<String>,
) -> Result<(), Error> {
    let tags = cached_available_tags(ctx)?;

    match arg.as_deref() {
        Some("a" | "al" | "all") => list_all_items(ctx, &tags).await,
        _ => list_available_tags(ctx, &tags).await,
    }
}

async fn list_available_tags(ctx: Context<'_>, tags: &[serenity::Role]) -> Result<(), Error> {
    if tags.is_empty() {
        ctx.say("```There are currently no available tags.```").await?;
        return Ok(());
    }

    let names = tag_names(tags);
    let ids = names.keys().copied().collect::<Vec<_>>();
    for kind in ItemType::ALL {
        let item_tags = ctx.data().repository.find_item_tags_by_tags(kind, &ids).await?;
        if item_tags.is_empty() {
            ctx.say(format!(
                "```There are currently no available {}tags.```",
                kind
            ))
            .await?;
            continue;
        }

        let mut paginator = css_paginator();
        paginator.add_paragraph(&format!("Available {}tags:", kind));
        for item_tag in &item_tags {
            let name = item_tag
                .tag
                .and_then(|tag| names.get(&tag))
                .map(String::as_str)
                .unwrap_or_default();
            paginator.add_line(&format!(
                "{} [{}]#{}",
                name, item_tag.item.name, item_tag.item.id
            ));
        }
        for page in css_pages(paginator) {
            ctx.say(page).await?;
        }
    }

    Ok(())
}

async fn list_all_items(ctx: Context<'_>, tags: &[serenity::Role]) -> Result<(), Error> {
    let names = tag_names(tags);
    for kind in ItemType::ALL {
        let item_tags = ctx.data().repository.find_all_items(kind).await?;
        if item_tags.is_empty() {
            ctx.say(format!("```There are currently no imported {}s.```", kind))
                .await?;
            continue;
        }

        let mut paginator = css_paginator();
        paginator.add_paragraph(&format!("Imported {}s:", kind));
        for item_tag in &item_tags {
            let tag = match item_tag.tag.and_then(|tag| names.get(&tag)) {
                Some(name) => format!("{} ", name),
                None => "\t".to_string(),
            };
            paginator.add_line(&format!(
                "{}[{}]#{}",
                tag, item_tag.item.name, item_tag.item.id
            ));
        }
        for page in css_pages(paginator) {
            ctx.say(page).await?;
        }
    }

    Ok(())
}

/// Assigns you the listed gametags.
///
/// Usage examples:
///
/// !play T7
/// !p GG Melty UNIST
#[poise::command(prefix_command, aliases("p"), category = "Gametags", guild_only)]
pub async fn play(
    ctx: Context<'_>,
    #[description = "Gametags to assign"] tag_names: Vec<String>,
) -> Result<(), Error> {
    assign_tags(ctx, ItemType::Game, tag_names).await
}

/// Assigns you the listed platformtags.
///
/// Usage examples:
///
/// !platform PC
/// !plat PS4 XBONE
#[poise::command(prefix_command, aliases("plat"), category = "Gametags", guild_only)]
pub async fn platform(
    ctx: Context<'_>,
    #[description = "Platformtags to assign"] tag_names: Vec<String>,
) -> Result<(), Error> {
    assign_tags(ctx, ItemType::Platform, tag_names).await
}

async fn assign_tags(ctx: Context<'_>, kind: ItemType, tag_names: Vec<String>) -> Result<(), Error> {
    if tag_names.is_empty() {
        return send_command_help(ctx).await;
    }
    let guild_id = ctx.guild_id().context("Tags only exist in guilds")?;

    let available = cached_available_tags(ctx)?;
    let (selected, mut unknown) = select_by_name(&available, &tag_names, |role| &role.name);

    let mut response = String::new();
    if !selected.is_empty() {
        let ids = selected.iter().map(|role| role.id.get()).collect::<Vec<_>>();
        let item_tags = ctx.data().repository.find_item_tags_by_tags(kind, &ids).await?;

        if !item_tags.is_empty() {
            let reason = format!("{} requested {}tags", ctx.author().tag(), kind);
            for tag in item_tags.iter().filter_map(|item_tag| item_tag.tag) {
                ctx.http()
                    .add_member_role(guild_id, ctx.author().id, RoleId::new(tag), Some(&reason))
                    .await
                    .context("Failed to assign tag")?;
            }

            let item_names = item_names(&item_tags);
            response += &format!(
                "{} now plays {}{}! ",
                author_display_name(ctx).await,
                kind.pre(),
                utils::join_names(&item_names)
            );
            if let Some(emoji) = utils::guild_emoji(ctx.serenity_context(), guild_id, "quan") {
                response += &emoji.repeat(item_names.len());
            }
        }

        unknown.extend(untagged_names(&selected, &item_tags));
    }

    if !unknown.is_empty() {
        response += &format!(
            "```Unknown {kind}tags: {}```Use **{prefix}list** to print available {kind}tags.",
            unknown.join(", "),
            kind = kind,
            prefix = ctx.prefix()
        );
    }

    ctx.say(response).await?;
    Ok(())
}

/// Removes your listed tags.
///
/// Usage examples:
///
/// !drop IJ2
/// !d DBFZ BBTag
#[poise::command(
    prefix_command,
    rename = "drop",
    aliases("d"),
    category = "Gametags",
    guild_only
)]
pub async fn drop_tags(
    ctx: Context<'_>,
    #[description = "Tags to remove"] tag_names: Vec<String>,
) -> Result<(), Error> {
    if tag_names.is_empty() {
        return send_command_help(ctx).await;
    }
    let guild_id = ctx.guild_id().context("Tags only exist in guilds")?;

    let available = cached_available_tags(ctx)?;
    let (selected, mut unknown) = select_by_name(&available, &tag_names, |role| &role.name);

    let mut response = String::new();
    if !selected.is_empty() {
        let ids = selected.iter().map(|role| role.id.get()).collect::<Vec<_>>();
        let mut item_tags = Vec::new();
        for kind in ItemType::ALL {
            item_tags.extend(ctx.data().repository.find_item_tags_by_tags(kind, &ids).await?);
        }

        if !item_tags.is_empty() {
            let reason = format!("{} relinquished tags", ctx.author().tag());
            for tag in item_tags.iter().filter_map(|item_tag| item_tag.tag) {
                ctx.http()
                    .remove_member_role(guild_id, ctx.author().id, RoleId::new(tag), Some(&reason))
                    .await
                    .context("Failed to remove tag")?;
            }

            let item_names = item_names(&item_tags);
            response += &format!(
                "{} just dropped {}! ",
                author_display_name(ctx).await,
                utils::join_names(&item_names)
            );
            if let Some(emoji) = utils::guild_emoji(ctx.serenity_context(), guild_id, "salt") {
                response += &emoji.repeat(item_names.len());
            }
        }

        unknown.extend(untagged_names(&selected, &item_tags));
    }

    if !unknown.is_empty() {
        response += &unknown_tags(ctx, &unknown);
    }

    ctx.say(response).await?;
    Ok(())
}

/// Shows players with given tags. When given multiple tags only show players who match all of them.
///
/// Usage examples:
///
/// !players SFV
/// !ps PS4
/// !ps GG BBCF PC
#[poise::command(prefix_command, aliases("ps"), category = "Gametags", guild_only)]
pub async fn players(
    ctx: Context<'_>,
    #[description = "Tags the players need to have"] tag_names: Vec<String>,
) -> Result<(), Error> {
    match tag_names.as_slice() {
        [] => send_command_help(ctx).await,
        [single] => show_players_for_single_tag(ctx, single).await,
        _ => intersect_players(ctx, &tag_names).await,
    }
}

async fn show_players_for_single_tag(ctx: Context<'_>, tag_name: &str) -> Result<(), Error> {
    let guild_id = ctx.guild_id().context("Tags only exist in guilds")?;
    let Some((role, players)) = cached_role_with_players(ctx, tag_name)? else {
        ctx.say(unknown_tag(ctx, tag_name)).await?;
        return Ok(());
    };

    let mut paginator = Paginator::new("", "");
    match ctx.data().repository.find_any_item_by_tag(role.id.get()).await? {
        Some(item) if !players.is_empty() => {
            paginator.add_line(
                &MessageBuilder::new()
                    .push_italic_safe(item.name.as_str())
                    .push(format!(
                        " has {} player{}:",
                        players.len(),
                        utils::plural(players.len())
                    ))
                    .build(),
            );
            for player in &players {
                paginator.add_line(&player.line());
            }
        }
        Some(item) => {
            let emoji = utils::guild_emoji(ctx.serenity_context(), guild_id, "rip");
            let mut line = MessageBuilder::new();
            if let Some(emoji) = &emoji {
                line.push(format!("{} ", emoji));
            }
            line.push_italic_safe(role.name.as_str())
                .push(" is a ")
                .push_bold("DEAD")
                .push(format!(" {}", item.kind));
            if let Some(emoji) = &emoji {
                line.push(format!(" {}", emoji));
            }
            paginator.add_line(&line.build());
        }
        None => {
            paginator.add_line(
                &MessageBuilder::new()
                    .push_codeblock_safe(format!("Not a tag: {}", role.name), None)
                    .push("Use ")
                    .push_bold(format!("{}list", ctx.prefix()))
                    .push(" to print available tags.")
                    .build(),
            );
        }
    }

    for page in paginator.into_pages() {
        say_silently(ctx, page).await?;
    }
    Ok(())
}

async fn intersect_players(ctx: Context<'_>, tag_names: &[String]) -> Result<(), Error> {
    let (matched_names, players, unknown) = {
        let guild = ctx.guild().context("Tags only exist in guilds")?;
        let available = available_tags(&guild);
        let (selected, unknown) = select_by_name(&available, tag_names, |role| &role.name);

        let groups = selected
            .iter()
            .map(|role| {
                players_with_role(&guild, role.id)
                    .into_iter()
                    .collect::<HashSet<_>>()
            })
            .collect::<Vec<_>>();
        let mut players = intersect(&groups).into_iter().collect::<Vec<_>>();
        players.sort();

        let matched_names = selected
            .iter()
            .map(|role| role.name.clone())
            .collect::<Vec<_>>();
        (matched_names, players, unknown)
    };

    if matched_names.is_empty() {
        ctx.say("No matching tags found.").await?;
        return Ok(());
    }

    let tags = italic_names(&matched_names);
    if players.is_empty() {
        ctx.say(
            MessageBuilder::new()
                .push("No players who match all of the following tags: ")
                .push(tags)
                .push(".")
                .build(),
        )
        .await?;
        return Ok(());
    }

    let mut paginator = Paginator::new("", "");
    paginator.add_line(
        &MessageBuilder::new()
            .push(format!(
                "The following tags are matched by {} player{}: ",
                players.len(),
                utils::plural(players.len())
            ))
            .push(tags)
            .push(".")
            .build(),
    );
    for player in &players {
        paginator.add_line(&player.line());
    }
    if !unknown.is_empty() {
        paginator.add_line(&unknown_tags(ctx, &unknown));
    }

    for page in paginator.into_pages() {
        say_silently(ctx, page).await?;
    }
    Ok(())
}

/// Associate game with given tag. (superuser-only)
///
/// To find the game id use the search_game command.
///
/// Usage examples:
///
/// !tag 80207 ABK
/// !t 76885 SCVI
#[poise::command(
    prefix_command,
    aliases("tag", "tg", "t"),
    category = "Gametags",
    check = "crate::checks::is_superuser",
    on_error = "verbose_error",
    guild_only
)]
pub async fn tag_game(
    ctx: Context<'_>,
    #[description = "IGDB id of the game"] game_id: u64,
    #[description = "Name of the tag"] tag_name: String,
) -> Result<(), Error> {
    tag_item(ctx, ItemType::Game, game_id, tag_name).await
}

/// Associate platform with given tag. (superuser-only)
///
/// To find the platform id use the search_platform command.
///
/// Usage examples:
///
/// !tag_platform 6 PC
/// !tag_plat 48 PS4
#[poise::command(
    prefix_command,
    aliases("tag_plat", "tp"),
    category = "Gametags",
    check = "crate::checks::is_superuser",
    on_error = "verbose_error",
    guild_only
)]
pub async fn tag_platform(
    ctx: Context<'_>,
    #[description = "IGDB id of the platform"] platform_id: u64,
    #[description = "Name of the tag"] tag_name: String,
) -> Result<(), Error> {
    tag_item(ctx, ItemType::Platform, platform_id, tag_name).await
}

async fn tag_item(
    ctx: Context<'_>,
    kind: ItemType,
    item_id: u64,
    tag_name: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().context("Tags only exist in guilds")?;
    let repository = &ctx.data().repository;

    let Some(item) = ctx.data().catalog.find_item_by_id(kind, item_id).await? else {
        ctx.say(format!("Could not find {} in external database.", kind))
            .await?;
        return Ok(());
    };
    if repository.add_item(&item).await? {
        ctx.say(format!("Added *{}* to internal database.", item.name))
            .await?;
    } else {
        ctx.say(format!("Found *{}* in internal database.", item.name))
            .await?;
    }

    let existing = cached_available_tags(ctx)?
        .into_iter()
        .find(|role| utils::same_name(&role.name, &tag_name));
    let role = match existing {
        Some(role) => role,
        None => {
            let reply = ctx
                .say("No existing tag found by that name, creating now.")
                .await?;
            let reason = format!(
                "{} requested role creation through {}",
                ctx.author().tag(),
                ctx.command().name
            );
            // Tags must not grant anything, see `available_tags`.
            let builder = EditRole::new()
                .name(&tag_name)
                .mentionable(true)
                .permissions(Permissions::empty())
                .audit_log_reason(&reason);

            match guild_id.create_role(ctx, builder).await {
                Ok(role) => {
                    reply
                        .edit(ctx, CreateReply::default().content("Discord role created."))
                        .await?;
                    role
                }
                Err(e) => {
                    reply
                        .edit(
                            ctx,
                            CreateReply::default().content("Failed to create Discord role."),
                        )
                        .await?;
                    return Err(e.into());
                }
            }
        }
    };

    if let Err(e) = repository.add_item_tag(&item, role.id.get()).await {
        ctx.say(format!("Failed to add {}tag to internal database.", kind))
            .await?;
        return Err(e);
    }
    ctx.say(format!(
        "The {}tag {} is now associated with *{}*.",
        kind,
        role.mention(),
        item.name
    ))
    .await?;

    Ok(())
}

/// Delete a tag nobody uses anymore. (superuser-only)
#[poise::command(
    prefix_command,
    aliases("prune"),
    category = "Gametags",
    check = "crate::checks::is_superuser",
    on_error = "verbose_error",
    guild_only
)]
pub async fn prune_tag(
    ctx: Context<'_>,
    #[description = "Name of the tag"] tag: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().context("Tags only exist in guilds")?;
    let Some((role, players)) = cached_role_with_players(ctx, &tag)? else {
        ctx.say(unknown_tag(ctx, &tag)).await?;
        return Ok(());
    };

    if ctx
        .data()
        .repository
        .find_any_item_by_tag(role.id.get())
        .await?
        .is_none()
    {
        ctx.say(unknown_tag(ctx, &role.name)).await?;
        return Ok(());
    }

    if !players.is_empty() {
        ctx.say(format!(
            "⚠ Tag *{}* has {} users associated with it.",
            role.name,
            players.len()
        ))
        .await?;
        return Ok(());
    }

    let prompt = format!(
        "Tag '{}' confirmed to have 0 users. React with a thumbs-up {} to this message to confirm deletion.",
        tag, THUMBS_UP
    );
    if !confirm(ctx, prompt).await? {
        ctx.say("No confirmation received, keeping the tag.").await?;
        return Ok(());
    }

    ctx.say(format!("Deleting tag '{}' ...", tag)).await?;
    guild_id
        .delete_role(ctx, role.id)
        .await
        .context("Failed to delete role")?;
    ctx.data().repository.remove_tag(role.id.get()).await?;
    ctx.say(format!("Deleted tag '{}'.", tag)).await?;

    Ok(())
}

/// Delete every tag nobody uses anymore. (superuser-only)
#[poise::command(
    prefix_command,
    category = "Gametags",
    check = "crate::checks::is_superuser",
    on_error = "verbose_error",
    guild_only
)]
pub async fn prune_all(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().context("Tags only exist in guilds")?;
    let tags = ctx.data().repository.get_all_tags().await?;
    if tags.is_empty() {
        ctx.say("⚠ Repository is empty.").await?;
        return Ok(());
    }

    // Tags whose role was deleted by hand are unused as well.
    let unused: Vec<(TagId, Option<String>)> = {
        let guild = ctx.guild().context("Tags only exist in guilds")?;
        tags.into_iter()
            .filter_map(|tag| match guild.roles.get(&RoleId::new(tag)) {
                Some(role) if !players_with_role(&guild, role.id).is_empty() => None,
                Some(role) => Some((tag, Some(role.name.clone()))),
                None => Some((tag, None)),
            })
            .collect()
    };
    if unused.is_empty() {
        ctx.say("Every tag is in use.").await?;
        return Ok(());
    }

    let names = unused
        .iter()
        .map(|(tag, name)| match name {
            Some(name) => name.clone(),
            None => format!("#{} (role deleted)", tag),
        })
        .collect::<Vec<_>>();
    ctx.say(format!(
        "The following roles are unused: {}",
        names.join(", ")
    ))
    .await?;

    let prompt = format!(
        "React with a thumbs-up {} to this message to confirm the deletion of all these roles & tags.",
        THUMBS_UP
    );
    if !confirm(ctx, prompt).await? {
        ctx.say("No confirmation received, keeping the tags.").await?;
        return Ok(());
    }

    ctx.say("Deleting tags ...").await?;
    for (tag, name) in &unused {
        if name.is_some() {
            guild_id
                .delete_role(ctx, RoleId::new(*tag))
                .await
                .context("Failed to delete role")?;
        }
        ctx.data().repository.remove_tag(*tag).await?;
    }
    ctx.say(format!("Deleted {} tags.", unused.len())).await?;

    Ok(())
}

/// Privileged commands echo their errors back to the superuser.
async fn verbose_error(error: poise::FrameworkError<'_, Data, Error>) {
    match &error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let _ = ctx.say(format!("```{}```", error)).await;
        }
        poise::FrameworkError::ArgumentParse {
            error,
            input: Some(_),
            ctx,
            ..
        } => {
            let _ = ctx.say(format!("```{}```", error)).await;
            return;
        }
        _ => {}
    }
    discord::on_error(error).await;
}

/// Asks the author to react with a thumbs-up.
async fn confirm(ctx: Context<'_>, prompt: String) -> Result<bool, Error> {
    let reply = ctx.say(prompt).await?;
    let message = reply.message().await?;

    let reaction = message
        .await_reaction(ctx.serenity_context())
        .author_id(ctx.author().id)
        .timeout(CONFIRM_TIMEOUT)
        .filter(|reaction| matches!(&reaction.emoji, ReactionType::Unicode(emoji) if emoji == THUMBS_UP))
        .await;

    Ok(reaction.is_some())
}

/// Sends a message whose mentions don't ping anyone.
async fn say_silently(ctx: Context<'_>, content: String) -> Result<(), Error> {
    ctx.send(
        CreateReply::default()
            .content(content)
            .allowed_mentions(CreateAllowedMentions::new()),
    )
    .await?;
    Ok(())
}

fn unknown_tag(ctx: Context<'_>, name: &str) -> String {
    format!(
        "```Unknown tag: {}```Use **{}list** to print available tags.",
        name,
        ctx.prefix()
    )
}

fn unknown_tags(ctx: Context<'_>, names: &[String]) -> String {
    format!(
        "```Unknown tags: {}```Use **{}list** to print available tags.",
        names.join(", "),
        ctx.prefix()
    )
}

async fn author_display_name(ctx: Context<'_>) -> String {
    match ctx.author_member().await {
        Some(member) => member.display_name().to_string(),
        None => ctx.author().name.clone(),
    }
}

fn item_names(item_tags: &[ItemTag]) -> Vec<&str> {
    item_tags
        .iter()
        .map(|item_tag| item_tag.item.name.as_str())
        .collect()
}

/// Names of selected roles without an item of the requested type.
fn untagged_names(selected: &[&serenity::Role], item_tags: &[ItemTag]) -> Vec<String> {
    let tagged = item_tags
        .iter()
        .filter_map(|item_tag| item_tag.tag)
        .collect::<HashSet<_>>();

    selected
        .iter()
        .filter(|role| !tagged.contains(&role.id.get()))
        .map(|role| role.name.clone())
        .collect()
}

fn css_paginator() -> Paginator {
    Paginator::with_max_size("", "", utils::MESSAGE_LIMIT - CSS_FENCE.len())
}

fn css_pages(paginator: Paginator) -> Vec<String> {
    paginator
        .into_pages()
        .into_iter()
        .map(|page| {
            MessageBuilder::new()
                .push_codeblock_safe(page, Some("css"))
                .build()
        })
        .collect()
}

/// "_GG_, _Melty_"
fn italic_names(names: &[String]) -> String {
    let mut response = MessageBuilder::new();
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            response.push(", ");
        }
        response.push_italic_safe(name.as_str());
    }
    response.build()
}

fn tag_names(tags: &[serenity::Role]) -> HashMap<TagId, String> {
    tags.iter()
        .map(|role| (role.id.get(), role.name.clone()))
        .collect()
}

/// A member listed by the players command.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Player {
    name: String,
    id: UserId,
}

impl Player {
    fn line(&self) -> String {
        MessageBuilder::new()
            .mention(&self.id)
            .push(" (")
            .push_safe(self.name.as_str())
            .push(")")
            .build()
    }
}

fn players_with_role(guild: &serenity::Guild, role: RoleId) -> Vec<Player> {
    let mut players = guild
        .members
        .values()
        .filter(|member| member.roles.contains(&role))
        .map(|member| Player {
            name: member.user.name.clone(),
            id: member.user.id,
        })
        .collect::<Vec<_>>();
    players.sort();
    players
}

/// Any guild role (not only available tags) by name, with its members.
fn cached_role_with_players(
    ctx: Context<'_>,
    name: &str,
) -> Result<Option<(serenity::Role, Vec<Player>)>, Error> {
    let guild = ctx.guild().context("Tags only exist in guilds")?;
    let role = guild
        .roles
        .values()
        .find(|role| utils::same_name(&role.name, name))
        .cloned();

    Ok(role.map(|role| {
        let players = players_with_role(&guild, role.id);
        (role, players)
    }))
}

fn cached_available_tags(ctx: Context<'_>) -> Result<Vec<serenity::Role>, Error> {
    let guild = ctx.guild().context("Tags only exist in guilds")?;
    Ok(available_tags(&guild))
}

/// Roles members may hand themselves, highest first.
fn available_tags(guild: &serenity::Guild) -> Vec<serenity::Role> {
    let everyone = guild.id.everyone_role();
    let Some(base) = guild.roles.get(&everyone).map(|role| role.permissions) else {
        return Vec::new();
    };

    let mut tags = guild
        .roles
        .values()
        .filter(|role| role.id != everyone && grants_nothing_extra(base, role.permissions))
        .cloned()
        .collect::<Vec<_>>();
    tags.sort_by(|a, b| b.position.cmp(&a.position).then(a.id.cmp(&b.id)));
    tags
}

fn grants_nothing_extra(everyone: Permissions, role: Permissions) -> bool {
    everyone.contains(role)
}

/// Splits requested names into matching candidates and unknown names, keeping the request order.
fn select_by_name<'a, T>(
    candidates: &'a [T],
    names: &[String],
    name_of: impl Fn(&T) -> &str,
) -> (Vec<&'a T>, Vec<String>) {
    let mut selected = Vec::new();
    let mut unknown = Vec::new();

    for name in names {
        match candidates
            .iter()
            .find(|candidate| utils::same_name(name_of(candidate), name))
        {
            Some(candidate) => selected.push(candidate),
            None => unknown.push(name.clone()),
        }
    }

    (selected, unknown)
}

/// Elements present in every group.
fn intersect<T: Eq + Hash + Clone>(groups: &[HashSet<T>]) -> HashSet<T> {
    let Some((first, rest)) = groups.split_first() else {
        return HashSet::new();
    };

    first
        .iter()
        .filter(|element| rest.iter().all(|group| group.contains(*element)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Item;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn selection_ignores_case_and_keeps_order() {
        let roles = ["GG", "Melty", "UNIST", "PC"];
        let (selected, unknown) = select_by_name(&roles, &names(&["unist", "Tekken", "gg"]), |r| r);

        assert_eq!(selected, vec![&"UNIST", &"GG"]);
        assert_eq!(unknown, names(&["Tekken"]));
    }

    #[test]
    fn selection_without_candidates() {
        let roles: [&str; 0] = [];
        let (selected, unknown) = select_by_name(&roles, &names(&["GG"]), |r| r);

        assert!(selected.is_empty());
        assert_eq!(unknown, names(&["GG"]));
    }

    #[test]
    fn intersection_of_member_sets() {
        let gg: HashSet<u32> = [1, 2, 3, 4].into_iter().collect();
        let pc: HashSet<u32> = [2, 4, 6].into_iter().collect();
        let bbcf: HashSet<u32> = [4, 2, 9].into_iter().collect();

        let mut both = intersect(&[gg.clone(), pc.clone()]).into_iter().collect::<Vec<_>>();
        both.sort();
        assert_eq!(both, vec![2, 4]);

        let mut all = intersect(&[gg, pc, bbcf]).into_iter().collect::<Vec<_>>();
        all.sort();
        assert_eq!(all, vec![2, 4]);

        assert!(intersect::<u32>(&[]).is_empty());
    }

    #[test]
    fn disjoint_sets_intersect_to_nothing() {
        let a: HashSet<u32> = [1].into_iter().collect();
        let b: HashSet<u32> = [2].into_iter().collect();

        assert!(intersect(&[a, b]).is_empty());
    }

    #[test]
    fn tags_may_not_grant_permissions() {
        let everyone = Permissions::SEND_MESSAGES | Permissions::VIEW_CHANNEL;

        assert!(grants_nothing_extra(everyone, Permissions::empty()));
        assert!(grants_nothing_extra(everyone, Permissions::SEND_MESSAGES));
        assert!(!grants_nothing_extra(everyone, Permissions::KICK_MEMBERS));
        assert!(!grants_nothing_extra(
            everyone,
            Permissions::SEND_MESSAGES | Permissions::ADMINISTRATOR
        ));
    }

    #[test]
    fn player_lines_escape_names() {
        let player = Player {
            name: "x_x".to_string(),
            id: UserId::new(42),
        };

        assert_eq!(player.line(), r"<@42> (x\_x)");

        let loud = Player {
            name: "@everyone *hi*".to_string(),
            id: UserId::new(42),
        };
        assert_eq!(loud.line(), "<@42> (@\u{200B}everyone \\*hi\\*)");
    }

    #[test]
    fn matched_tags_are_italic() {
        assert_eq!(italic_names(&names(&["GG"])), "_GG_");
        assert_eq!(
            italic_names(&names(&["GG", "Melty_Blood"])),
            "_GG_, _Melty Blood_"
        );
    }

    #[test]
    fn css_pages_keep_their_fence() {
        let mut paginator = css_paginator();
        paginator.add_paragraph("Imported games:");
        paginator.add_line("GG [Guilty ```Gear]#1");

        assert_eq!(
            css_pages(paginator),
            vec!["```css\nImported games:\n\nGG [Guilty  Gear]#1\n```".to_string()]
        );
    }

    #[test]
    fn css_pages_fit_in_a_message() {
        let mut paginator = css_paginator();
        for id in 0..500 {
            paginator.add_line(&format!("GG [Guilty Gear Strive]#{}", id));
        }

        let pages = css_pages(paginator);
        assert!(pages.len() > 1);
        assert!(pages.iter().all(|page| page.len() <= utils::MESSAGE_LIMIT));
    }

    #[test]
    fn item_names_follow_repository_order() {
        let item_tags = vec![
            ItemTag {
                item: Item::new(ItemType::Game, 1, "Blazblue"),
                tag: Some(10),
            },
            ItemTag {
                item: Item::new(ItemType::Game, 2, "Tekken"),
                tag: Some(20),
            },
        ];

        assert_eq!(item_names(&item_tags), vec!["Blazblue", "Tekken"]);
        assert_eq!(utils::join_names(&item_names(&item_tags)), "*Blazblue* and *Tekken*");
    }
}
