use crate::discord::Error;
use linked_hash_set::LinkedHashSet;
use poise::serenity_prelude::{
    self as serenity, CacheHttp, CreateAllowedMentions, CreateMessage, EditMessage, Message,
    MessageType, Permissions, Reaction, ReactionType, UserId,
};
use regex::Regex;
use std::sync::LazyLock;

/// :leftwards_arrow_with_hook:
const UNDO: &str = "\u{21a9}\u{fe0f}";

// More forgiving than the platform's own link detection.
static TWITTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://(mobile\.|vx)?(?:twitter|x)\.com/(\w{4,15}/status/[0-9]+)")
        .expect("valid twitter pattern")
});
static INSTAGRAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://(?:www\.)?(mobile\.|dd)?instagram\.com/(?:p/|reel/)(\w{4,11}/)")
        .expect("valid instagram pattern")
});

/// Mirror links for every Twitter/X and Instagram post in `content`, unique and in order.
///
/// `None` if there are none or all of them point to mirrors already.
pub fn rewrite_links(content: &str) -> Option<String> {
    let mut links = LinkedHashSet::new();
    let mut only_mirrors = true;

    for captures in TWITTER.captures_iter(content) {
        only_mirrors &= captures.get(1).is_some_and(|prefix| prefix.as_str() == "vx");
        links.insert_if_absent(format!("https://vxtwitter.com/{}", &captures[2]));
    }
    for captures in INSTAGRAM.captures_iter(content) {
        only_mirrors &= captures.get(1).is_some_and(|prefix| prefix.as_str() == "dd");
        links.insert_if_absent(format!("https://ddinstagram.com/reel/{}", &captures[2]));
    }

    if links.is_empty() || only_mirrors {
        return None;
    }
    Some(links.into_iter().collect::<Vec<_>>().join(" "))
}

pub async fn message(ctx: &serenity::Context, msg: &Message) -> Result<(), Error> {
    if msg.author.bot || msg.kind != MessageType::Regular || msg.guild_id.is_none() {
        return Ok(());
    }
    let Some(links) = rewrite_links(&msg.content) else {
        return Ok(());
    };

    let reply = msg
        .channel_id
        .send_message(
            ctx,
            CreateMessage::new()
                .content(links)
                .reference_message(msg)
                .allowed_mentions(CreateAllowedMentions::new().replied_user(false)),
        )
        .await?;
    reply
        .react(ctx, ReactionType::Unicode(UNDO.to_string()))
        .await?;
    msg.channel_id
        .edit_message(ctx, msg.id, EditMessage::new().suppress_embeds(true))
        .await?;

    Ok(())
}

/// What a reply of ours refers to.
enum Original {
    Present(Box<Message>),
    Deleted,
    NotAReply,
}

pub async fn reaction_add(ctx: &serenity::Context, reaction: &Reaction) -> Result<(), Error> {
    let bot = ctx.cache.current_user().id;
    if !matches!(&reaction.emoji, ReactionType::Unicode(emoji) if emoji == UNDO)
        || reaction.user_id == Some(bot)
    {
        return Ok(());
    }
    let Some(reactor) = reaction.user_id else {
        return Ok(());
    };

    let reply = reaction.message(ctx).await?;
    if reply.author.id != bot {
        return Ok(());
    }

    match original_of(ctx, &reply).await? {
        Original::NotAReply => return Ok(()),
        Original::Deleted => {}
        Original::Present(original) => {
            let can_manage = match (reaction.guild_id, &reaction.member) {
                (Some(guild_id), Some(member)) => can_manage_messages(ctx, guild_id, reactor, &member.roles),
                _ => false,
            };
            if !may_undo(original.author.id, reactor, can_manage) {
                return Ok(());
            }
            if let Err(e) = restore_embeds(ctx, &original).await {
                log::error!("Failed to restore embeds of {}: {}", original.id, e);
                return Ok(());
            }
        }
    }

    reply.delete(ctx).await?;
    Ok(())
}

/// Editing through the channel skips the author check `Message::edit` does, which
/// only lets the bot touch its own messages beyond suppressing embeds.
async fn restore_embeds(
    cache_http: impl CacheHttp,
    original: &Message,
) -> Result<Message, serenity::Error> {
    original
        .channel_id
        .edit_message(
            cache_http,
            original.id,
            EditMessage::new().suppress_embeds(false),
        )
        .await
}

async fn original_of(cache_http: impl CacheHttp, reply: &Message) -> Result<Original, Error> {
    if let Some(original) = &reply.referenced_message {
        return Ok(Original::Present(original.clone()));
    }
    let Some((channel_id, message_id)) = reply
        .message_reference
        .as_ref()
        .and_then(|reference| Some((reference.channel_id, reference.message_id?)))
    else {
        return Ok(Original::NotAReply);
    };

    match channel_id.message(cache_http, message_id).await {
        Ok(original) => Ok(Original::Present(Box::new(original))),
        Err(serenity::Error::Http(e)) if e.status_code().map(|status| status.as_u16()) == Some(404) => {
            Ok(Original::Deleted)
        }
        Err(e) => Err(e.into()),
    }
}

/// Only the original author or moderators may restore the original embeds.
fn may_undo(original_author: UserId, reactor: UserId, can_manage_messages: bool) -> bool {
    original_author == reactor || can_manage_messages
}

fn can_manage_messages(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    user: UserId,
    roles: &[serenity::RoleId],
) -> bool {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return false;
    };
    if guild.owner_id == user {
        return true;
    }

    let permissions = std::iter::once(&guild_id.everyone_role())
        .chain(roles)
        .filter_map(|id| guild.roles.get(id))
        .fold(Permissions::empty(), |acc, role| acc | role.permissions);
    permissions.intersects(Permissions::ADMINISTRATOR | Permissions::MANAGE_MESSAGES)
}
