use crate::{
    discord::{Data, Error},
    utils,
};
use anyhow::Context as AnyhowContext;
use futures::StreamExt;
use poise::serenity_prelude::{
    self as serenity, GuildMemberFlags, Member, Mentionable, RoleId,
};
use std::{future::Future, time::Duration};

const KICK_REASON: &str = "Did not accept terms of service during onboarding, likely a bot.";
/// The platform posts its join message shortly after the update.
const JOIN_MESSAGE_DELAY: Duration = Duration::from_secs(1);
const JOIN_MESSAGE_SEARCH_LIMIT: usize = 200;
/// Welcome text placeholders for the bot's own mention.
const BOT_PLACEHOLDERS: [&str; 2] = ["bot", "botemkin"];

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Ignore,
    /// Joined before the gate existed and only now went through it.
    ReportVeteran,
    /// Picked the restricted role.
    Kick(RoleId),
    Welcome,
}

fn decide(
    was_onboarded: bool,
    is_onboarded: bool,
    joined_at: Option<i64>,
    enabled_at: i64,
    restricted_role: Option<RoleId>,
) -> Action {
    if was_onboarded || !is_onboarded {
        return Action::Ignore;
    }
    if joined_at.is_some_and(|joined_at| joined_at < enabled_at) {
        return Action::ReportVeteran;
    }

    match restricted_role {
        Some(role) => Action::Kick(role),
        None => Action::Welcome,
    }
}

fn onboarded(member: &Member) -> bool {
    member.flags.contains(GuildMemberFlags::COMPLETED_ONBOARDING)
}

pub async fn member_updated(
    ctx: &serenity::Context,
    data: &Data,
    old: Option<&Member>,
    new: &Member,
) -> Result<(), Error> {
    let settings = &data.settings;
    let joined_at = old
        .and_then(|old| old.joined_at)
        .or(new.joined_at)
        .map(|joined_at| joined_at.unix_timestamp());
    let restricted_role = {
        let guild = ctx.cache.guild(new.guild_id);
        guild.and_then(|guild| {
            new.roles
                .iter()
                .filter_map(|id| guild.roles.get(id))
                .find(|role| utils::same_name(&role.name, &settings.restricted_role))
                .map(|role| role.id)
        })
    };

    let action = decide(
        old.is_some_and(onboarded),
        onboarded(new),
        joined_at,
        data.onboarding_enabled_at.timestamp(),
        restricted_role,
    );

    match action {
        Action::Ignore => {}
        Action::ReportVeteran => {
            notify_moderation(
                ctx,
                data,
                new,
                format!(
                    "Onboarded member who joined before its introduction, name: {}",
                    new.mention()
                ),
            )
            .await?;
        }
        Action::Kick(role) => {
            log::info!("Kicking {} who picked the restricted role", new.user.tag());
            new.kick_with_reason(ctx, KICK_REASON).await?;
            after_kick(
                notify_moderation(
                    ctx,
                    data,
                    new,
                    format!(
                        "Kicked newly onboarded member that picked {} role, username: {}",
                        role.mention(),
                        new.user.name
                    ),
                ),
                async {
                    tokio::time::sleep(JOIN_MESSAGE_DELAY).await;
                    delete_join_message(ctx, data, new).await
                },
            )
            .await?;
        }
        Action::Welcome => {
            welcome(ctx, data, new).await?;
        }
    }

    Ok(())
}

/// Both steps run, the first failure is returned.
async fn after_kick(
    notify: impl Future<Output = Result<(), Error>>,
    delete_join_message: impl Future<Output = Result<(), Error>>,
) -> Result<(), Error> {
    let notified = notify.await;
    let deleted = delete_join_message.await;

    match (notified, deleted) {
        (Err(e), Err(other)) => {
            log::error!("Failed to delete join message: {:?}", other);
            Err(e)
        }
        (notified, deleted) => notified.and(deleted),
    }
}

async fn notify_moderation(
    ctx: &serenity::Context,
    data: &Data,
    member: &Member,
    content: String,
) -> Result<(), Error> {
    let name = &data.settings.channels.moderation;
    let channel = utils::find_channel(ctx, member.guild_id, name)
        .with_context(|| format!("Missing moderation channel {}", name))?;

    channel.say(ctx, content).await?;
    Ok(())
}

async fn delete_join_message(
    ctx: &serenity::Context,
    data: &Data,
    member: &Member,
) -> Result<(), Error> {
    let name = &data.settings.channels.home;
    let home = utils::find_channel(ctx, member.guild_id, name)
        .with_context(|| format!("Missing home channel {}", name))?;

    let mut messages = Box::pin(home.messages_iter(ctx).take(JOIN_MESSAGE_SEARCH_LIMIT));
    while let Some(message) = messages.next().await {
        let message = message?;
        if message.author.id == member.user.id {
            message.delete(ctx).await?;
            break;
        }
    }

    Ok(())
}

async fn welcome(ctx: &serenity::Context, data: &Data, member: &Member) -> Result<(), Error> {
    let channels = &data.settings.channels;
    let home = utils::find_channel(ctx, member.guild_id, &channels.home)
        .with_context(|| format!("Missing home channel {}", channels.home))?;

    let channel_mention = |name: &str| match utils::find_channel(ctx, member.guild_id, name) {
        Some(channel) => channel.mention().to_string(),
        None => format!("#{}", name),
    };
    let bot = ctx.cache.current_user().id.mention().to_string();

    let mut values = vec![
        ("new_member", member.mention().to_string()),
        ("announcements", channel_mention(&channels.announcements)),
        ("home", home.mention().to_string()),
        ("general", channel_mention(&channels.general)),
        ("matchmaking", channel_mention(&channels.matchmaking)),
    ];
    values.extend(BOT_PLACEHOLDERS.map(|name| (name, bot.clone())));

    let text = render_welcome(&data.settings.welcome_text, &values);
    home.say(ctx, text).await?;

    Ok(())
}

/// Fills `{name}` placeholders, unknown ones stay as they are.
fn render_welcome(template: &str, values: &[(&str, String)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name), value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    const ENABLED_AT: i64 = 1_700_000_000;
    const RESTRICTED: RoleId = RoleId::new(7);

    #[test]
    fn only_fresh_onboarding_counts() {
        assert_eq!(decide(true, true, None, ENABLED_AT, None), Action::Ignore);
        assert_eq!(decide(false, false, None, ENABLED_AT, None), Action::Ignore);
        assert_eq!(decide(true, false, None, ENABLED_AT, None), Action::Ignore);
    }

    #[test]
    fn veterans_are_reported() {
        assert_eq!(
            decide(false, true, Some(ENABLED_AT - 1), ENABLED_AT, Some(RESTRICTED)),
            Action::ReportVeteran
        );
    }

    #[test]
    fn restricted_role_gets_kicked() {
        assert_eq!(
            decide(false, true, Some(ENABLED_AT), ENABLED_AT, Some(RESTRICTED)),
            Action::Kick(RESTRICTED)
        );
    }

    #[test]
    fn new_members_get_welcomed() {
        assert_eq!(
            decide(false, true, Some(ENABLED_AT + 60), ENABLED_AT, None),
            Action::Welcome
        );
        assert_eq!(decide(false, true, None, ENABLED_AT, None), Action::Welcome);
    }

    #[tokio::test]
    async fn join_message_goes_without_moderation_channel() {
        let deleted = AtomicBool::new(false);

        let result = after_kick(
            async { Err::<(), Error>(anyhow::anyhow!("Missing moderation channel moderation")) },
            async {
                deleted.store(true, Ordering::SeqCst);
                Ok::<(), Error>(())
            },
        )
        .await;

        assert!(result.is_err());
        assert!(deleted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_join_message_deletion_is_reported() {
        let result = after_kick(async { Ok::<(), Error>(()) }, async {
            Err::<(), Error>(anyhow::anyhow!("Missing home channel home"))
        })
        .await;

        assert!(result.is_err());
    }

    #[test]
    fn welcome_fills_placeholders() {
        let text = render_welcome(
            "Hi {new_member}, read {announcements} then ask {bot} in {home}. {unknown}",
            &[
                ("new_member", "<@1>".to_string()),
                ("announcements", "<#2>".to_string()),
                ("home", "<#3>".to_string()),
                ("bot", "<@4>".to_string()),
            ],
        );

        assert_eq!(text, "Hi <@1>, read <#2> then ask <@4> in <#3>. {unknown}");
    }

    #[test]
    fn bot_placeholder_has_an_alias() {
        let values = BOT_PLACEHOLDERS.map(|name| (name, "<@4>".to_string()));
        let text = render_welcome("Ask {bot} or {botemkin} for tags.", &values);

        assert_eq!(text, "Ask <@4> or <@4> for tags.");
    }

    #[test]
    fn placeholders_repeat() {
        let text = render_welcome("{home} {home}", &[("home", "<#3>".to_string())]);

        assert_eq!(text, "<#3> <#3>");
    }
}
