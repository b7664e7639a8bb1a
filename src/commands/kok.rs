//! King of the Hill: members report won sets, moderators approve them and
//! the `King of <game>` role moves to the winner.

use crate::{
    discord::{Context, Data, Error},
    utils,
};
use anyhow::Context as AnyhowContext;
use poise::{
    serenity_prelude::{
        self as serenity, ButtonStyle, ComponentInteraction, CreateActionRow, CreateButton,
        CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage, EditMessage,
        GuildId, Mentionable, ReactionType, RoleId, UserId,
    },
    CreateReply,
};

const APPROVE_PREFIX: &str = "kok-approve";
const APPROVE_LABEL: &str = "💯Real🗣️📢📠";
const FREE: &str = "🆓";
/// Discord rejects longer component ids.
const CUSTOM_ID_LIMIT: usize = 100;

/// Outcome of a reported set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KokResult {
    pub game: String,
    pub winner: UserId,
    pub loser: UserId,
    pub winner_rounds: u32,
    pub loser_rounds: u32,
}

impl KokResult {
    /// `None` for draws, a set always has a winner.
    pub fn new(
        game: &str,
        reporter: UserId,
        opponent: UserId,
        rounds_won: u32,
        rounds_lost: u32,
    ) -> Option<Self> {
        let (winner, loser) = match rounds_won.cmp(&rounds_lost) {
            std::cmp::Ordering::Greater => (reporter, opponent),
            std::cmp::Ordering::Less => (opponent, reporter),
            std::cmp::Ordering::Equal => return None,
        };

        Some(Self {
            game: game.to_string(),
            winner,
            loser,
            winner_rounds: rounds_won.max(rounds_lost),
            loser_rounds: rounds_won.min(rounds_lost),
        })
    }

    /// The loser didn't take a single round.
    pub fn free(&self) -> bool {
        self.loser_rounds == 0
    }

    fn summary(&self, role: RoleId) -> String {
        format!(
            "[{}]: {} {} - {} {}",
            role.mention(),
            self.winner.mention(),
            self.winner_rounds,
            self.loser_rounds,
            self.loser.mention()
        )
    }

    /// Carries the result through the approve button, the game goes last as it may contain `:`.
    ///
    /// `None` if the game name doesn't leave enough room.
    fn custom_id(&self) -> Option<String> {
        let custom_id = format!(
            "{}:{}:{}:{}:{}:{}",
            APPROVE_PREFIX,
            self.winner,
            self.loser,
            self.winner_rounds,
            self.loser_rounds,
            self.game
        );
        (custom_id.chars().count() <= CUSTOM_ID_LIMIT).then_some(custom_id)
    }

    fn from_custom_id(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.splitn(6, ':');
        if parts.next()? != APPROVE_PREFIX {
            return None;
        }

        let winner = UserId::new(parts.next()?.parse().ok().filter(|id| *id != 0)?);
        let loser = UserId::new(parts.next()?.parse().ok().filter(|id| *id != 0)?);
        let winner_rounds = parts.next()?.parse().ok()?;
        let loser_rounds = parts.next()?.parse().ok()?;
        let game = parts.next()?.to_string();

        Some(Self {
            game,
            winner,
            loser,
            winner_rounds,
            loser_rounds,
        })
    }
}

fn role_name(game: &str) -> String {
    format!("King of {}", game)
}

fn matching_games<'a>(games: &'a [String], partial: &str) -> Vec<&'a str> {
    let partial = partial.to_lowercase();
    games
        .iter()
        .filter(|game| game.to_lowercase().contains(&partial))
        .map(String::as_str)
        .collect()
}

async fn autocomplete_game(ctx: Context<'_>, partial: &str) -> Vec<String> {
    matching_games(&ctx.data().settings.kok.games, partial)
        .into_iter()
        .map(String::from)
        .collect()
}

async fn say_ephemeral(ctx: Context<'_>, content: impl Into<String>) -> Result<(), Error> {
    ctx.send(CreateReply::default().content(content).ephemeral(true))
        .await?;
    Ok(())
}

/// Report the result of a King of the Hill set.
#[poise::command(
    slash_command,
    rename = "kok-report",
    category = "Kok",
    guild_only
)]
pub async fn kok_report(
    ctx: Context<'_>,
    #[description = "Name of the game"]
    #[autocomplete = "autocomplete_game"]
    game: String,
    #[description = "Your opponent"] opponent: serenity::Member,
    #[description = "Matches you won 👑"] rounds_won: u32,
    #[description = "Matches you lost 👎"] rounds_lost: u32,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().context("KoK only exists in guilds")?;
    let settings = &ctx.data().settings.kok;

    if opponent.user.id == ctx.author().id {
        return say_ephemeral(ctx, "You can't play against yourself.").await;
    }
    let Some(result) = KokResult::new(
        &game,
        ctx.author().id,
        opponent.user.id,
        rounds_won,
        rounds_lost,
    ) else {
        return say_ephemeral(ctx, "Draws can't be reported, play a deciding round.").await;
    };
    let Some(custom_id) = result.custom_id() else {
        return say_ephemeral(ctx, "The game name is too long to be reported.").await;
    };
    let Some(role) = utils::find_role(ctx.serenity_context(), guild_id, &role_name(&game)) else {
        log::warn!("Role not found for game {}", game);
        return say_ephemeral(ctx, format!("There is no {} role.", role_name(&game))).await;
    };
    let moderation = utils::find_channel(ctx.serenity_context(), guild_id, &settings.moderation_channel)
        .with_context(|| format!("Missing channel {}", settings.moderation_channel))?;

    say_ephemeral(ctx, "KoK submited, awaiting approval").await?;

    let button = CreateButton::new(custom_id)
        .label(APPROVE_LABEL)
        .style(ButtonStyle::Primary);
    moderation
        .send_message(
            ctx,
            CreateMessage::new()
                .content(result.summary(role.id))
                .components(vec![CreateActionRow::Buttons(vec![button])]),
        )
        .await?;

    Ok(())
}

/// Challenge the current King of the Hill.
#[poise::command(
    slash_command,
    rename = "kok-challenge",
    category = "Kok",
    guild_only
)]
pub async fn kok_challenge(
    ctx: Context<'_>,
    #[description = "Name of the game"]
    #[autocomplete = "autocomplete_game"]
    game: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().context("KoK only exists in guilds")?;
    let Some(role) = utils::find_role(ctx.serenity_context(), guild_id, &role_name(&game)) else {
        log::warn!("Role not found for game {}", game);
        return say_ephemeral(ctx, format!("There is no {} role.", role_name(&game))).await;
    };

    let holder = ctx.guild().and_then(|guild| {
        guild
            .members
            .values()
            .find(|member| member.roles.contains(&role.id))
            .map(|member| member.user.id)
    });

    if let Some(holder) = holder {
        ctx.say(format!(
            "[{}]: New Challenger! {}. You have 48 hours to play the set, or else...!",
            role.mention(),
            holder.mention()
        ))
        .await?;
        return Ok(());
    }

    say_ephemeral(ctx, "No one has the role yet, congrats!").await?;
    ctx.http()
        .add_member_role(guild_id, ctx.author().id, role.id, Some("No Contest"))
        .await?;
    post_to_log(
        ctx.serenity_context(),
        &ctx.data().settings.kok.log_channel,
        guild_id,
        format!(
            "[{}] - {} claimed the title.",
            role.mention(),
            ctx.author().mention()
        ),
    )
    .await?;

    Ok(())
}

/// Handles the approve button below reported results.
pub async fn component(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
) -> Result<(), Error> {
    let Some(result) = KokResult::from_custom_id(&interaction.data.custom_id) else {
        return Ok(());
    };
    let guild_id = interaction.guild_id.context("KoK only exists in guilds")?;

    interaction
        .create_response(
            ctx,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content("Approved!")
                    .ephemeral(true),
            ),
        )
        .await?;

    let mut message = (*interaction.message).clone();
    let summary = message.content.clone();
    message
        .edit(
            ctx,
            EditMessage::new()
                .content(format!(
                    "{} ✅ - approved by {}",
                    summary,
                    interaction.user.tag()
                ))
                .components(Vec::new()),
        )
        .await?;

    let logged = post_to_log(ctx, &data.settings.kok.log_channel, guild_id, summary).await?;
    if result.free() {
        logged
            .react(ctx, ReactionType::Unicode(FREE.to_string()))
            .await?;
    }

    let role = utils::find_role(ctx, guild_id, &role_name(&result.game))
        .with_context(|| format!("Role not found for game {}", result.game))?;
    let winner = result.winner.to_user(ctx).await?.tag();
    let loser = result.loser.to_user(ctx).await?.tag();
    ctx.http
        .remove_member_role(
            guild_id,
            result.loser,
            role.id,
            Some(&format!("Lost to {}", winner)),
        )
        .await?;
    ctx.http
        .add_member_role(
            guild_id,
            result.winner,
            role.id,
            Some(&format!("Won against {}", loser)),
        )
        .await?;
    log::info!(
        "{} approved: {} won {} against {}",
        interaction.user.tag(),
        winner,
        role.name,
        loser
    );

    Ok(())
}

async fn post_to_log(
    ctx: &serenity::Context,
    channel_name: &str,
    guild_id: GuildId,
    content: String,
) -> Result<serenity::Message, Error> {
    let channel = utils::find_channel(ctx, guild_id, channel_name)
        .with_context(|| format!("Missing channel {}", channel_name))?;

    Ok(channel.say(ctx, content).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: UserId = UserId::new(1);
    const BOB: UserId = UserId::new(2);

    #[test]
    fn reporter_wins() {
        let result = KokResult::new("GG", ALICE, BOB, 3, 1).unwrap();

        assert_eq!(result.winner, ALICE);
        assert_eq!(result.loser, BOB);
        assert_eq!((result.winner_rounds, result.loser_rounds), (3, 1));
        assert!(!result.free());
    }

    #[test]
    fn reporter_loses_for_free() {
        let result = KokResult::new("SF", ALICE, BOB, 0, 3).unwrap();

        assert_eq!(result.winner, BOB);
        assert_eq!(result.loser, ALICE);
        assert_eq!((result.winner_rounds, result.loser_rounds), (3, 0));
        assert!(result.free());
    }

    #[test]
    fn draws_are_rejected() {
        assert_eq!(KokResult::new("GG", ALICE, BOB, 2, 2), None);
    }

    #[test]
    fn summary_mentions_everyone() {
        let result = KokResult::new("GG", ALICE, BOB, 3, 2).unwrap();

        assert_eq!(result.summary(RoleId::new(9)), "[<@&9>]: <@1> 3 - 2 <@2>");
    }

    #[test]
    fn results_survive_the_button() {
        let result = KokResult::new("Fatal: Fury", ALICE, BOB, 1, 3).unwrap();

        let custom_id = result.custom_id().unwrap();
        assert_eq!(custom_id, "kok-approve:2:1:3:1:Fatal: Fury");
        assert_eq!(KokResult::from_custom_id(&custom_id), Some(result));
    }

    #[test]
    fn long_game_names_dont_fit_the_button() {
        let alice = UserId::new(187_654_321_098_765_432);
        let bob = UserId::new(298_765_432_109_876_543);
        // "kok-approve:" plus both ids, both scores and the separators.
        let overhead = 12 + 18 + 1 + 18 + 1 + 1 + 1 + 1 + 1;

        let fits = KokResult::new(&"G".repeat(100 - overhead), alice, bob, 3, 1).unwrap();
        assert_eq!(fits.custom_id().map(|id| id.chars().count()), Some(100));

        let too_long = KokResult::new(&"G".repeat(101 - overhead), alice, bob, 3, 1).unwrap();
        assert_eq!(too_long.custom_id(), None);
    }

    #[test]
    fn foreign_buttons_are_ignored() {
        assert_eq!(KokResult::from_custom_id("approve_button"), None);
        assert_eq!(KokResult::from_custom_id("kok-approve:x:1:3:1:GG"), None);
        assert_eq!(KokResult::from_custom_id("kok-approve:2:1:3"), None);
    }

    #[test]
    fn games_complete_by_substring() {
        let games = vec!["SF".to_string(), "TEKKEN".to_string(), "FatalFury".to_string()];

        assert_eq!(matching_games(&games, "f"), vec!["SF", "FatalFury"]);
        assert_eq!(matching_games(&games, "ekk"), vec!["TEKKEN"]);
        assert_eq!(matching_games(&games, "").len(), 3);
    }
}
