use anyhow::Context as AnyhowContext;
use chrono::{DateTime, Utc};
use poise::serenity_prelude::{self as serenity, ActivityData, ReactionType};
use tokio::sync::Mutex;

use crate::{
    catalog::Catalog,
    commands,
    events::{link_fix, onboarding},
    repository::Repository,
    settings::Settings,
    state::{Module, State},
    utils, Result,
};

/// Shared by all commands and event listeners.
pub struct Data {
    pub settings: Settings,
    /// Parsed `settings.onboarding_enabled_date`.
    pub onboarding_enabled_at: DateTime<Utc>,
    pub state: Mutex<State>,
    pub repository: Repository,
    pub catalog: Catalog,
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;

impl Data {
    pub async fn is_enabled(&self, module: Module) -> bool {
        self.state.lock().await.is_enabled(module)
    }
}

pub async fn run(settings: Settings, state: State, repository: Repository) -> Result<()> {
    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_PRESENCES
        | serenity::GatewayIntents::GUILD_EMOJIS_AND_STICKERS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let token = settings.token.clone();
    let prefix = settings.prefix.clone();
    let onboarding_enabled_at = settings.onboarding_enabled_at()?;
    let catalog = Catalog::new(&settings.igdb.client_id, &settings.igdb.client_secret);

    let data = Data {
        settings,
        onboarding_enabled_at,
        state: Mutex::new(state),
        repository,
        catalog,
    };

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                mention_as_prefix: true,
                case_insensitive_commands: true,
                ..Default::default()
            },
            command_check: Some(|ctx| Box::pin(crate::checks::module_enabled(ctx))),
            pre_command: |ctx| {
                Box::pin(async move {
                    log::info!(
                        "Got command '{}' by user '{}'",
                        ctx.invocation_string(),
                        ctx.author().tag()
                    );
                })
            },
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |_ctx, _ready, framework| {
            Box::pin(async move {
                log::info!("Loaded {} commands", framework.options().commands.len());
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .context("Failed to create discord client.")?;

    Ok(client.start().await?)
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            log::info!("Connected as {}", data_about_bot.user.name);
            ctx.set_activity(Some(ActivityData::playing(format!(
                "{}help",
                data.settings.prefix
            ))));
        }
        serenity::FullEvent::Resume { .. } => {
            log::info!("Connection to discord resumed.");
        }
        serenity::FullEvent::GuildCreate { guild, .. } => {
            if utils::missing_members(guild) {
                log::info!(
                    "Requesting {} members of {}",
                    guild.member_count,
                    guild.name
                );
                ctx.shard.chunk_guild(
                    guild.id,
                    None,
                    false,
                    serenity::ChunkGuildFilter::None,
                    None,
                );
            }
        }
        serenity::FullEvent::GuildMemberUpdate {
            old_if_available,
            new: Some(new),
            ..
        } => {
            onboarding::member_updated(ctx, data, old_if_available.as_ref(), new).await?;
        }
        serenity::FullEvent::Message { new_message } => {
            if data.is_enabled(Module::LinkFix).await {
                link_fix::message(ctx, new_message).await?;
            }
        }
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            if data.is_enabled(Module::LinkFix).await {
                link_fix::reaction_add(ctx, add_reaction).await?;
            }
        }
        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Component(component),
        } => {
            if data.is_enabled(Module::Kok).await {
                commands::kok::component(ctx, data, component).await?;
            }
        }
        _ => {}
    }

    Ok(())
}

pub async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::UnknownCommand {
            ctx, msg, prefix, ..
        } => {
            if let Some(emoji) = msg
                .guild_id
                .and_then(|guild_id| utils::find_emoji(ctx, guild_id, "semmiertelme"))
            {
                let _ = msg.react(ctx, ReactionType::from(emoji)).await;
            }
            if let Err(e) = msg
                .channel_id
                .say(
                    ctx,
                    format!("Command not found. Use **{}help** to print commands.", prefix),
                )
                .await
            {
                log::warn!("Failed to report unknown command: {}", e);
            }
        }
        poise::FrameworkError::ArgumentParse { ctx, input, error, .. } => {
            log::debug!("Bad arguments {:?} for '{}': {}", input, ctx.command().name, error);
            if let Err(e) = send_command_help(ctx).await {
                log::warn!("Failed to send help: {:?}", e);
            }
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            log::error!(
                "Ignoring exception in command '{}': {:?}",
                ctx.command().qualified_name,
                error
            );
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            log::error!(
                "Event handler for {} failed: {:?}",
                event.snake_case_name(),
                error
            );
        }
        // Our checks explain themselves.
        poise::FrameworkError::CommandCheckFailed { error: None, .. } => {}
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                log::error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Prints the help text of the invoked command.
pub async fn send_command_help(ctx: Context<'_>) -> Result<(), Error> {
    let name = ctx.command().qualified_name.clone();
    commands::help::print(ctx, Some(&name)).await
}
