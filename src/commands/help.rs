use crate::discord::{Context, Error};

const ABOUT: &str = "Pot but bot.
Mainly for handing out self-assignable roles (aka tags).";

/// Shows this menu or the details of a command.
#[poise::command(prefix_command, track_edits)]
pub async fn help(
    ctx: Context<'_>,
    #[description = "Command to show help about"]
    #[rest]
    command: Option<String>,
) -> Result<(), Error> {
    print(ctx, command.as_deref()).await
}

pub async fn print(ctx: Context<'_>, command: Option<&str>) -> Result<(), Error> {
    let footer = format!(
        "{}\n\nType {prefix}help command for more info on a command.",
        ABOUT,
        prefix = ctx.prefix()
    );

    poise::builtins::help(
        ctx,
        command,
        poise::builtins::HelpConfiguration {
            extra_text_at_bottom: &footer,
            show_context_menu_commands: false,
            ..Default::default()
        },
    )
    .await?;

    Ok(())
}
