use anyhow::{Context, Result};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// Crates which are way too chatty on info.
const QUIET_TARGETS: &[&str] = &["serenity", "tracing", "sqlx", "reqwest", "hyper", "rustls"];

/// Setup logging to stdout and to a log file.
///
/// `BOT_LOGS` overrides the log file path, `BOT_LOG_LEVEL` the level of the bot's own messages.
pub fn init() -> Result<()> {
    let log_path = std::env::var("BOT_LOGS").unwrap_or_else(|_| "bot.log".to_string());
    let level = std::env::var("BOT_LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Cyan)
        .debug(Color::Green)
        .trace(Color::BrightBlack);

    let mut base = fern::Dispatch::new().level(level);
    for target in QUIET_TARGETS {
        base = base.level_for(*target, LevelFilter::Warn);
    }

    let file_cfg = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}:{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                line(record),
                record.level(),
                message
            ))
        })
        .chain(fern::log_file(&log_path).with_context(|| format!("Failed to open {}", log_path))?);

    let stdout_cfg = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{}:{}][{}] {}",
                record.target(),
                line(record),
                colors.color(record.level()),
                message
            ))
        })
        .chain(std::io::stdout());

    base.chain(file_cfg)
        .chain(stdout_cfg)
        .apply()
        .context("Logger already initialised")?;

    Ok(())
}

fn line(record: &log::Record<'_>) -> String {
    record
        .line()
        .map(|x| x.to_string())
        .unwrap_or_else(|| "X".to_string())
}
