use poise::serenity_prelude as serenity;

/// Discord refuses messages longer than this.
pub const MESSAGE_LIMIT: usize = 2000;

/// Splits lines into messages that fit Discord's length limit.
///
/// Every page is wrapped in `prefix` and `suffix`, e.g. a code block.
#[derive(Debug)]
pub struct Paginator {
    prefix: String,
    suffix: String,
    max_size: usize,
    current: String,
    pages: Vec<String>,
}

impl Paginator {
    pub fn new(prefix: &str, suffix: &str) -> Self {
        Self::with_max_size(prefix, suffix, MESSAGE_LIMIT)
    }

    pub fn with_max_size(prefix: &str, suffix: &str, max_size: usize) -> Self {
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}\n", prefix)
        };
        let suffix = if suffix.is_empty() {
            String::new()
        } else {
            format!("\n{}", suffix)
        };

        Self {
            current: prefix.clone(),
            prefix,
            suffix,
            max_size,
            pages: Vec::new(),
        }
    }

    /// Lines which don't fit into a page on their own are cut.
    pub fn add_line(&mut self, line: &str) {
        let budget = self
            .max_size
            .saturating_sub(self.prefix.len() + self.suffix.len());
        let line = truncate(line, budget);

        let separator = usize::from(self.current.len() > self.prefix.len());
        if self.current.len() + separator + line.len() + self.suffix.len() > self.max_size {
            self.close_page();
        }
        if self.current.len() > self.prefix.len() {
            self.current.push('\n');
        }
        self.current.push_str(line);
    }

    /// Adds a line followed by an empty one.
    pub fn add_paragraph(&mut self, line: &str) {
        self.add_line(line);
        self.add_line("");
    }

    fn close_page(&mut self) {
        let mut page = std::mem::replace(&mut self.current, self.prefix.clone());
        page.push_str(&self.suffix);
        self.pages.push(page);
    }

    pub fn into_pages(mut self) -> Vec<String> {
        if self.current.len() > self.prefix.len() {
            self.close_page();
        }
        self.pages
    }
}

fn truncate(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

/// "*A*", "*A* and *B*", "*A, B* and *C*"
pub fn join_names<S: AsRef<str>>(names: &[S]) -> String {
    match names {
        [] => String::new(),
        [single] => format!("*{}*", single.as_ref()),
        [init @ .., last] => format!(
            "*{}* and *{}*",
            init.iter().map(|n| n.as_ref()).collect::<Vec<_>>().join(", "),
            last.as_ref()
        ),
    }
}

pub fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Case-insensitive name comparison as used for tags and roles.
pub fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Large guilds arrive without their member list, which has to be requested separately.
pub fn missing_members(guild: &serenity::Guild) -> bool {
    (guild.members.len() as u64) < guild.member_count
}

/// Custom guild emoji by name.
pub fn find_emoji(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    name: &str,
) -> Option<serenity::Emoji> {
    let guild = ctx.cache.guild(guild_id)?;
    guild.emojis.values().find(|emoji| emoji.name == name).cloned()
}

/// Custom guild emoji by name, rendered as `<:name:id>`.
pub fn guild_emoji(ctx: &serenity::Context, guild_id: serenity::GuildId, name: &str) -> Option<String> {
    find_emoji(ctx, guild_id, name).map(|emoji| emoji.to_string())
}

/// Guild channel by exact name.
pub fn find_channel(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    name: &str,
) -> Option<serenity::ChannelId> {
    let guild = ctx.cache.guild(guild_id)?;
    guild
        .channels
        .values()
        .find(|channel| channel.name == name)
        .map(|channel| channel.id)
}

/// Guild role by exact name.
pub fn find_role(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    name: &str,
) -> Option<serenity::Role> {
    let guild = ctx.cache.guild(guild_id)?;
    guild.roles.values().find(|role| role.name == name).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_names_like_a_sentence() {
        assert_eq!(join_names::<&str>(&[]), "");
        assert_eq!(join_names(&["GG"]), "*GG*");
        assert_eq!(join_names(&["GG", "Melty"]), "*GG* and *Melty*");
        assert_eq!(
            join_names(&["GG", "Melty", "UNIST"]),
            "*GG, Melty* and *UNIST*"
        );
    }

    #[test]
    fn plural_suffix() {
        assert_eq!(plural(0), "s");
        assert_eq!(plural(1), "");
        assert_eq!(plural(2), "s");
    }

    #[test]
    fn large_guilds_miss_members() {
        let mut guild = serenity::Guild::default();
        guild.member_count = 2;
        guild
            .members
            .insert(serenity::UserId::new(1), serenity::Member::default());
        assert!(missing_members(&guild));

        guild
            .members
            .insert(serenity::UserId::new(2), serenity::Member::default());
        assert!(!missing_members(&guild));
    }

    #[test]
    fn names_compare_without_case() {
        assert!(same_name("Melty", "mELTY"));
        assert!(same_name("ÄRGER", "ärger"));
        assert!(!same_name("GG", "GGST"));
    }

    #[test]
    fn paginator_wraps_pages() {
        let mut paginator = Paginator::new("```css", "```");
        paginator.add_paragraph("Available gametags:");
        paginator.add_line("GG [Guilty Gear]#1");

        assert_eq!(
            paginator.into_pages(),
            vec!["```css\nAvailable gametags:\n\nGG [Guilty Gear]#1\n```".to_string()]
        );
    }

    #[test]
    fn paginator_splits_on_limit() {
        let mut paginator = Paginator::with_max_size("", "", 10);
        paginator.add_line("12345");
        paginator.add_line("1234");
        paginator.add_line("abc");

        assert_eq!(paginator.into_pages(), vec!["12345\n1234", "abc"]);
    }

    #[test]
    fn paginator_cuts_long_lines() {
        let mut paginator = Paginator::with_max_size("[", "]", 8);
        paginator.add_line("abcdefghij");

        assert_eq!(paginator.into_pages(), vec!["[\nabcd\n]"]);
    }

    #[test]
    fn empty_paginator_has_no_pages() {
        let paginator = Paginator::new("```", "```");

        assert!(paginator.into_pages().is_empty());
    }
}
