//! Bot command parsing.
//!
//! Turns the text of an inbound Spark message into a [`BotCommand`]. In a
//! group room the message text arrives prefixed with the bot's display name
//! (Spark only delivers callbacks for messages that mention the bot); the
//! name is recovered from the `spark-mention` tag in the HTML rendering and
//! stripped before matching. Direct rooms carry the bare command.
//!
//! Commands are user input and are sanitized hard: ASCII alphanumerics and
//! spaces only, at most [`MAX_COMMAND_LEN`] characters. Anything else is
//! dropped without dispatch.

use crate::models::{Room, SparkMessage};

/// Longest command we consider reasonable.
pub const MAX_COMMAND_LEN: usize = 79;

/// The commands the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// "hello" - introduce the bot and its caretaker
    Hello,
    /// "show issues" - report active Zabbix problem triggers
    ShowIssues,
    /// "show status" - report Zabbix server statistics
    ShowStatus,
}

impl BotCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::ShowIssues => "show issues",
            Self::ShowStatus => "show status",
        }
    }
}

/// Outcome of parsing a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Command(BotCommand),
    /// Sanitized fine but not a command we know
    Unknown(String),
    /// Rejected before lookup (bad characters, too long, missing mention)
    Rejected(&'static str),
}

/// Parse the command out of a message, honoring the room type.
pub fn parse_command(msg: &SparkMessage, room: &Room) -> ParseOutcome {
    let text = msg.text.as_deref().unwrap_or("").trim();

    let command = if room.is_group() {
        let Some(bot_name) = mention_name(msg.html.as_deref().unwrap_or("")) else {
            // Spark should only call back for messages that mention us
            return ParseOutcome::Rejected("group message carries no bot mention");
        };
        let Some(stripped) = strip_mention_prefix(text, &bot_name) else {
            return ParseOutcome::Rejected("message text does not start with the bot name");
        };
        stripped
    } else {
        text.to_string()
    };

    let command = command.trim();

    if command.len() > MAX_COMMAND_LEN {
        return ParseOutcome::Rejected("command is unreasonably long");
    }
    if !command.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ') {
        return ParseOutcome::Rejected("command contains invalid characters");
    }

    let normalized = command
        .split_ascii_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();

    match normalized.as_str() {
        "hello" => ParseOutcome::Command(BotCommand::Hello),
        "show issues" => ParseOutcome::Command(BotCommand::ShowIssues),
        "show status" => ParseOutcome::Command(BotCommand::ShowStatus),
        _ => ParseOutcome::Unknown(normalized),
    }
}

/// Pull the bot's display name out of the message HTML.
///
/// Group messages look like:
/// `<p><spark-mention data-object-type="person" ...>Zpark</spark-mention> show issues</p>`
fn mention_name(html: &str) -> Option<String> {
    let open = html.find("<spark-mention")?;
    let rest = &html[open..];
    let inner_start = rest.find('>')? + 1;
    let inner_end = rest.find("</spark-mention>")?;
    if inner_end <= inner_start {
        return None;
    }
    let name = rest[inner_start..inner_end].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Strip the bot name plus an optional delimiter off the front of the text.
///
/// Users type the mention with varying separators: "Zpark show issues",
/// "Zpark: show issues", "Zpark,show issues", even "Zparkshow issues"
/// (the Spark client inserts no space after a completed mention).
fn strip_mention_prefix(text: &str, bot_name: &str) -> Option<String> {
    let rest = strip_prefix_ignore_case(text, bot_name)?;
    let rest = rest.trim_start_matches([',', ';', ':']).trim_start();
    Some(rest.to_string())
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    // get() instead of slicing: the text is arbitrary Unicode and the
    // prefix length may not land on a char boundary
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}
