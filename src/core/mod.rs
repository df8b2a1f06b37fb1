//! Command parsing and message rendering.

pub mod command;
pub mod render;

pub use command::{parse_command, BotCommand, ParseOutcome, MAX_COMMAND_LEN};
pub use render::Rendered;
