//! Turn a webhook callback into a bot command task.
//!
//! The callback only carries a message id, so the full message, the room
//! and the caller are all fetched from the Spark API before the command
//! text is parsed. Messages that do not resolve to a known command are
//! logged and dropped without an error.

use tracing::{info, warn};

use crate::core::{parse_command, BotCommand, ParseOutcome};
use crate::models::{AppError, AppResult, WebhookEvent};

use super::queue::{Task, TaskContext};

/// Returns `true` when a command task was enqueued for the message.
pub async fn dispatch_spark_command(ctx: &TaskContext, event: &WebhookEvent) -> AppResult<bool> {
    let msg = ctx.spark.get_message(&event.data.id).await?;
    let room = ctx.spark.get_room(&msg.room_id).await?;

    let cmd = match parse_command(&msg, &room) {
        ParseOutcome::Command(cmd) => cmd,
        ParseOutcome::Unknown(text) => {
            info!(room_id = %room.id, command = %text, "Unknown command ignored");
            return Ok(false);
        }
        ParseOutcome::Rejected(reason) => {
            warn!(room_id = %room.id, reason, "Command rejected");
            return Ok(false);
        }
    };

    let person_id = msg
        .person_id
        .as_deref()
        .or(event.data.person_id.as_deref())
        .ok_or_else(|| AppError::spark_invalid_response("Message is missing personId"))?;
    let caller = ctx.spark.get_person(person_id).await?;

    let task = match cmd {
        BotCommand::Hello => Task::SayHello {
            room: room.clone(),
            caller,
        },
        BotCommand::ShowIssues => Task::ReportActiveIssues {
            room: room.clone(),
            caller,
        },
        BotCommand::ShowStatus => Task::ReportServerStatus {
            room: room.clone(),
            caller,
        },
    };

    let taskid = ctx.queue.enqueue(task)?;
    info!(
        room_id = %room.id,
        command = cmd.as_str(),
        %taskid,
        "Command dispatched"
    );
    Ok(true)
}
