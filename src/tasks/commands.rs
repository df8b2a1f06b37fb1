//! Task bodies for outbound Spark messages and Zabbix reports.

use chrono::Utc;
use tracing::{info, warn};

use crate::core::render;
use crate::models::{AppResult, Person, Recipient, Room};

use super::queue::TaskContext;

/// Deliver a message through the Spark API.
pub async fn send_spark_message(
    ctx: &TaskContext,
    recipient: &Recipient,
    text: &str,
    markdown: Option<&str>,
) -> AppResult<()> {
    let msg = ctx.spark.create_message(recipient, text, markdown).await?;
    info!(
        recipient = recipient.as_str(),
        message_id = %msg.id,
        "Spark message sent"
    );
    Ok(())
}

/// Answer the "hello" command with a short greeting.
pub async fn say_hello(ctx: &TaskContext, room: &Room, caller: &Person) -> AppResult<()> {
    let rendered = render::hello(caller, ctx.config.contact_info.as_deref());
    send_rendered(ctx, room, &rendered).await
}

/// Answer the "show issues" command with the active Zabbix triggers.
pub async fn report_active_issues(
    ctx: &TaskContext,
    room: &Room,
    caller: &Person,
    attempt: u32,
) -> AppResult<()> {
    let issues = match ctx.zabbix.active_issues().await {
        Ok(issues) => issues,
        Err(e) => {
            notify_of_failed_command(ctx, room, caller, attempt).await;
            return Err(e);
        }
    };
    let rendered = render::active_issues(&issues, Utc::now());
    send_rendered(ctx, room, &rendered).await
}

/// Answer the "show status" command with a Zabbix server overview.
pub async fn report_server_status(
    ctx: &TaskContext,
    room: &Room,
    caller: &Person,
    attempt: u32,
) -> AppResult<()> {
    let status = match ctx.zabbix.server_status().await {
        Ok(status) => status,
        Err(e) => {
            notify_of_failed_command(ctx, room, caller, attempt).await;
            return Err(e);
        }
    };
    let rendered = render::server_status(&status);
    send_rendered(ctx, room, &rendered).await
}

/// Tell the caller their command blew up. Fires only on the first attempt
/// so retries of the underlying task do not spam the room.
async fn notify_of_failed_command(ctx: &TaskContext, room: &Room, caller: &Person, attempt: u32) {
    if attempt > 0 {
        return;
    }
    let rendered = render::failed_command_notice(caller);
    if let Err(e) = send_rendered(ctx, room, &rendered).await {
        warn!(room_id = %room.id, error = %e, "Could not notify caller of failed command");
    }
}

async fn send_rendered(ctx: &TaskContext, room: &Room, rendered: &render::Rendered) -> AppResult<()> {
    send_spark_message(
        ctx,
        &Recipient::from(room),
        &rendered.text,
        Some(&rendered.markdown),
    )
    .await
}
