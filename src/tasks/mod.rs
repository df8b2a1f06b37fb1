//! Background task execution: queue, runner and the task bodies.

pub mod commands;
pub mod dispatch;
pub mod queue;

pub use queue::{spawn_runner, QueuedTask, Task, TaskContext, TaskQueue, MAX_RETRIES};

use crate::models::AppResult;

/// Run a single task body. `attempt` is 0 on the first run and counts up
/// with each retry.
pub(crate) async fn run_task(ctx: &queue::TaskContext, task: &Task, attempt: u32) -> AppResult<()> {
    match task {
        Task::SendSparkMessage {
            recipient,
            text,
            markdown,
        } => commands::send_spark_message(ctx, recipient, text, markdown.as_deref()).await,
        Task::DispatchSparkCommand { event } => {
            dispatch::dispatch_spark_command(ctx, event).await.map(|_| ())
        }
        Task::SayHello { room, caller } => commands::say_hello(ctx, room, caller).await,
        Task::ReportActiveIssues { room, caller } => {
            commands::report_active_issues(ctx, room, caller, attempt).await
        }
        Task::ReportServerStatus { room, caller } => {
            commands::report_server_status(ctx, room, caller, attempt).await
        }
    }
}
