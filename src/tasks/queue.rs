//! Background task queue.
//!
//! The HTTP handlers must answer quickly, so everything that talks to the
//! Spark or Zabbix APIs is enqueued here and executed by a runner loop.
//! Tasks run under a semaphore bound (`ZPARK_WORKER_CONCURRENCY`) and are
//! retried on retryable errors with capped exponential backoff: 5s, 10s,
//! 20s, ... up to 60s, at most [`MAX_RETRIES`] retries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{AppError, AppResult, Person, Recipient, Room, WebhookEvent};
use crate::providers::{SparkClient, ZabbixClient};

pub const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE_SECS: u64 = 5;
const BACKOFF_MAX_SECS: u64 = 60;

/// The units of work the queue knows how to run.
#[derive(Debug, Clone)]
pub enum Task {
    /// Post a message to Spark
    SendSparkMessage {
        recipient: Recipient,
        text: String,
        markdown: Option<String>,
    },
    /// Resolve a webhook callback into a bot command and fan out
    DispatchSparkCommand { event: WebhookEvent },
    /// Answer the "hello" command
    SayHello { room: Room, caller: Person },
    /// Answer the "show issues" command
    ReportActiveIssues { room: Room, caller: Person },
    /// Answer the "show status" command
    ReportServerStatus { room: Room, caller: Person },
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendSparkMessage { .. } => "send_spark_message",
            Self::DispatchSparkCommand { .. } => "dispatch_spark_command",
            Self::SayHello { .. } => "say_hello",
            Self::ReportActiveIssues { .. } => "report_zabbix_active_issues",
            Self::ReportServerStatus { .. } => "report_zabbix_server_status",
        }
    }
}

/// A task plus the id handed back to the caller that enqueued it.
#[derive(Debug)]
pub struct QueuedTask {
    pub id: Uuid,
    pub task: Task,
}

/// Cloneable handle for enqueueing work.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<QueuedTask>,
}

impl TaskQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueuedTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a task, returning its id.
    pub fn enqueue(&self, task: Task) -> AppResult<Uuid> {
        let id = Uuid::new_v4();
        let name = task.name();
        self.tx
            .send(QueuedTask { id, task })
            .map_err(|_| AppError::queue_closed())?;
        info!(task = name, taskid = %id, "Task queued");
        Ok(id)
    }
}

/// Everything a running task may need.
pub struct TaskContext {
    pub config: Arc<Config>,
    pub spark: Arc<SparkClient>,
    pub zabbix: Arc<ZabbixClient>,
    /// Handle back into the queue so tasks can fan out subtasks
    pub queue: TaskQueue,
}

/// Start the runner loop consuming the queue.
pub fn spawn_runner(
    ctx: Arc<TaskContext>,
    mut rx: mpsc::UnboundedReceiver<QueuedTask>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let semaphore = Arc::new(Semaphore::new(ctx.config.worker_concurrency.max(1)));
        while let Some(queued) = rx.recv().await {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break; // semaphore closed, we are shutting down
            };
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let _permit = permit;
                run_with_retry(&ctx, queued).await;
            });
        }
        info!("Task runner stopped");
    })
}

async fn run_with_retry(ctx: &TaskContext, queued: QueuedTask) {
    let name = queued.task.name();
    for attempt in 0..=MAX_RETRIES {
        match super::run_task(ctx, &queued.task, attempt).await {
            Ok(()) => {
                info!(task = name, taskid = %queued.id, attempt, "Task completed");
                return;
            }
            Err(e) if e.code.is_retryable() && attempt < MAX_RETRIES => {
                let delay = backoff_delay(attempt);
                warn!(
                    task = name,
                    taskid = %queued.id,
                    attempt,
                    error = %e,
                    retry_in_secs = delay.as_secs(),
                    "Task failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(task = name, taskid = %queued.id, attempt, error = %e, "Task failed");
                return;
            }
        }
    }
}

/// Exponential backoff without jitter, capped at 60s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = BACKOFF_BASE_SECS
        .saturating_mul(1u64 << attempt.min(16))
        .min(BACKOFF_MAX_SECS);
    Duration::from_secs(secs)
}
