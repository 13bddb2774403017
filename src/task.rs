//! Polling of asynchronous server-side tasks.
//!
//! Some endpoints answer with a list of task ids instead of a result. The
//! poller queries `api.majora.task.get` until the task leaves `PENDING` or
//! the attempt ceiling is reached, sleeping between attempts.

use std::time::Duration;

use serde_json::{json, Value};

use crate::dispatch::{Dispatcher, Payload};
use crate::endpoints::{self, TASK_DELETE, TASK_GET};
use crate::error::{ClientResult, TaskError};

/// Attempt ceiling and pause between status queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub attempts: u32,
    pub interval_minutes: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval_minutes: 1,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

/// State reported for a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Success,
    Failed,
    Unknown(String),
}

impl TaskState {
    pub fn parse(state: &str) -> Self {
        match state {
            "PENDING" => TaskState::Pending,
            "SUCCESS" => TaskState::Success,
            "FAILED" => TaskState::Failed,
            other => TaskState::Unknown(other.to_string()),
        }
    }
}

/// The first task id named by a seed response's `tasks` list.
pub fn task_id_from_seed(seed: &Value) -> Result<String, TaskError> {
    match seed.get("tasks").and_then(Value::as_array).and_then(|t| t.first()) {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(TaskError::MissingTaskList),
    }
}

/// Wait for a task to finish and return its decoded status response.
///
/// Without `task_id` the id is taken from `seed`. With `should_wait` false
/// exactly one status query is made.
pub async fn wait_for_task(
    dispatcher: &mut Dispatcher,
    task_id: Option<&str>,
    seed: Option<&Value>,
    should_wait: bool,
    poll: &PollConfig,
) -> ClientResult<Value> {
    let task_id = match (task_id, seed) {
        (Some(id), _) => id.to_string(),
        (None, Some(seed)) => task_id_from_seed(seed)?,
        (None, None) => return Err(TaskError::MissingTaskList.into()),
    };

    let attempts = if should_wait { poll.attempts.max(1) } else { 1 };

    for attempt in 1..=attempts {
        let response = query_status(dispatcher, &task_id).await?;
        let state = response
            .get("task")
            .and_then(|t| t.get("state"))
            .and_then(Value::as_str)
            .ok_or_else(|| TaskError::MalformedStatus {
                task_id: task_id.clone(),
            })?;

        tracing::info!(task_id = %task_id, attempt, attempts, state, "task status");

        match TaskState::parse(state) {
            TaskState::Success => return Ok(response),
            TaskState::Failed => return Err(TaskError::Failed { task_id }.into()),
            TaskState::Unknown(state) => {
                return Err(TaskError::UnknownState { task_id, state }.into());
            }
            TaskState::Pending => {
                if attempt < attempts {
                    tokio::time::sleep(poll.interval()).await;
                }
            }
        }
    }

    Err(TaskError::TimedOut { task_id, attempts }.into())
}

async fn query_status(dispatcher: &mut Dispatcher, task_id: &str) -> ClientResult<Value> {
    let endpoint = endpoints::lookup(TASK_GET)?;
    dispatcher.emit(endpoint, task_payload(task_id)).await
}

/// Ask the service to drop a finished task's result.
///
/// Best effort: failures are logged and reported as `false`.
pub async fn delete_task(dispatcher: &mut Dispatcher, task_id: &str) -> bool {
    let endpoint = match endpoints::lookup(TASK_DELETE) {
        Ok(endpoint) => endpoint,
        Err(_) => return false,
    };

    match dispatcher.emit(endpoint, task_payload(task_id)).await {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(task_id, error = %err, "could not delete task result");
            false
        }
    }
}

fn task_payload(task_id: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert("task_id".to_string(), Value::String(task_id.to_string()));
    payload.insert("params".to_string(), json!({ "task_id": task_id }));
    payload
}
