//! Task outcome errors raised by the poller.

use std::fmt;

use super::category::ErrorCategory;

/// Ways an asynchronous task can fail to produce a result.
#[derive(Debug, Clone)]
pub enum TaskError {
    /// The seed response named no tasks.
    MissingTaskList,

    /// The service reported the task as failed.
    Failed { task_id: String },

    /// The task was still pending after the last attempt.
    TimedOut { task_id: String, attempts: u32 },

    /// The service reported a state this client does not know.
    UnknownState { task_id: String, state: String },

    /// The status response had no `task.state`.
    MalformedStatus { task_id: String },
}

impl TaskError {
    /// Map onto the exit taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TaskError::Failed { .. } => ErrorCategory::Unavailable,
            TaskError::TimedOut { .. } => ErrorCategory::Timeout,
            TaskError::MissingTaskList
            | TaskError::UnknownState { .. }
            | TaskError::MalformedStatus { .. } => ErrorCategory::Software,
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::MissingTaskList => write!(f, "Response does not name any tasks"),
            TaskError::Failed { task_id } => write!(f, "Task {} failed", task_id),
            TaskError::TimedOut { task_id, attempts } => write!(
                f,
                "Task {} still pending after {} attempts",
                task_id, attempts
            ),
            TaskError::UnknownState { task_id, state } => {
                write!(f, "Task {} is in unknown state '{}'", task_id, state)
            }
            TaskError::MalformedStatus { task_id } => {
                write!(f, "Status response for task {} has no state", task_id)
            }
        }
    }
}

impl std::error::Error for TaskError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_mapping() {
        let failed = TaskError::Failed {
            task_id: "t".to_string(),
        };
        let timed_out = TaskError::TimedOut {
            task_id: "t".to_string(),
            attempts: 3,
        };
        let unknown = TaskError::UnknownState {
            task_id: "t".to_string(),
            state: "RETRY".to_string(),
        };

        assert_eq!(failed.category().exit_code(), 69);
        assert_eq!(timed_out.category().exit_code(), 65);
        assert_eq!(unknown.category().exit_code(), 70);
        assert_eq!(TaskError::MissingTaskList.category().exit_code(), 70);
    }
}
