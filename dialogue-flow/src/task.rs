use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::Result};

/// Result of a single task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Utterance to send back to the user, if any.
    pub response: Option<String>,
    /// What the flow should do next.
    pub next_action: NextAction,
    /// Internal status line, surfaced in logs and session introspection.
    pub status_message: Option<String>,
    /// Id of the task that produced this result. Filled in by the flow.
    #[serde(default)]
    pub task_id: String,
}

impl TaskResult {
    pub fn new(response: Option<String>, next_action: NextAction) -> Self {
        Self {
            response,
            next_action,
            status_message: None,
            task_id: String::new(),
        }
    }

    pub fn new_with_status(
        response: Option<String>,
        next_action: NextAction,
        status_message: Option<String>,
    ) -> Self {
        Self {
            response,
            next_action,
            status_message,
            task_id: String::new(),
        }
    }
}

/// Defines what should happen after a task completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NextAction {
    /// Advance to the next task along the edges, then wait for user input.
    Continue,
    /// Advance to the next task and execute it immediately, within the same turn.
    ContinueAndExecute,
    /// Jump to a specific task by id, then wait for user input.
    GoTo(String),
    /// Stay on the current task and wait for the next user input.
    /// This is the re-prompt mechanism for answers that failed validation.
    WaitForInput,
    /// End the flow.
    End,
}

/// Core trait implemented by every step of a dialogue flow.
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique identifier for this task within a flow. Defaults to the
    /// implementing type's name, which is also what `NextAction::GoTo`
    /// targets resolve against.
    fn id(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Execute the task against the shared session context.
    async fn run(&self, context: Context) -> Result<TaskResult>;
}
