use dashmap::DashMap;
use std::sync::{Arc, Mutex};

use crate::{
    context::Context,
    error::{FlowError, Result},
    session::Session,
    task::{NextAction, Task, TaskResult},
};

/// Condition attached to an edge, evaluated against the session context.
pub type EdgeCondition = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub condition: Option<EdgeCondition>,
}

/// A flow of dialogue tasks connected by edges.
///
/// A flow executes exactly one task per user turn through
/// [`Flow::execute_session`]; the session records which task is current, so
/// `WaitForInput` re-prompts land back on the same task on the next turn.
pub struct Flow {
    pub id: String,
    tasks: DashMap<String, Arc<dyn Task>>,
    edges: Mutex<Vec<Edge>>,
    start_task_id: Mutex<Option<String>>,
}

impl Flow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: DashMap::new(),
            edges: Mutex::new(Vec::new()),
            start_task_id: Mutex::new(None),
        }
    }

    pub fn add_task(&self, task: Arc<dyn Task>) -> &Self {
        let task_id = task.id().to_string();
        let is_first = self.tasks.is_empty();
        self.tasks.insert(task_id.clone(), task);
        if is_first {
            *self.start_task_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(task_id);
        }
        self
    }

    pub fn add_edge(&self, from: impl Into<String>, to: impl Into<String>) -> &Self {
        self.push_edge(from.into(), to.into(), None);
        self
    }

    pub fn add_conditional_edge<F>(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: F,
    ) -> &Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.push_edge(from.into(), to.into(), Some(Arc::new(condition)));
        self
    }

    fn push_edge(&self, from: String, to: String, condition: Option<EdgeCondition>) {
        self.edges
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Edge {
                from,
                to,
                condition,
            });
    }

    /// Execute the current task of the session and advance the session state
    /// according to the task's [`NextAction`].
    pub async fn execute_session(&self, session: &mut Session) -> Result<ExecutionResult> {
        let result = self
            .run_task(&session.current_task_id, session.context.clone())
            .await?;

        session.status_message = result.status_message.clone();

        match &result.next_action {
            NextAction::Continue => {
                if let Some(next) = self.next_task(&result.task_id, &session.context) {
                    session.current_task_id = next;
                }
                Ok(ExecutionResult::waiting(result.response))
            }
            NextAction::ContinueAndExecute => {
                match self.next_task(&result.task_id, &session.context) {
                    Some(next) => {
                        session.current_task_id = next;
                        // Recurse so the next task runs within the same turn
                        // against the same live context.
                        Box::pin(self.execute_session(session)).await
                    }
                    None => Ok(ExecutionResult::waiting(result.response)),
                }
            }
            NextAction::GoTo(target) => {
                if !self.tasks.contains_key(target) {
                    return Err(FlowError::TaskNotFound(target.clone()));
                }
                session.current_task_id = target.clone();
                Ok(ExecutionResult::waiting(result.response))
            }
            NextAction::WaitForInput => Ok(ExecutionResult::waiting(result.response)),
            NextAction::End => Ok(ExecutionResult {
                response: result.response,
                status: ExecutionStatus::Completed,
            }),
        }
    }

    async fn run_task(&self, task_id: &str, context: Context) -> Result<TaskResult> {
        let task = self
            .tasks
            .get(task_id)
            .ok_or_else(|| FlowError::TaskNotFound(task_id.to_string()))?;

        let mut result = task.run(context).await?;
        result.task_id = task_id.to_string();
        Ok(result)
    }

    /// Find the next task following the edges out of `current_task_id`.
    /// Conditional edges win when their condition holds; the first
    /// unconditional edge is the default.
    pub fn next_task(&self, current_task_id: &str, context: &Context) -> Option<String> {
        let edges = self.edges.lock().unwrap_or_else(|e| e.into_inner());
        for edge in edges.iter().filter(|e| e.from == current_task_id) {
            match &edge.condition {
                Some(condition) if condition(context) => return Some(edge.to.clone()),
                Some(_) => continue,
                None => return Some(edge.to.clone()),
            }
        }
        None
    }

    pub fn start_task_id(&self) -> Option<String> {
        self.start_task_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn get_task(&self, task_id: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(task_id).map(|entry| entry.clone())
    }
}

/// Builder for assembling a [`Flow`].
pub struct FlowBuilder {
    flow: Flow,
}

impl FlowBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            flow: Flow::new(id),
        }
    }

    pub fn add_task(self, task: Arc<dyn Task>) -> Self {
        self.flow.add_task(task);
        self
    }

    pub fn add_edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.flow.add_edge(from, to);
        self
    }

    pub fn add_conditional_edge<F>(
        self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: F,
    ) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.flow.add_conditional_edge(from, to, condition);
        self
    }

    pub fn set_start_task(self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if self.flow.tasks.contains_key(&task_id) {
            *self
                .flow
                .start_task_id
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = Some(task_id);
        }
        self
    }

    pub fn build(self) -> Flow {
        self.flow
    }
}

/// Outcome of one `execute_session` step.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub response: Option<String>,
    pub status: ExecutionStatus,
}

impl ExecutionResult {
    fn waiting(response: Option<String>) -> Self {
        Self {
            response,
            status: ExecutionStatus::WaitingForInput,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Waiting for the next user input.
    WaitingForInput,
    /// Flow reached a terminal task.
    Completed,
}
