//! `FlowRunner` wraps the load → execute → save round of an interactive
//! service: one task step per call, with the session persisted for the next
//! turn. Use [`Flow::execute_session`] directly when you need to batch steps
//! or inspect the session between executing and saving.

use std::sync::Arc;

use tracing::warn;

use crate::{
    error::{FlowError, Result},
    flow::{ExecutionResult, Flow},
    session::SessionStorage,
};

#[derive(Clone)]
pub struct FlowRunner {
    flow: Arc<Flow>,
    storage: Arc<dyn SessionStorage>,
}

impl FlowRunner {
    pub fn new(flow: Arc<Flow>, storage: Arc<dyn SessionStorage>) -> Self {
        Self { flow, storage }
    }

    /// Execute exactly one task for `session_id` and persist the session.
    ///
    /// Persistence is best-effort: a failed save is logged and the result
    /// still goes out, so a flaky store degrades the feature instead of the
    /// conversation. A missing session is [`FlowError::SessionNotFound`].
    pub async fn run(&self, session_id: &str) -> Result<ExecutionResult> {
        let mut session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))?;

        let result = self.flow.execute_session(&mut session).await?;

        if let Err(e) = self.storage.save(session).await {
            warn!(session_id = %session_id, error = %e, "failed to persist session");
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::Context,
        flow::{ExecutionStatus, FlowBuilder},
        session::{InMemorySessionStorage, Session},
        task::{NextAction, Task, TaskResult},
    };
    use async_trait::async_trait;

    struct GreetTask;

    #[async_trait]
    impl Task for GreetTask {
        fn id(&self) -> &str {
            "greet"
        }

        async fn run(&self, _context: Context) -> Result<TaskResult> {
            Ok(TaskResult::new(
                Some("bonjour".to_string()),
                NextAction::WaitForInput,
            ))
        }
    }

    fn runner_with(storage: Arc<dyn SessionStorage>) -> FlowRunner {
        let flow = Arc::new(FlowBuilder::new("test").add_task(Arc::new(GreetTask)).build());
        FlowRunner::new(flow, storage)
    }

    #[tokio::test]
    async fn runs_one_step_and_persists() {
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        storage
            .save(Session::new_from_task("s1".to_string(), "greet"))
            .await
            .unwrap();

        let result = runner_with(storage.clone()).run("s1").await.unwrap();

        assert_eq!(result.status, ExecutionStatus::WaitingForInput);
        assert_eq!(result.response.as_deref(), Some("bonjour"));
        assert!(storage.get("s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_session_is_session_not_found() {
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        let err = runner_with(storage).run("missing").await.unwrap_err();
        assert!(matches!(err, FlowError::SessionNotFound(id) if id == "missing"));
    }

    /// Storage whose saves always fail; reads delegate to an inner store.
    struct FlakyStorage {
        inner: InMemorySessionStorage,
    }

    #[async_trait]
    impl SessionStorage for FlakyStorage {
        async fn save(&self, _session: Session) -> Result<()> {
            Err(FlowError::StorageError("disk full".to_string()))
        }

        async fn get(&self, id: &str) -> Result<Option<Session>> {
            self.inner.get(id).await
        }

        async fn delete(&self, id: &str) -> Result<()> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn failed_save_does_not_fail_the_turn() {
        let inner = InMemorySessionStorage::new();
        inner
            .save(Session::new_from_task("s1".to_string(), "greet"))
            .await
            .unwrap();
        let storage: Arc<dyn SessionStorage> = Arc::new(FlakyStorage { inner });

        let result = runner_with(storage).run("s1").await.unwrap();
        assert_eq!(result.response.as_deref(), Some("bonjour"));
    }
}
