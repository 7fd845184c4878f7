pub mod context;
pub mod error;
pub mod flow;
pub mod runner;
pub mod session;
pub mod task;

// Re-export commonly used types
pub use context::{ChatMessage, Context, MessageRole};
pub use error::{FlowError, Result};
pub use flow::{ExecutionResult, ExecutionStatus, Flow, FlowBuilder};
pub use runner::FlowRunner;
pub use session::{InMemorySessionStorage, Session, SessionStorage};
pub use task::{NextAction, Task, TaskResult};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoTask;

    #[async_trait]
    impl Task for EchoTask {
        fn id(&self) -> &str {
            "echo"
        }

        async fn run(&self, context: Context) -> Result<TaskResult> {
            let input: String = context.get("input").await.unwrap_or_default();
            context.add_user_message(input.clone()).await;
            context.add_assistant_message(format!("echo: {input}")).await;

            Ok(TaskResult::new(
                Some(format!("echo: {input}")),
                NextAction::End,
            ))
        }
    }

    struct RepromptTask;

    #[async_trait]
    impl Task for RepromptTask {
        fn id(&self) -> &str {
            "reprompt"
        }

        async fn run(&self, _context: Context) -> Result<TaskResult> {
            Ok(TaskResult::new(
                Some("say that again?".to_string()),
                NextAction::WaitForInput,
            ))
        }
    }

    #[tokio::test]
    async fn single_task_flow_completes() {
        let flow = FlowBuilder::new("test").add_task(Arc::new(EchoTask)).build();

        let mut session = Session::new_from_task("s1".to_string(), "echo");
        session.context.set("input", "Bonjour").await;

        let result = flow.execute_session(&mut session).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.response.as_deref(), Some("echo: Bonjour"));
        assert_eq!(session.context.message_count().await, 2);
    }

    #[tokio::test]
    async fn wait_for_input_keeps_session_on_same_task() {
        let flow = FlowBuilder::new("test")
            .add_task(Arc::new(RepromptTask))
            .add_task(Arc::new(EchoTask))
            .add_edge("reprompt", "echo")
            .build();

        let mut session = Session::new_from_task("s1".to_string(), "reprompt");
        let result = flow.execute_session(&mut session).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::WaitingForInput);
        assert_eq!(session.current_task_id, "reprompt");
    }

    #[tokio::test]
    async fn conditional_edge_routes_on_context() {
        struct RouterTask;

        #[async_trait]
        impl Task for RouterTask {
            fn id(&self) -> &str {
                "router"
            }

            async fn run(&self, _context: Context) -> Result<TaskResult> {
                Ok(TaskResult::new(None, NextAction::ContinueAndExecute))
            }
        }

        let flow = FlowBuilder::new("test")
            .add_task(Arc::new(RouterTask))
            .add_task(Arc::new(EchoTask))
            .add_conditional_edge("router", "echo", |ctx| {
                ctx.get_sync::<String>("route").as_deref() == Some("echo")
            })
            .build();

        let mut session = Session::new_from_task("s1".to_string(), "router");
        session.context.set("route", "echo").await;
        session.context.set("input", "hi").await;

        let result = flow.execute_session(&mut session).await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(session.current_task_id, "echo");
    }

    #[tokio::test]
    async fn session_storage_round_trip() {
        let storage = InMemorySessionStorage::new();
        let session = Session::new_from_task("s1".to_string(), "echo");

        storage.save(session).await.unwrap();
        assert!(storage.get("s1").await.unwrap().is_some());

        storage.delete("s1").await.unwrap();
        assert!(storage.get("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn streamed_assistant_turn_is_extended_in_place() {
        let context = Context::new();
        context.add_user_message("Salut").await;
        context.extend_last_assistant_message("Bon").await;
        context.extend_last_assistant_message("jour").await;

        let messages = context.get_all_messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Bonjour");
        assert_eq!(messages[1].role, MessageRole::Assistant);
    }
}
