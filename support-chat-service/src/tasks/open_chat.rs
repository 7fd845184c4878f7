use std::sync::Arc;

use async_trait::async_trait;
use dialogue_flow::{Context, MessageRole, NextAction, Result, Task, TaskResult};
use tracing::error;

use crate::completion::{CompletionClient, Lead, TurnMessage};
use crate::relay::UPSTREAM_ERROR_MESSAGE;
use crate::tasks::session_keys;

use super::TriageTask;

/// Open-ended conversation step: forwards the turn history and the new
/// utterance to the completion service (non-streamed) and records the reply.
/// Upstream failures become the generic apology, never a hard error.
pub struct OpenChatTask {
    completion: Arc<CompletionClient>,
}

impl OpenChatTask {
    pub fn new(completion: Arc<CompletionClient>) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl Task for OpenChatTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let input: String = context
            .get(session_keys::USER_INPUT)
            .await
            .unwrap_or_default();

        let history = context.get_all_messages().await;
        // The completion contract starts with a user turn; drop the synthetic
        // welcome (and any other leading assistant turns).
        let first_user = history
            .iter()
            .position(|m| m.role == MessageRole::User)
            .unwrap_or(history.len());
        let mut messages = TurnMessage::from_history(&history[first_user..]);
        messages.push(TurnMessage::user(input.clone()));

        let lead: Option<Lead> = context.get(session_keys::LEAD).await;

        context.add_user_message(input).await;

        let response = match self.completion.complete(&messages, lead.as_ref()).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "open chat completion failed");
                UPSTREAM_ERROR_MESSAGE.to_string()
            }
        };

        context.add_assistant_message(response.clone()).await;

        Ok(TaskResult::new(
            Some(response),
            NextAction::GoTo(std::any::type_name::<TriageTask>().to_string()),
        ))
    }
}
