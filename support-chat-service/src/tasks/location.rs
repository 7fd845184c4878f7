use async_trait::async_trait;
use dialogue_flow::{Context, NextAction, Result, Task, TaskResult};

use crate::tasks::session_keys;
use crate::tasks::types::SurplusDeclaration;

const REPROMPT: &str = "Où se trouve le matériau ? (ville ou adresse du chantier)";

/// Last interactive guided step. A non-empty answer completes the working
/// record and flows straight into the summary within the same turn.
pub struct LocationTask;

#[async_trait]
impl Task for LocationTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let input: String = context
            .get(session_keys::USER_INPUT)
            .await
            .unwrap_or_default();
        let input = input.trim().to_string();

        if input.is_empty() {
            context.add_assistant_message(REPROMPT).await;
            return Ok(TaskResult::new(
                Some(REPROMPT.to_string()),
                NextAction::WaitForInput,
            ));
        }

        context.add_user_message(input.clone()).await;

        let mut declaration: SurplusDeclaration = context
            .get(session_keys::DECLARATION)
            .await
            .unwrap_or_default();
        declaration.location = Some(input);
        context.set(session_keys::DECLARATION, declaration).await;

        Ok(TaskResult::new(None, NextAction::ContinueAndExecute))
    }
}
