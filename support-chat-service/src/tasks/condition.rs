use async_trait::async_trait;
use dialogue_flow::{Context, NextAction, Result, Task, TaskResult};

use crate::tasks::session_keys;
use crate::tasks::types::SurplusDeclaration;

const LOCATION_PROMPT: &str =
    "Dernière étape ! Où se trouve le matériau ? (ville ou adresse du chantier)";

const REPROMPT: &str = "Quel est l'état du matériau ? (neuf, bon état, à restaurer)";

/// Third guided step: the material condition, taken verbatim.
pub struct ConditionTask;

#[async_trait]
impl Task for ConditionTask {
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
        declaration.condition = Some(input);
        context.set(session_keys::DECLARATION, declaration).await;

        context.add_assistant_message(LOCATION_PROMPT).await;
        Ok(TaskResult::new(
            Some(LOCATION_PROMPT.to_string()),
            NextAction::Continue,
        ))
    }
}
