use async_trait::async_trait;
use dialogue_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::info;

use crate::tasks::session_keys;
use crate::tasks::types::SurplusDeclaration;

const QUANTITY_PROMPT_FMT: &str = "Parfait, {material} ! Quelle quantité avez-vous à déclarer ? \
                                   (en kg ou tonnes, par exemple \"500 kg\" ou \"2 tonnes\")";

const REPROMPT: &str = "Quel type de matériau souhaitez-vous déclarer ? \
                        (ex: béton, acier, bois, isolant, parpaings...)";

/// First guided step: any non-empty answer is taken verbatim as the material
/// name.
pub struct MaterialTypeTask;

#[async_trait]
impl Task for MaterialTypeTask {
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
        declaration.material_type = Some(input.clone());
        context.set(session_keys::DECLARATION, declaration).await;

        info!(material = %input, "material type recorded");

        let response = QUANTITY_PROMPT_FMT.replace("{material}", &input);
        context.add_assistant_message(response.clone()).await;

        Ok(TaskResult::new(Some(response), NextAction::Continue))
    }
}
