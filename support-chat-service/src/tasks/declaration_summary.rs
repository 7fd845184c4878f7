use async_trait::async_trait;
use dialogue_flow::{Context, FlowError, NextAction, Result, Task, TaskResult};
use tracing::info;

use crate::impact::{self, ImpactEstimate};
use crate::tasks::session_keys;
use crate::tasks::types::SurplusDeclaration;

use super::TriageTask;

fn format_kg(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Terminal step of the guided flow: derives the CO2 estimate, folds it into
/// the session's running impact total, emits the summary, and hands the
/// session back to open conversation. No network calls happen here.
pub struct DeclarationSummaryTask;

#[async_trait]
impl Task for DeclarationSummaryTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let declaration: SurplusDeclaration = context
            .get(session_keys::DECLARATION)
            .await
            .ok_or_else(|| FlowError::ContextError("surplus_declaration not found".to_string()))?;

        let material = declaration.material_type.as_deref().unwrap_or("matériau");
        let quantity_kg = declaration.quantity_kg.unwrap_or(0.0);
        let condition = declaration.condition.as_deref().unwrap_or("non précisé");
        let location = declaration.location.as_deref().unwrap_or("non précisée");

        let co2_kg = impact::co2_avoided_kg(material, quantity_kg);

        let mut estimate: ImpactEstimate = context
            .get(session_keys::IMPACT)
            .await
            .unwrap_or_default();
        estimate.record(quantity_kg, co2_kg);
        context.set(session_keys::IMPACT, estimate).await;

        info!(
            material = %material,
            quantity_kg,
            co2_kg,
            "surplus declaration completed"
        );

        let summary = format!(
            "Excellent choix pour la planète ! Votre déclaration est enregistrée :\n\n\
             - Matériau : {material}\n\
             - Quantité : {} kg\n\
             - État : {condition}\n\
             - Localisation : {location}\n\n\
             Impact estimé : {} kg de CO2 évités ! C'est l'équivalent de {} km en voiture.",
            format_kg(quantity_kg),
            co2_kg.round() as i64,
            impact::car_km_equivalent(co2_kg),
        );
        context.add_assistant_message(summary.clone()).await;

        // The working record is not retained; only the running total survives.
        context.remove(session_keys::DECLARATION).await;

        let status_message = format!(
            "declaration recorded: {} kg of {material}, {co2_kg} kg CO2 avoided",
            format_kg(quantity_kg)
        );

        Ok(TaskResult::new_with_status(
            Some(summary),
            NextAction::GoTo(std::any::type_name::<TriageTask>().to_string()),
            Some(status_message),
        ))
    }
}
