use std::sync::LazyLock;

use async_trait::async_trait;
use dialogue_flow::{Context, NextAction, Result, Task, TaskResult};
use regex::Regex;
use tracing::info;

use crate::tasks::session_keys;
use crate::tasks::types::SurplusDeclaration;

const CONDITION_PROMPT: &str = "Super ! Quel est l'état du matériau ? (neuf, bon état, à restaurer)";

const REPROMPT: &str = "Je n'ai pas bien compris la quantité. Pouvez-vous préciser ? \
                        (ex: 500 kg, 2 tonnes)";

static QUANTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+(?:[.,]\d+)?)\s*(kg|kilo|tonnes?|t)?")
        .expect("quantity pattern is valid")
});

/// Parse a quantity answer into kilograms.
///
/// Comma is accepted as decimal separator; a unit token starting with `t`
/// means tonnes (×1000); no unit means kilograms.
pub fn parse_quantity_kg(input: &str) -> Option<f64> {
    let captures = QUANTITY_PATTERN.captures(input)?;
    let magnitude: f64 = captures.get(1)?.as_str().replace(',', ".").parse().ok()?;
    let tonnes = captures
        .get(2)
        .is_some_and(|unit| unit.as_str().to_lowercase().starts_with('t'));
    Some(if tonnes { magnitude * 1000.0 } else { magnitude })
}

/// Second guided step: the only step with validation. A malformed answer
/// re-prompts without advancing; the flow never hard-fails on it.
pub struct QuantityTask;

#[async_trait]
impl Task for QuantityTask {
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

        let Some(quantity_kg) = parse_quantity_kg(&input) else {
            context.add_assistant_message(REPROMPT).await;
            return Ok(TaskResult::new_with_status(
                Some(REPROMPT.to_string()),
                NextAction::WaitForInput,
                Some("quantity not understood, re-prompting".to_string()),
            ));
        };

        let mut declaration: SurplusDeclaration = context
            .get(session_keys::DECLARATION)
            .await
            .unwrap_or_default();
        declaration.quantity_kg = Some(quantity_kg);
        context.set(session_keys::DECLARATION, declaration).await;

        info!(quantity_kg, "quantity recorded");

        context.add_assistant_message(CONDITION_PROMPT).await;
        Ok(TaskResult::new(
            Some(CONDITION_PROMPT.to_string()),
            NextAction::Continue,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_normalization_is_consistent() {
        // "2 tonnes" and "2000 kg" are the same declared quantity.
        assert_eq!(parse_quantity_kg("2 tonnes"), Some(2000.0));
        assert_eq!(parse_quantity_kg("2000 kg"), Some(2000.0));
    }

    #[test]
    fn all_unit_spellings_are_accepted() {
        assert_eq!(parse_quantity_kg("500 kg"), Some(500.0));
        assert_eq!(parse_quantity_kg("500 kilo"), Some(500.0));
        assert_eq!(parse_quantity_kg("3 t"), Some(3000.0));
        assert_eq!(parse_quantity_kg("1 tonne"), Some(1000.0));
        assert_eq!(parse_quantity_kg("2 TONNES"), Some(2000.0));
    }

    #[test]
    fn missing_unit_defaults_to_kilograms() {
        assert_eq!(parse_quantity_kg("750"), Some(750.0));
    }

    #[test]
    fn comma_is_a_decimal_separator() {
        assert_eq!(parse_quantity_kg("2,5 tonnes"), Some(2500.0));
        assert_eq!(parse_quantity_kg("0.5 t"), Some(500.0));
    }

    #[test]
    fn leading_whitespace_is_tolerated() {
        assert_eq!(parse_quantity_kg("  500 kg"), Some(500.0));
    }

    #[test]
    fn malformed_answers_are_rejected() {
        assert_eq!(parse_quantity_kg("beaucoup"), None);
        assert_eq!(parse_quantity_kg(""), None);
        assert_eq!(parse_quantity_kg("environ cinq tonnes"), None);
    }
}
