use async_trait::async_trait;
use dialogue_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::info;

use crate::impact::{self, ImpactEstimate};
use crate::tasks::session_keys;

use super::MaterialTypeTask;

const WELCOME: &str = "Bonjour ! Je suis Eco-Assist, votre assistant en économie circulaire \
                       pour le BTP. Comment puis-je vous aider aujourd'hui ?";

const SURPLUS_INTRO: &str = "Excellent choix pour la planète ! En déclarant vos surplus, vous \
                             contribuez activement à l'économie circulaire du BTP.\n\n\
                             Quel type de matériau souhaitez-vous déclarer ? \
                             (ex: béton, acier, bois, isolant, parpaings...)";

const NO_IMPACT_YET: &str = "Vous n'avez pas encore déclaré de surplus de matériaux. Commencez \
                             dès maintenant pour suivre votre impact positif sur l'environnement !\n\n\
                             Chaque kg de matériau réemployé, c'est du CO2 évité.";

const TRANSPORT_HELP: &str = "Je peux vous aider à trouver la solution logistique adaptée !\n\n\
                              Pour vous orienter, j'aurais besoin de quelques informations :\n\
                              - Poids et volume approximatifs\n\
                              - Adresse de départ et d'arrivée\n\
                              - Contraintes d'accès (hauteur, largeur, grue nécessaire ?)\n\n\
                              Décrivez-moi votre besoin et je vous proposerai des solutions adaptées.";

/// What the visitor is asking for, detected from folded free text. The
/// canned quick-reply utterances of the widget all land on their intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    DeclareSurplus,
    ImpactRecap,
    Transport,
    OpenChat,
}

fn detect_intent(input: &str) -> Intent {
    let folded = impact::fold_accents(input);
    if folded.contains("surplus") || folded.contains("declarer") {
        Intent::DeclareSurplus
    } else if folded.contains("impact") {
        Intent::ImpactRecap
    } else if folded.contains("transport") || folded.contains("livraison") {
        Intent::Transport
    } else {
        Intent::OpenChat
    }
}

fn impact_recap(impact: &ImpactEstimate) -> String {
    format!(
        "Voici le récapitulatif de votre contribution à l'économie circulaire :\n\n\
         - {} kg de matériaux réemployés\n\
         - {} kg de CO2 évités\n\
         - ≈ {} arbres/an\n\
         - ≈ {} km en voiture évités",
        impact.kg_saved.round() as i64,
        impact.co2_avoided_kg.round() as i64,
        impact::trees_per_year_equivalent(impact.co2_avoided_kg),
        impact::car_km_equivalent(impact.co2_avoided_kg),
    )
}

/// Entry point of every turn outside the guided flow: routes declare-surplus
/// intents into the state machine, answers impact and transport intents
/// directly, and hands anything else to the open-ended assistant.
pub struct TriageTask;

#[async_trait]
impl Task for TriageTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let input: String = context
            .get(session_keys::USER_INPUT)
            .await
            .unwrap_or_default();
        let input = input.trim().to_string();

        if input.is_empty() {
            context.add_assistant_message(WELCOME).await;
            return Ok(TaskResult::new(
                Some(WELCOME.to_string()),
                NextAction::WaitForInput,
            ));
        }

        let intent = detect_intent(&input);
        info!(intent = ?intent, "triaged user turn");

        match intent {
            Intent::DeclareSurplus => {
                context.add_user_message(input).await;
                context.add_assistant_message(SURPLUS_INTRO).await;
                Ok(TaskResult::new_with_status(
                    Some(SURPLUS_INTRO.to_string()),
                    NextAction::GoTo(std::any::type_name::<MaterialTypeTask>().to_string()),
                    Some("entering guided surplus declaration".to_string()),
                ))
            }
            Intent::ImpactRecap => {
                context.add_user_message(input).await;
                let impact: ImpactEstimate = context
                    .get(session_keys::IMPACT)
                    .await
                    .unwrap_or_default();
                let response = if impact.kg_saved > 0.0 {
                    impact_recap(&impact)
                } else {
                    NO_IMPACT_YET.to_string()
                };
                context.add_assistant_message(response.clone()).await;
                Ok(TaskResult::new(Some(response), NextAction::WaitForInput))
            }
            Intent::Transport => {
                context.add_user_message(input).await;
                context.add_assistant_message(TRANSPORT_HELP).await;
                Ok(TaskResult::new(
                    Some(TRANSPORT_HELP.to_string()),
                    NextAction::WaitForInput,
                ))
            }
            // Open conversation: follow the default edge into the assistant
            // task within the same turn.
            Intent::OpenChat => Ok(TaskResult::new(None, NextAction::ContinueAndExecute)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_reply_utterances_land_on_their_intent() {
        assert_eq!(
            detect_intent("Je voudrais déclarer un surplus de matériaux"),
            Intent::DeclareSurplus
        );
        assert_eq!(
            detect_intent("Je voudrais connaître mon impact environnemental"),
            Intent::ImpactRecap
        );
        assert_eq!(
            detect_intent("J'ai besoin d'aide pour le transport"),
            Intent::Transport
        );
    }

    #[test]
    fn free_text_defaults_to_open_chat() {
        assert_eq!(detect_intent("Avez-vous des tuiles anciennes ?"), Intent::OpenChat);
        assert_eq!(detect_intent("Bonjour"), Intent::OpenChat);
    }

    #[test]
    fn recap_carries_equivalence_figures() {
        let recap = impact_recap(&ImpactEstimate::new(500.0, 900.0));
        assert!(recap.contains("500 kg de matériaux"));
        assert!(recap.contains("900 kg de CO2"));
        assert!(recap.contains("7500 km"));
    }
}
