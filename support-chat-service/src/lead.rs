//! Best-effort lead notification.
//!
//! When a visitor leaves their contact details, a notification email is sent
//! through a hosted relay. Delivery is fire-and-forget: failures are logged
//! and swallowed, never retried, and never visible in the conversation.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::completion::TurnMessage;
use crate::config::NotifierConfig;

/// Body of `POST /api/lead`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LeadNotification {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub messages: Vec<TurnMessage>,
}

pub struct LeadNotifier {
    http: reqwest::Client,
    emails_url: String,
    api_key: Option<String>,
    recipient: String,
}

impl LeadNotifier {
    pub fn new(config: &NotifierConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            emails_url: format!("{}/emails", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            recipient: config.recipient.clone(),
        }
    }

    /// Render the notification subject and body from the lead and transcript.
    pub fn format_notification(lead: &LeadNotification) -> (String, String) {
        let conversation = if lead.messages.is_empty() {
            "Aucun message échangé.".to_string()
        } else {
            lead.messages
                .iter()
                .map(|m| {
                    let speaker = if m.role == "user" { "Client" } else { "Assistant" };
                    format!("{speaker}: {}", m.content)
                })
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let timestamp = chrono::Utc::now().format("%d/%m/%Y %H:%M UTC");
        let subject = format!("Nouveau lead Eco-BTP Deal : {}", lead.name);
        let body = format!(
            "Nouveau contact depuis le chatbot Eco-BTP Deal\n\n\
             Date : {timestamp}\n\
             Nom : {}\n\
             Email : {}\n\n\
             --- Conversation ---\n{conversation}",
            lead.name, lead.email
        );
        (subject, body)
    }

    /// Attempt the notification once. Always returns: any failure is logged
    /// server-side and otherwise invisible.
    pub async fn notify(&self, lead: &LeadNotification) {
        let Some(api_key) = &self.api_key else {
            // No relay configured: the lead is still visible in the logs.
            info!(
                name = %lead.name,
                email = %lead.email,
                messages = lead.messages.len(),
                "new lead (no notification relay configured)"
            );
            return;
        };

        let (subject, body) = Self::format_notification(lead);
        let request = json!({
            "from": "Eco-BTP Deal <onboarding@resend.dev>",
            "to": [self.recipient],
            "subject": subject,
            "text": body,
        });

        let result = self
            .http
            .post(&self.emails_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(_) => info!(name = %lead.name, "lead notification sent"),
            Err(e) => error!(error = %e, "lead notification failed, dropping it"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lead_with_transcript() -> LeadNotification {
        LeadNotification {
            name: "Camille Durand".to_string(),
            email: "camille@example.fr".to_string(),
            messages: vec![
                TurnMessage::user("Bonjour, avez-vous des tuiles ?"),
                TurnMessage {
                    role: "assistant".to_string(),
                    content: "Oui, consultez notre catalogue !".to_string(),
                },
            ],
        }
    }

    fn notifier_for(base_url: &str, api_key: Option<&str>) -> LeadNotifier {
        LeadNotifier::new(&crate::config::NotifierConfig {
            api_key: api_key.map(String::from),
            recipient: "contact.eco.btp.deal@gmail.com".to_string(),
            base_url: base_url.to_string(),
        })
    }

    #[test]
    fn notification_body_carries_lead_and_transcript() {
        let (subject, body) = LeadNotifier::format_notification(&lead_with_transcript());

        assert_eq!(subject, "Nouveau lead Eco-BTP Deal : Camille Durand");
        assert!(body.contains("Nom : Camille Durand"));
        assert!(body.contains("Email : camille@example.fr"));
        assert!(body.contains("Client: Bonjour, avez-vous des tuiles ?"));
        assert!(body.contains("Assistant: Oui, consultez notre catalogue !"));
    }

    #[test]
    fn empty_transcript_is_noted() {
        let mut lead = lead_with_transcript();
        lead.messages.clear();
        let (_, body) = LeadNotifier::format_notification(&lead);
        assert!(body.contains("Aucun message échangé."));
    }

    #[tokio::test]
    async fn relay_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        // Must complete without panicking or surfacing anything.
        notifier_for(&server.uri(), Some("re_test"))
            .notify(&lead_with_transcript())
            .await;
    }

    #[tokio::test]
    async fn unreachable_relay_is_swallowed() {
        notifier_for("http://127.0.0.1:9", Some("re_test"))
            .notify(&lead_with_transcript())
            .await;
    }

    #[tokio::test]
    async fn missing_api_key_logs_instead_of_sending() {
        let server = MockServer::start().await;
        // No mock mounted: any request would 404 and fail the expectation below.
        notifier_for(&server.uri(), None)
            .notify(&lead_with_transcript())
            .await;
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
