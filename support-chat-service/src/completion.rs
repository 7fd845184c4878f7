//! Client for the hosted chat-completion service (Anthropic-style messages
//! API). Supports a single-shot completion and an incremental text-delta
//! stream; both take the full turn history plus an optional captured lead.

use anyhow::Context as _;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use dialogue_flow::{ChatMessage, MessageRole};

use crate::config::CompletionConfig;
use crate::sse::{EventStreamBuffer, tagged_payloads};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

/// Visitor identity captured once per session from the lead form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub name: String,
    pub email: String,
}

/// One `{role, content}` pair of the wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: String,
    pub content: String,
}

impl TurnMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Map a session chat history onto wire messages. System turns are not
    /// part of the contract and are skipped.
    pub fn from_history(history: &[ChatMessage]) -> Vec<Self> {
        history
            .iter()
            .filter_map(|m| {
                let role = match m.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                    MessageRole::System => return None,
                };
                Some(Self {
                    role: role.to_string(),
                    content: m.content.clone(),
                })
            })
            .collect()
    }
}

/// Incremental events produced by a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionEvent {
    TextDelta(String),
    Done,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    messages: &'a [TurnMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

#[derive(Deserialize)]
struct DeltaEvent {
    delta: Delta,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Delta {
    #[serde(rename = "text_delta")]
    Text { text: String },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct UpstreamError {
    error: UpstreamErrorDetail,
}

#[derive(Deserialize)]
struct UpstreamErrorDetail {
    message: String,
}

pub struct CompletionClient {
    http: reqwest::Client,
    messages_url: String,
    api_key: String,
    model: String,
    policy_text: String,
}

impl CompletionClient {
    pub fn new(config: &CompletionConfig, policy_text: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            messages_url: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            policy_text,
        }
    }

    /// The behavioural preamble, extended with the lead's identity and a
    /// personalization instruction when a lead has been captured.
    fn system_preamble(&self, lead: Option<&Lead>) -> String {
        match lead {
            Some(lead) => format!(
                "{}\n\n## Informations sur l'utilisateur actuel\n- Nom : {}\n- Email : {}\nPersonnalise subtilement tes réponses en utilisant son prénom.",
                self.policy_text, lead.name, lead.email
            ),
            None => self.policy_text.clone(),
        }
    }

    async fn send(
        &self,
        messages: &[TurnMessage],
        lead: Option<&Lead>,
        stream: bool,
    ) -> anyhow::Result<reqwest::Response> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: self.system_preamble(lead),
            messages,
            stream: stream.then_some(true),
        };

        let response = self
            .http
            .post(&self.messages_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .context("completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<UpstreamError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            anyhow::bail!("completion service returned {status}: {detail}");
        }
        Ok(response)
    }

    /// Single non-streamed completion. Returns the first text content block,
    /// or an empty string when the service returns no text block.
    pub async fn complete(
        &self,
        messages: &[TurnMessage],
        lead: Option<&Lead>,
    ) -> anyhow::Result<String> {
        let response = self.send(messages, lead, false).await?;
        let parsed: MessagesResponse = response
            .json()
            .await
            .context("invalid completion response body")?;

        let text = parsed
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Unsupported => None,
            })
            .unwrap_or_default();
        Ok(text)
    }

    /// Open a streamed completion and decode it into [`CompletionEvent`]s,
    /// in arrival order. Malformed event payloads are skipped; an upstream
    /// error event terminates the stream with an `Err` item.
    pub async fn stream(
        &self,
        messages: &[TurnMessage],
        lead: Option<&Lead>,
    ) -> anyhow::Result<impl Stream<Item = anyhow::Result<CompletionEvent>> + Send + use<>> {
        let response = self.send(messages, lead, true).await?;
        let mut bytes = response.bytes_stream();

        Ok(async_stream::try_stream! {
            let mut buffer = EventStreamBuffer::new();

            'read: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.context("completion stream interrupted")?;
                buffer.extend(&chunk);

                while let Some(block) = buffer.next_block() {
                    for (event, data) in tagged_payloads(&block) {
                        match event {
                            "content_block_delta" => {
                                // Skip payloads that fail to parse rather than
                                // aborting the whole stream.
                                if let Ok(DeltaEvent { delta: Delta::Text { text } }) =
                                    serde_json::from_str::<DeltaEvent>(data)
                                {
                                    yield CompletionEvent::TextDelta(text);
                                }
                            }
                            "message_stop" => {
                                yield CompletionEvent::Done;
                                break 'read;
                            }
                            "error" => {
                                let detail = serde_json::from_str::<UpstreamError>(data)
                                    .map(|e| e.error.message)
                                    .unwrap_or_else(|_| data.to_string());
                                Err(anyhow::anyhow!("completion stream error: {detail}"))?;
                            }
                            _ => {}
                        }
                    }
                }
            }
        })
    }
}
