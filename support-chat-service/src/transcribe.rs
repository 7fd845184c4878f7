//! Audio-transcription proxy: decodes a base64 payload from the widget and
//! forwards it to a hosted Whisper-style speech-to-text endpoint.

use anyhow::Context as _;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::multipart;

use crate::config::TranscriptionConfig;

const TRANSCRIPTION_MODEL: &str = "whisper-1";
const LANGUAGE: &str = "fr";

/// File extension inferred from the data-URI MIME type, defaulting to webm
/// (the browser recorder's usual container).
pub fn audio_extension(payload: &str) -> &'static str {
    if payload.contains("audio/mp4") {
        "mp4"
    } else if payload.contains("audio/ogg") {
        "ogg"
    } else if payload.contains("audio/wav") {
        "wav"
    } else {
        "webm"
    }
}

/// Decode a data-URI-or-raw base64 audio payload into bytes.
pub fn decode_audio(payload: &str) -> anyhow::Result<Vec<u8>> {
    let data = match payload.split_once(',') {
        Some((_, data)) => data,
        None => payload,
    };
    BASE64.decode(data).context("invalid base64 audio payload")
}

pub struct TranscriptionClient {
    http: reqwest::Client,
    transcriptions_url: String,
    api_key: String,
}

impl TranscriptionClient {
    /// Returns `None` when no speech-to-text key is configured.
    pub fn from_config(config: &TranscriptionConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self {
            http: reqwest::Client::new(),
            transcriptions_url: format!(
                "{}/v1/audio/transcriptions",
                config.base_url.trim_end_matches('/')
            ),
            api_key,
        })
    }

    /// Forward the audio payload and return the plain transcribed text.
    pub async fn transcribe(&self, audio_payload: &str) -> anyhow::Result<String> {
        let ext = audio_extension(audio_payload);
        let bytes = decode_audio(audio_payload)?;

        let file = multipart::Part::bytes(bytes)
            .file_name(format!("audio.{ext}"))
            .mime_str(&format!("audio/{ext}"))
            .context("invalid audio mime type")?;

        let form = multipart::Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .text("language", LANGUAGE)
            .text("response_format", "text")
            .part("file", file);

        let response = self
            .http
            .post(&self.transcriptions_url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("transcription request failed")?
            .error_for_status()
            .context("transcription service rejected the request")?;

        let text = response
            .text()
            .await
            .context("invalid transcription response")?;
        Ok(text.trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn extension_is_inferred_from_mime_substring() {
        assert_eq!(audio_extension("data:audio/mp4;base64,AAAA"), "mp4");
        assert_eq!(audio_extension("data:audio/ogg;codecs=opus;base64,AAAA"), "ogg");
        assert_eq!(audio_extension("data:audio/wav;base64,AAAA"), "wav");
        assert_eq!(audio_extension("data:audio/webm;base64,AAAA"), "webm");
        assert_eq!(audio_extension("AAAA"), "webm");
    }

    #[test]
    fn data_uri_prefix_is_stripped_before_decoding() {
        let decoded = decode_audio("data:audio/webm;base64,aGVsbG8=").unwrap();
        assert_eq!(decoded, b"hello");

        let raw = decode_audio("aGVsbG8=").unwrap();
        assert_eq!(raw, b"hello");
    }

    #[test]
    fn garbage_payload_is_an_error() {
        assert!(decode_audio("data:audio/webm;base64,%%%").is_err());
    }

    fn client_for(base_url: &str) -> TranscriptionClient {
        TranscriptionClient::from_config(&crate::config::TranscriptionConfig {
            api_key: Some("sk-test".to_string()),
            base_url: base_url.to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn transcription_returns_plain_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Bonjour le chantier\n"))
            .mount(&server)
            .await;

        let text = client_for(&server.uri())
            .transcribe("data:audio/webm;base64,aGVsbG8=")
            .await
            .unwrap();
        assert_eq!(text, "Bonjour le chantier");
    }

    #[tokio::test]
    async fn upstream_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client_for(&server.uri())
            .transcribe("data:audio/webm;base64,aGVsbG8=")
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn missing_api_key_disables_the_client() {
        let client = TranscriptionClient::from_config(&crate::config::TranscriptionConfig {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
        });
        assert!(client.is_none());
    }
}
