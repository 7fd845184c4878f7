//! Environment-driven service configuration.
//!
//! The behavioural preamble ("policy text") is data, not code: it is loaded
//! from `POLICY_TEXT_PATH` when set, falling back to the default French
//! preamble shipped with the service.

use anyhow::Context as _;
use tracing::info;

use crate::impact::ImpactEstimate;

const DEFAULT_POLICY_TEXT: &str = include_str!("../policy/system_fr.md");
const DEFAULT_NOTIFY_RECIPIENT: &str = "contact.eco.btp.deal@gmail.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub completion: CompletionConfig,
    pub transcription: TranscriptionConfig,
    pub notifier: NotifierConfig,
    pub checkout: CheckoutConfig,
    pub policy_text: String,
    /// Historical totals the per-session impact accumulator starts from.
    pub impact_seed: ImpactEstimate,
}

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Transcription is optional; without a key the endpoint reports the
    /// feature as unavailable.
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Without a key, leads are logged instead of emailed.
    pub api_key: Option<String>,
    pub recipient: String,
    pub base_url: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckoutConfig {
    pub publishable_key: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let completion = CompletionConfig {
            api_key: std::env::var("ANTHROPIC_API_KEY")
                .context("ANTHROPIC_API_KEY not set")?,
            model: env_or("COMPLETION_MODEL", "claude-sonnet-4-5-20250929"),
            base_url: env_or("COMPLETION_BASE_URL", "https://api.anthropic.com"),
        };

        let transcription = TranscriptionConfig {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: env_or("TRANSCRIPTION_BASE_URL", "https://api.openai.com"),
        };

        let notifier = NotifierConfig {
            api_key: std::env::var("RESEND_API_KEY").ok(),
            recipient: env_or("NOTIFY_EMAIL", DEFAULT_NOTIFY_RECIPIENT),
            base_url: env_or("NOTIFY_BASE_URL", "https://api.resend.com"),
        };

        let checkout = CheckoutConfig {
            publishable_key: env_or("STRIPE_PUBLISHABLE_KEY", ""),
            price_id: env_or("STRIPE_PRICE_ID", ""),
            success_url: env_or("CHECKOUT_SUCCESS_URL", "/?payment=success"),
            cancel_url: env_or("CHECKOUT_CANCEL_URL", "/?payment=cancelled"),
        };

        let policy_text = match std::env::var("POLICY_TEXT_PATH") {
            Ok(path) => {
                info!(path = %path, "loading policy text");
                std::fs::read_to_string(&path)
                    .with_context(|| format!("cannot read policy text at {path}"))?
            }
            Err(_) => DEFAULT_POLICY_TEXT.to_string(),
        };

        let impact_seed = ImpactEstimate::new(
            env_f64_or("IMPACT_SEED_KG_SAVED", 0.0),
            env_f64_or("IMPACT_SEED_CO2_KG", 0.0),
        );

        Ok(Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),
            completion,
            transcription,
            notifier,
            checkout,
            policy_text,
            impact_seed,
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f64_or(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
