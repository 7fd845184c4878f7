mod checkout;
mod completion;
mod config;
mod impact;
mod lead;
mod relay;
mod sse;
mod tasks;
mod transcribe;
mod transcript;

use std::any::type_name;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, RawQuery, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::{IntoResponse, Json, Response, sse::Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use dialogue_flow::{
    ChatMessage, FlowError, FlowRunner, InMemorySessionStorage, Session, SessionStorage,
};

use crate::completion::{CompletionClient, Lead, TurnMessage};
use crate::config::{CheckoutConfig, Config};
use crate::impact::ImpactEstimate;
use crate::lead::{LeadNotification, LeadNotifier};
use crate::tasks::{TriageTask, session_keys};
use crate::transcribe::TranscriptionClient;

#[derive(Clone)]
struct AppState {
    runner: FlowRunner,
    sessions: Arc<dyn SessionStorage>,
    completion: Arc<CompletionClient>,
    notifier: Arc<LeadNotifier>,
    transcriber: Option<Arc<TranscriptionClient>>,
    checkout: CheckoutConfig,
    impact_seed: ImpactEstimate,
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    session_id: Option<String>,
    content: String,
    lead: Option<Lead>,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    session_id: String,
    response: Option<String>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Vec<TurnMessage>,
    lead: Option<Lead>,
    #[serde(default = "default_stream")]
    stream: bool,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct TranscribeRequest {
    #[serde(default)]
    audio: String,
}

/// Initialize structured tracing based on environment variables.
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "support_chat_service=debug,dialogue_flow=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

/// Middleware that tags every request with a correlation id.
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    request.headers_mut().insert(
        "x-correlation-id",
        HeaderValue::from_str(&correlation_id).expect("uuid is a valid header value"),
    );

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let completion = Arc::new(CompletionClient::new(
        &config.completion,
        config.policy_text.clone(),
    ));
    let flow = Arc::new(tasks::build_support_flow(completion.clone()));
    let sessions: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
    let runner = FlowRunner::new(flow, sessions.clone());
    let notifier = Arc::new(LeadNotifier::new(&config.notifier));
    let transcriber = TranscriptionClient::from_config(&config.transcription).map(Arc::new);
    if transcriber.is_none() {
        info!("no speech-to-text key configured, transcription disabled");
    }

    let app_state = AppState {
        runner,
        sessions,
        completion,
        notifier,
        transcriber,
        checkout: config.checkout.clone(),
        impact_seed: config.impact_seed,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/message", post(message_turn))
        .route("/api/session/{id}", get(get_session))
        .route("/api/chat", post(chat))
        .route("/api/lead", post(notify_lead))
        .route("/api/transcribe", post(transcribe_audio))
        .route("/api/checkout/config", get(checkout_config))
        .route("/api/checkout/return", get(checkout_return))
        .layer(from_fn(correlation_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %config.bind_addr, "failed to bind");
            std::process::exit(1);
        }
    };

    info!("Server running on http://{}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server terminated");
    }
}

async fn health_check() -> &'static str {
    "OK"
}

fn error_json(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message })))
}

/// A provided session id must be a UUID; anything else is rejected before
/// touching storage.
fn is_valid_session_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// One dialogue turn: routes the input through the flow (triage, guided
/// declaration steps, or the open-ended assistant) via the runner, which
/// persists the session for the next turn.
async fn message_turn(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<Value>)> {
    let session_id_provided = request.session_id.is_some();
    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if session_id_provided && !is_valid_session_id(&session_id) {
        return Err(error_json(
            StatusCode::BAD_REQUEST,
            "Identifiant de session invalide",
        ));
    }

    let session = match state.sessions.get(&session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            if session_id_provided {
                return Err(error_json(StatusCode::NOT_FOUND, "Session introuvable"));
            }
            info!(session_id = %session_id, "creating new session");
            let session = Session::new_from_task(session_id.clone(), type_name::<TriageTask>());
            session
                .context
                .set(session_keys::IMPACT, state.impact_seed)
                .await;
            if let Err(e) = state.sessions.save(session.clone()).await {
                error!(session_id = %session_id, error = %e, "failed to create session");
                return Err(error_json(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erreur serveur",
                ));
            }
            session
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "failed to load session");
            return Err(error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Erreur serveur",
            ));
        }
    };

    // The lead is captured at most once per session and immutable afterwards.
    if let Some(lead) = &request.lead {
        let existing: Option<Lead> = session.context.get(session_keys::LEAD).await;
        if existing.is_none() {
            session.context.set(session_keys::LEAD, lead).await;
        }
    }

    session
        .context
        .set(session_keys::USER_INPUT, request.content)
        .await;
    session.context.set("session_id", session_id.clone()).await;

    let result = match state.runner.run(&session_id).await {
        Ok(result) => result,
        Err(FlowError::SessionNotFound(_)) => {
            return Err(error_json(StatusCode::NOT_FOUND, "Session introuvable"));
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "flow execution failed");
            return Err(error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Erreur serveur",
            ));
        }
    };

    Ok(Json(MessageResponse {
        session_id,
        response: result.response,
        status: format!("{:?}", result.status),
    }))
}

#[derive(Debug, Serialize)]
struct SessionView {
    session_id: String,
    current_task_id: String,
    messages: Vec<ChatMessage>,
    impact: ImpactEstimate,
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, (StatusCode, Json<Value>)> {
    match state.sessions.get(&session_id).await {
        Ok(Some(session)) => {
            let messages = session.context.get_all_messages().await;
            let impact: ImpactEstimate = session
                .context
                .get(session_keys::IMPACT)
                .await
                .unwrap_or_default();
            Ok(Json(SessionView {
                session_id,
                current_task_id: session.current_task_id,
                messages,
                impact,
            }))
        }
        Ok(None) => Err(error_json(StatusCode::NOT_FOUND, "Session introuvable")),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "failed to load session");
            Err(error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Erreur serveur",
            ))
        }
    }
}

/// The chat-completion relay: turn history in, incremental assistant
/// utterance out (or a single completion when `stream` is false).
async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    if request.messages.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "Messages requis").into_response();
    }

    if !request.stream {
        return match state
            .completion
            .complete(&request.messages, request.lead.as_ref())
            .await
        {
            Ok(text) => Json(json!({ "text": text })).into_response(),
            Err(e) => {
                error!(error = %e, "completion request failed");
                error_json(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    relay::UPSTREAM_ERROR_MESSAGE,
                )
                .into_response()
            }
        };
    }

    match state
        .completion
        .stream(&request.messages, request.lead.as_ref())
        .await
    {
        // Streaming has not started yet here, so a failure is still a plain
        // JSON error; once the SSE channel is open, failures travel in-band.
        Err(e) => {
            error!(error = %e, "failed to open completion stream");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                relay::UPSTREAM_ERROR_MESSAGE,
            )
            .into_response()
        }
        Ok(upstream) => Sse::new(relay::sse_events(upstream)).into_response(),
    }
}

async fn notify_lead(
    State(state): State<AppState>,
    Json(request): Json<LeadNotification>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if request.name.trim().is_empty() || request.email.trim().is_empty() {
        return Err(error_json(StatusCode::BAD_REQUEST, "Nom et email requis"));
    }

    // Fire and forget: the response never waits on (or reflects) delivery.
    let notifier = state.notifier.clone();
    tokio::spawn(async move {
        notifier.notify(&request).await;
    });

    Ok(Json(json!({ "success": true })))
}

async fn transcribe_audio(
    State(state): State<AppState>,
    Json(request): Json<TranscribeRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if request.audio.is_empty() {
        return Err(error_json(StatusCode::BAD_REQUEST, "Données audio manquantes"));
    }

    let Some(transcriber) = &state.transcriber else {
        return Err(error_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Service de transcription non configuré",
        ));
    };

    match transcriber.transcribe(&request.audio).await {
        Ok(text) => Ok(Json(json!({ "text": text }))),
        Err(e) => {
            error!(error = %e, "transcription failed");
            Err(error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Erreur de transcription",
            ))
        }
    }
}

async fn checkout_config(State(state): State<AppState>) -> Json<CheckoutConfig> {
    Json(state.checkout.clone())
}

/// Landing hook for the browser coming back from the hosted checkout page.
/// The `payment=` parameter is consumed here; the cleaned query is what the
/// client should keep in the visible URL.
async fn checkout_return(RawQuery(query): RawQuery) -> Json<Value> {
    let (status, remaining) = checkout::payment_status_from_query(query.as_deref().unwrap_or(""));
    if let Some(status) = &status {
        info!(?status, "checkout returned");
    }
    Json(json!({ "payment": status, "query": remaining }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_uuids_are_accepted_as_session_ids() {
        assert!(is_valid_session_id(&Uuid::new_v4().to_string()));
        assert!(is_valid_session_id("0f8fad5b-d9cb-469f-a165-70867728950e"));

        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("not-a-session"));
        assert!(!is_valid_session_id("../../etc/passwd"));
        assert!(!is_valid_session_id("0f8fad5b-d9cb-469f-a165"));
    }
}
