use crate::application::use_cases::resolve_ci_status::{
    ResolveCiStatusUseCase, ResolveCiStatusUseCaseInput, ResolveCiStatusUseCaseOutput,
};
use crate::application::use_cases::stream_ci_status::{
    StreamCiStatusInteractor, StreamCiStatusUseCase, StreamCiStatusUseCaseInput,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::Utf8Bytes;
use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub resolve_use_case: Arc<dyn ResolveCiStatusUseCase>,
    pub stream_use_case: Arc<StreamCiStatusInteractor>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Parses a `{"repoIds": [...]}` document; shared by the HTTP and WebSocket routes.
fn parse_repo_ids(body: &Value) -> Result<Vec<String>, String> {
    ResolveCiStatusUseCaseInput::from_json(body)
        .map(|input| input.repository_ids)
        .map_err(|e| format!("Invalid request: {e}"))
}

/// Reads a watch request sent as a WebSocket text frame.
fn parse_watch_frame(text: &str) -> Result<Vec<String>, String> {
    serde_json::from_str::<Value>(text)
        .map_err(|e| format!("Invalid request: {e}"))
        .and_then(|body| parse_repo_ids(&body))
}

#[tracing::instrument(name = "ci_status_handler", skip_all)]
pub async fn ci_status_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            tracing::debug!("Rejected request body: {}", rejection.body_text());
            return bad_request(format!("Invalid request: {}", rejection.body_text()));
        }
    };
    let repository_ids = match parse_repo_ids(&body) {
        Ok(ids) => ids,
        Err(message) => return bad_request(message),
    };

    let output = state
        .resolve_use_case
        .execute(ResolveCiStatusUseCaseInput::new(repository_ids))
        .await;
    (StatusCode::OK, Json(output)).into_response()
}

#[axum::debug_handler]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.stream_use_case.clone()))
}

async fn next_update(
    updates: &mut Option<BoxStream<'_, ResolveCiStatusUseCaseOutput>>,
) -> Option<ResolveCiStatusUseCaseOutput> {
    match updates {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn handle_socket(socket: WebSocket, use_case: Arc<StreamCiStatusInteractor>) {
    run_watch_session(socket, use_case).await;
}

/// Drives one watch connection until the client leaves. Works over any
/// message stream/sink so the protocol does not depend on a live socket.
#[tracing::instrument(name = "watch_session", skip_all)]
async fn run_watch_session<S, E>(mut socket: S, use_case: Arc<StreamCiStatusInteractor>)
where
    S: Stream<Item = Result<Message, E>> + Sink<Message> + Unpin,
    E: std::fmt::Display,
{
    tracing::info!("Client connected");
    // Nothing is streamed until the client names the repositories to watch.
    let mut updates: Option<BoxStream<'_, ResolveCiStatusUseCaseOutput>> = None;

    loop {
        tokio::select! {
            Some(output) = next_update(&mut updates) => {
                match serde_json::to_string(&output) {
                    Ok(json_string) => {
                        if socket.send(Message::Text(Utf8Bytes::from(json_string))).await.is_err() {
                            tracing::info!("Client disconnected (send error)");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to serialize output: {:?}", e);
                    }
                }
            },
            received = socket.next() => {
                match received {
                    Some(Ok(Message::Text(text))) => match parse_watch_frame(text.as_str()) {
                        Ok(repository_ids) => {
                            tracing::info!("Watching {} repositories", repository_ids.len());
                            let input = StreamCiStatusUseCaseInput { repository_ids };
                            updates = Some(use_case.execute(input).boxed());
                        }
                        Err(message) => {
                            tracing::debug!("Rejected watch request: {}", message);
                            let error = serde_json::json!({ "error": message }).to_string();
                            if socket.send(Message::Text(Utf8Bytes::from(error))).await.is_err() {
                                tracing::info!("Client disconnected (send error after bad request)");
                                break;
                            }
                        }
                    },
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("Client disconnected (received close message)");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ignore Ping/Pong and Binary messages
                    }
                    Some(Err(e)) => {
                        tracing::info!("Client disconnected (receive error: {})", e);
                        break;
                    }
                    None => {
                        tracing::info!("Client disconnected (socket closed)");
                        break;
                    }
                }
            },
        };
    }
}

#[tracing::instrument(name = "health_check")]
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ci-status", post(ci_status_handler))
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}
