//! Client behaviour against a real in-process HTTP server.
//!
//! The stub server runs on the test's own runtime, so paused-time tests see
//! its timers on the same clock as the client's deadlines.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Json;
use serde_json::json;
use tokio::sync::{Mutex, Notify, oneshot};
use url::Url;
use voicestudio_client::{
    ApiError, CancellationToken, ClientConfig, GenerationProgress, Transport, TransportConnection,
    TransportError, VoiceStudioClient,
};
use voicestudio_core::PreviewRequest;

// ── Stub server ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct Stub {
    /// Released by the test to let a parked preview answer.
    release: Notify,
    /// Fires when a parked request future is dropped by the server.
    dropped: Mutex<Option<oneshot::Sender<()>>>,
}

/// Sends on drop, signalling that the server abandoned the handler.
struct DropSignal(Option<oneshot::Sender<()>>);

impl Drop for DropSignal {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "gpu_available": false, "gpu_name": null}))
}

async fn missing_voice() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"detail": "not found"}))).into_response()
}

async fn hang_forever() -> StatusCode {
    std::future::pending::<()>().await;
    StatusCode::OK
}

async fn parked_preview(State(stub): State<Arc<Stub>>) -> Json<serde_json::Value> {
    let _signal = DropSignal(stub.dropped.lock().await.take());
    stub.release.notified().await;
    Json(json!({
        "audio_url": "/api/previews/20260101/preview_abc.wav",
        "duration": 2.5,
        "model_id": "parler-mini-v1.1"
    }))
}

async fn slow_preview() -> Json<serde_json::Value> {
    tokio::time::sleep(Duration::from_secs(1800)).await;
    Json(json!({
        "audio_url": "/api/previews/20260101/preview_slow.wav",
        "duration": 4.0,
        "model_id": "parler-large-v1"
    }))
}

async fn progress_socket(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|mut socket: WebSocket| async move {
        let frame = json!({
            "type": "progress",
            "stage": "loading_model",
            "message": "Loading Parler-TTS Mini v1.1...",
            "percent": 10
        });
        if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
            return;
        }
        while let Some(Ok(_)) = socket.recv().await {}
    })
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn stub_router(stub: Arc<Stub>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/voices/{id}", delete(missing_voice))
        .route("/api/gpu/status", get(hang_forever))
        .route("/api/gpu/fix-cuda", post(hang_forever))
        .route("/api/voices/create/preview-from-prompt", post(parked_preview))
        .route("/api/ws/progress", get(progress_socket))
        .with_state(stub)
}

fn slow_router() -> Router {
    Router::new()
        .route("/api/voices/create/preview-from-prompt", post(slow_preview))
}

// ── Silent event channel ──────────────────────────────────────────────────────

/// A transport whose connection attempts never complete, so no progress
/// message ever arrives.
struct SilentTransport;

#[async_trait]
impl Transport for SilentTransport {
    async fn connect(&self, _url: &Url) -> Result<Box<dyn TransportConnection>, TransportError> {
        std::future::pending().await
    }
}

fn client_for(addr: SocketAddr) -> VoiceStudioClient {
    VoiceStudioClient::new(ClientConfig::new().with_base_url(format!("http://{addr}"))).unwrap()
}

fn silent_client_for(addr: SocketAddr) -> VoiceStudioClient {
    VoiceStudioClient::with_transport(
        ClientConfig::new().with_base_url(format!("http://{addr}")),
        Arc::new(SilentTransport),
    )
    .unwrap()
}

// ── Default class ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_round_trips() {
    let addr = serve(stub_router(Arc::default())).await;
    let client = client_for(addr);

    let health = client.health(None).await.unwrap();
    assert_eq!(health.status, "ok");
    assert!(!health.gpu_available);
}

#[tokio::test]
async fn error_detail_is_surfaced_verbatim() {
    let addr = serve(stub_router(Arc::default())).await;
    let client = client_for(addr);

    let err = client.delete_voice("nope", None).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Operation {
            status: 404,
            detail: "not found".to_string()
        }
    );
    assert_eq!(err.to_string(), "not found");
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(addr).health(None).await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)), "got {err:?}");
}

#[tokio::test(start_paused = true)]
async fn default_class_times_out_after_fifteen_seconds() {
    let addr = serve(stub_router(Arc::default())).await;
    let client = silent_client_for(addr);

    let started = tokio::time::Instant::now();
    let err = client.gpu_status(None).await.unwrap_err();

    assert_eq!(
        err,
        ApiError::Timeout {
            after: Duration::from_secs(15)
        }
    );
    assert_eq!(err.to_string(), "Request timed out after 15s");
    assert!(started.elapsed() >= Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn caller_token_beats_the_default_deadline() {
    let addr = serve(stub_router(Arc::default())).await;
    let client = silent_client_for(addr);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = client.gpu_status(Some(&cancel)).await.unwrap_err();

    assert_eq!(err, ApiError::Cancelled);
    assert!(err.is_cancellation());
    assert!(!err.is_timeout());
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(started.elapsed() < Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn idle_caller_token_leaves_the_deadline_in_charge() {
    let addr = serve(stub_router(Arc::default())).await;
    let client = silent_client_for(addr);
    let cancel = CancellationToken::new();

    let err = client.gpu_status(Some(&cancel)).await.unwrap_err();

    assert_eq!(
        err,
        ApiError::Timeout {
            after: Duration::from_secs(15)
        }
    );
    // Firing after the outcome changes nothing.
    cancel.cancel();
    assert!(err.is_timeout());
}

// ── Long class ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn long_class_outlives_the_default_deadline() {
    let addr = serve(stub_router(Arc::default())).await;
    let client = silent_client_for(addr);

    let started = tokio::time::Instant::now();
    let err = client.fix_cuda(None).await.unwrap_err();

    assert_eq!(
        err,
        ApiError::Timeout {
            after: Duration::from_secs(600)
        }
    );
    assert!(started.elapsed() >= Duration::from_secs(600));
}

#[tokio::test(start_paused = true)]
async fn long_class_deadline_is_configurable() {
    let addr = serve(stub_router(Arc::default())).await;
    let client = VoiceStudioClient::with_transport(
        ClientConfig::new()
            .with_base_url(format!("http://{addr}"))
            .with_long_timeout(Duration::from_secs(30)),
        Arc::new(SilentTransport),
    )
    .unwrap();

    let err = client.fix_cuda(None).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Timeout {
            after: Duration::from_secs(30)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn long_class_call_can_be_cancelled_by_the_caller() {
    let addr = serve(stub_router(Arc::default())).await;
    let client = silent_client_for(addr);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = client.fix_cuda(Some(&cancel)).await.unwrap_err();

    assert_eq!(err, ApiError::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(600));
}

// ── Unbounded class ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn unbounded_generation_never_times_out_and_stays_pending() {
    let addr = serve(slow_router()).await;
    let client = silent_client_for(addr);

    let generation = client.preview_from_prompt(&PreviewRequest::new("a calm narrator"));
    tokio::time::sleep(Duration::from_secs(900)).await;
    assert_eq!(generation.progress(), GenerationProgress::Pending);
    assert!(!generation.is_finished());

    let preview = generation.wait().await.unwrap();
    assert_eq!(preview.audio_url, "/api/previews/20260101/preview_slow.wav");
    assert_eq!(preview.model_id, "parler-large-v1");
    client.shutdown().await;
}

#[tokio::test]
async fn generation_reports_broadcast_progress_then_settles_on_response() {
    let stub = Arc::new(Stub::default());
    let addr = serve(stub_router(Arc::clone(&stub))).await;
    let client = client_for(addr);

    let generation = client.preview_from_prompt(&PreviewRequest::new("a calm narrator"));
    let mut progress = generation.watch_progress();
    let seen = tokio::time::timeout(
        Duration::from_secs(5),
        progress.wait_for(|p| matches!(p, GenerationProgress::Reported(_))),
    )
    .await
    .expect("progress should arrive")
    .unwrap()
    .clone();

    assert_eq!(seen.fraction(), Some(0.1));
    assert_eq!(seen.message(), Some("Loading Parler-TTS Mini v1.1..."));
    assert!(!generation.is_finished());

    stub.release.notify_one();
    let preview = generation.wait().await.unwrap();
    assert_eq!(preview.duration, 2.5);
    client.shutdown().await;
}

#[tokio::test]
async fn cancelling_a_generation_closes_the_request() {
    let stub = Arc::new(Stub::default());
    let (dropped_tx, dropped_rx) = oneshot::channel();
    *stub.dropped.lock().await = Some(dropped_tx);
    let addr = serve(stub_router(Arc::clone(&stub))).await;
    let client = silent_client_for(addr);

    let generation = client.preview_from_prompt(&PreviewRequest::new("a calm narrator"));
    // Give the request time to reach the handler.
    tokio::time::sleep(Duration::from_millis(200)).await;
    generation.cancel();

    let err = generation.wait().await.unwrap_err();
    assert_eq!(err, ApiError::Cancelled);
    assert!(err.is_cancellation());
    assert!(!err.is_timeout());

    tokio::time::timeout(Duration::from_secs(5), dropped_rx)
        .await
        .expect("server should observe the closed connection")
        .unwrap();
    client.shutdown().await;
}
