//! Route definitions and router construction.
//!
//! Axum 0.8 uses brace syntax for path parameters: `{name}`.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::bootstrap::{AxumContext, CorsConfig};
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// API routes without the `/api` prefix, for nesting under `/api`.
pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        // Event channel
        .route("/ws/progress", get(handlers::ws::progress_ws))
        // GPU
        .route("/gpu/status", get(handlers::gpu::status))
        .route("/gpu/fix-cuda", post(handlers::gpu::fix_cuda))
        // Engines
        .route(
            "/tts/engines/install/{name}",
            post(handlers::tts::install_engine),
        )
        // Voice design
        .route(
            "/voices/create/preview-from-prompt",
            post(handlers::voice_create::preview_from_prompt),
        )
        .route(
            "/voices/create/parler-status",
            get(handlers::voice_create::parler_status),
        )
}

/// Create the main Axum router.
///
/// Generated previews are served read-only from `previews_dir` under
/// `/api/previews`. `ServeDir` rejects paths that escape that directory.
pub fn create_router(ctx: AxumContext, cors_config: &CorsConfig) -> Router {
    let previews = ServeDir::new(&ctx.config.previews_dir);
    let state: AppState = Arc::new(ctx);
    let cors = build_cors_layer(cors_config);

    let api = api_routes()
        .nest_service("/previews", previews)
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
