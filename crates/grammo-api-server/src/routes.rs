use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Legacy clients call the slash-terminated paths
    let api = Router::new()
        .route("/hello", get(handlers::health::hello))
        .route("/hello/", get(handlers::health::hello))
        .route("/chat", post(handlers::chat::chat_handler))
        .route("/chat/", post(handlers::chat::chat_handler))
        .route("/end", post(handlers::session::end_session_handler))
        .route("/end/", post(handlers::session::end_session_handler));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(api)
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .with_state(state)
        // CORS: mirror origin so the session cookie travels cross-site
        .layer(CorsLayer::very_permissive())
        // Tracing
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
}
