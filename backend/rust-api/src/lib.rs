use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod cache;
pub mod config;
pub mod extractors;
pub mod handlers;
pub mod llm;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// Adds a Content-Security-Policy header to every response.
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    response
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        // Public endpoints
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Protected endpoints (require JWT)
        .nest(
            "/api/v1",
            api_routes()
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                ))
                .layer(cors),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/adaptive-assessment/create/{course_id}",
            post(handlers::assessments::create_assessment),
        )
        .route(
            "/adaptive-assessment/submit",
            post(handlers::assessments::submit_assessment),
        )
        .route(
            "/ai/recommendations",
            get(handlers::recommendations::get_recommendations),
        )
        .route(
            "/ai/recommendations/refresh",
            post(handlers::recommendations::refresh_recommendations),
        )
        .route(
            "/content-generation/quiz-questions",
            post(handlers::content_generation::quiz_questions),
        )
        .route(
            "/content-generation/content-summary",
            post(handlers::content_generation::content_summary),
        )
        .route(
            "/content-generation/learning-objectives",
            post(handlers::content_generation::learning_objectives),
        )
        .route(
            "/content-generation/content-outline",
            post(handlers::content_generation::content_outline),
        )
        .route(
            "/learning-paths/{course_id}",
            get(handlers::learning_paths::get_learning_path),
        )
        .route(
            "/preferences",
            get(handlers::preferences::get_preferences)
                .put(handlers::preferences::update_preferences),
        )
        .route(
            "/preferences/learning-style",
            get(handlers::preferences::get_learning_style)
                .put(handlers::preferences::update_learning_style),
        )
}
