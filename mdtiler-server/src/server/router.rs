use super::handlers::{self, AppState};
use super::metrics_handler::metrics_handler;
use crate::config::ApiSettings;
use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, Method, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the Axum router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings);
    let cachecontrol = HeaderValue::from_str(&state.settings.cachecontrol).ok();

    Router::new()
        .route("/", get(handlers::landing))
        .route("/health", get(handlers::health_check))
        // Multidimensional dataset endpoints
        .route("/md/variables", get(handlers::variables))
        .route("/md/dims", get(handlers::dims))
        .route("/md/info", get(handlers::info))
        // Cache lifecycle endpoints
        .route("/cache/stats", get(handlers::cache_stats))
        .route("/cache/clear", post(handlers::cache_clear))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(middleware::from_fn(move |req: Request, next: Next| {
            let cachecontrol = cachecontrol.clone();
            set_cache_control(req, next, cachecontrol)
        }))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}

/// Attach the configured Cache-Control header to responses, excluding the
/// health probe
async fn set_cache_control(
    req: Request,
    next: Next,
    cachecontrol: Option<HeaderValue>,
) -> Response {
    let excluded = req.uri().path() == "/health";
    let mut response = next.run(req).await;
    if let Some(value) = cachecontrol {
        if !excluded && !response.headers().contains_key(header::CACHE_CONTROL) {
            response.headers_mut().insert(header::CACHE_CONTROL, value);
        }
    }
    response
}

/// CORS configuration from API settings
fn cors_layer(settings: &ApiSettings) -> CorsLayer {
    let mut cors = CorsLayer::new().allow_headers(Any);

    if settings.cors_origins.iter().any(|o| o == "*") {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = settings
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    let methods: Vec<Method> = settings
        .cors_allow_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    cors.allow_methods(methods)
}
