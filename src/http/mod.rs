//! HTTP surface: JSON API under `/api`, permissive CORS, rate-limit
//! headers on verification responses.
//!
//! Protocol-level 4xx/5xx are reserved for request-shape problems and rate
//! limiting; a verification that fails (even on a network error) is still
//! HTTP 200 with `isValid=false` and a descriptive `subStatus`.

mod handlers;
mod jobs;

pub use jobs::{JobResultRow, JobRow, JobStatus, JobStore};

use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::limiter::RateLimiter;
use crate::metrics::MetricsRecorder;
use crate::pool::WorkerPool;
use crate::verifier::EmailVerifier;

pub struct AppState {
    pub verifier: Arc<EmailVerifier>,
    pub pool: Arc<WorkerPool>,
    pub limiter: Arc<RateLimiter>,
    pub metrics: Arc<MetricsRecorder>,
    pub jobs: Arc<JobStore>,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/validate-email", post(handlers::validate_email))
        .route("/api/validate-emails", post(handlers::validate_emails))
        .route(
            "/api/validate-emails/batch",
            post(handlers::create_batch_job),
        )
        .route(
            "/api/validate-emails/batch/{job_id}",
            get(handlers::get_batch_job),
        )
        .route("/api/metrics", get(handlers::metrics_snapshot))
        .route(
            "/api/rate-limit-config",
            get(handlers::get_rate_limit_config).post(handlers::update_rate_limit_config),
        )
        .layer(middleware::from_fn(permissive_cors))
        .with_state(state)
}

/// Permissive CORS: `*` on every response, preflights answered directly
/// with 204.
async fn permissive_cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(&mut response);
        return response;
    }
    let mut response = next.run(request).await;
    apply_cors_headers(&mut response);
    response
}

fn apply_cors_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

#[cfg(test)]
mod tests;
