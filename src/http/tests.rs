use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::dns::tests::StubResolver;
use crate::limiter::{RateLimitConfig, RateLimiter};
use crate::metrics::MetricsRecorder;
use crate::pool::WorkerPool;
use crate::smtp::SmtpOptions;
use crate::verifier::EmailVerifier;

use super::{AppState, JobStore, router};

fn app_with_config(rate_limit: RateLimitConfig) -> Router {
    let limiter = Arc::new(RateLimiter::new(rate_limit));
    let metrics = Arc::new(MetricsRecorder::new());
    // The exercised pipelines all stop before DNS; a stub resolver keeps
    // the tests off the network.
    let verifier = Arc::new(EmailVerifier::new(
        SmtpOptions::default(),
        Arc::new(StubResolver::with_mx(|_| Ok(Vec::new()))),
        Arc::clone(&limiter),
        Arc::clone(&metrics),
    ));
    let pool = Arc::new(WorkerPool::with_workers(2).expect("spawn workers"));
    router(Arc::new(AppState {
        verifier,
        pool,
        limiter,
        metrics,
        jobs: Arc::new(JobStore::new()),
    }))
}

fn app() -> Router {
    app_with_config(RateLimitConfig::default())
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.7");
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let request = builder.body(body).expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, headers, value)
}

#[tokio::test]
async fn health_endpoint() {
    let app = app();
    let (status, headers, body) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(headers["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn preflight_returns_204_with_cors_headers() {
    let app = app();
    let (status, headers, body) =
        send(&app, Method::OPTIONS, "/api/validate-email", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "GET, POST, OPTIONS");
}

#[tokio::test]
async fn validate_email_requires_a_string_email() {
    let app = app();

    let (status, _, body) = send(&app, Method::POST, "/api/validate-email", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("email"));

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/validate-email",
        Some(json!({"email": 42})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn validate_email_reports_format_errors_as_200() {
    let app = app();
    let (status, headers, body) = send(
        &app,
        Method::POST,
        "/api/validate-email",
        Some(json!({"email": "notanemail"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "invalid");
    assert_eq!(body["subStatus"], "format_error");
    assert_eq!(body["isValid"], false);
    assert_eq!(body["mxFound"], "No");
    assert_eq!(body["mxRecord"], Value::Null);
    assert_eq!(headers["x-ratelimit-limit"], "100");
    assert_eq!(headers["x-ratelimit-remaining"], "99");
    assert!(headers.contains_key("x-ratelimit-reset"));
}

#[tokio::test]
async fn validate_email_rejects_disposable_domains() {
    let app = app();
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/validate-email",
        Some(json!({"email": "user@temp-mail.org"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subStatus"], "disposable");
    assert_eq!(body["isValid"], false);
}

#[tokio::test]
async fn rate_limit_returns_429_with_headers() {
    let app = app_with_config(RateLimitConfig {
        requests_per_hour: 1,
        ..RateLimitConfig::default()
    });

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/validate-email",
        Some(json!({"email": "notanemail"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, headers, body) = send(
        &app,
        Method::POST,
        "/api/validate-email",
        Some(json!({"email": "notanemail"})),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["message"], "Rate limit exceeded");
    assert_eq!(headers["x-ratelimit-limit"], "1");
    assert_eq!(headers["x-ratelimit-remaining"], "0");
}

#[tokio::test]
async fn bulk_requires_an_array() {
    let app = app();
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/validate-emails",
        Some(json!({"emails": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("array"));
}

#[tokio::test]
async fn bulk_rejects_oversized_batches() {
    let app = app();
    let emails: Vec<String> = (0..101).map(|index| format!("u{index}@example.com")).collect();
    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/validate-emails",
        Some(json!({"emails": emails})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_rejects_non_string_entries() {
    let app = app();
    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/validate-emails",
        Some(json!({"emails": ["a@b.c", 7]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_results_align_with_input() {
    let app = app();
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/validate-emails",
        Some(json!({"emails": ["notanemail", "user@temp-mail.org"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["email"], "notanemail");
    assert_eq!(results[0]["subStatus"], "format_error");
    assert_eq!(results[1]["email"], "user@temp-mail.org");
    assert_eq!(results[1]["subStatus"], "disposable");
}

#[tokio::test]
async fn bulk_accepts_an_empty_list() {
    let app = app();
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/validate-emails",
        Some(json!({"emails": []})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn metrics_snapshot_counts_validations() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/api/validate-email",
        Some(json!({"email": "notanemail"})),
    )
    .await;
    let (status, _, body) = send(&app, Method::GET, "/api/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalValidations"], 1);
    assert_eq!(body["failedValidations"], 1);
    assert!(body["hourlyMetrics"].is_array());
    assert!(body["dailyMetrics"].is_array());
}

#[tokio::test]
async fn rate_limit_config_roundtrip() {
    let app = app();
    let (status, _, body) = send(&app, Method::GET, "/api/rate-limit-config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requestsPerHour"], 100);
    assert_eq!(body["windowMs"], 3_600_000);

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/rate-limit-config",
        Some(json!({"requestsPerHour": 2000})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("requestsPerHour"));

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/rate-limit-config",
        Some(json!({"requestsPerHour": 250, "maxBulkEmails": 200})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config"]["requestsPerHour"], 250);
    assert_eq!(body["config"]["maxBulkEmails"], 200);

    let (_, _, body) = send(&app, Method::GET, "/api/rate-limit-config", None).await;
    assert_eq!(body["requestsPerHour"], 250);
}

#[tokio::test]
async fn unknown_batch_job_is_404() {
    let app = app();
    let (status, _, body) = send(
        &app,
        Method::GET,
        "/api/validate-emails/batch/job-does-not-exist",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Job not found");
}

#[tokio::test]
async fn batch_job_processes_asynchronously() {
    let app = app();
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/validate-emails/batch",
        Some(json!({"emails": ["notanemail", "user@temp-mail.org"]})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["totalEmails"], 2);

    let mut completed = Value::Null;
    for _ in 0..100 {
        let (status, _, body) = send(
            &app,
            Method::GET,
            &format!("/api/validate-emails/batch/{job_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "completed" {
            completed = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(completed["processedEmails"], 2);
    let results = completed["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["email"], "notanemail");
    assert_eq!(results[0]["isValid"], false);
    assert_eq!(results[0]["jobId"], job_id);
}
