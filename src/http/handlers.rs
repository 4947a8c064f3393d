use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    extract::{ConnectInfo, FromRequestParts, Path, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::limiter::{RateDecision, RateLimitUpdate};
use crate::pool::VerifyTask;
use crate::report::{self, ResultRecord, map_outcome};

use super::{AppState, jobs::JobResultRow};

/// Hard ceiling for the asynchronous batch endpoint, matching the top of
/// the configurable `maxBulkEmails` range.
const BATCH_CEILING: usize = 500;

/// Client identifier for rate limiting: first `X-Forwarded-For` hop when
/// present, else the peer address.
pub(super) struct ClientAddr(pub String);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Infallible> {
        if let Some(forwarded) = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            return Ok(Self(forwarded.to_string()));
        }
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(Self(peer))
    }
}

pub(super) async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub(super) async fn validate_email(
    State(state): State<Arc<AppState>>,
    client: ClientAddr,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = body.ok();
    let email = body
        .as_ref()
        .and_then(|Json(value)| value.get("email"))
        .and_then(Value::as_str)
        .map(str::to_owned);
    let Some(email) = email else {
        return message_response(StatusCode::BAD_REQUEST, "email is required and must be a string");
    };

    let decision = state.limiter.check(&client.0);
    if !decision.allowed {
        return rate_limited(decision);
    }

    let record = run_verification(&state, email).await;
    with_rate_headers(decision, Json(record).into_response())
}

pub(super) async fn validate_emails(
    State(state): State<Arc<AppState>>,
    client: ClientAddr,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = body.ok();
    let emails = match extract_email_list(body.as_ref(), state.limiter.config().max_bulk_emails) {
        Ok(emails) => emails,
        Err(response) => return response,
    };

    let decision = state.limiter.check(&client.0);
    if !decision.allowed {
        return rate_limited(decision);
    }

    let records = fan_out(&state, emails).await;
    with_rate_headers(decision, Json(records).into_response())
}

pub(super) async fn create_batch_job(
    State(state): State<Arc<AppState>>,
    client: ClientAddr,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = body.ok();
    let emails = match extract_email_list(body.as_ref(), BATCH_CEILING) {
        Ok(emails) => emails,
        Err(response) => return response,
    };

    let decision = state.limiter.check(&client.0);
    if !decision.allowed {
        return rate_limited(decision);
    }

    let job = state
        .jobs
        .create(emails.len(), json!({"submittedBy": client.0}));
    let job_id = job.id.clone();
    let worker_state = Arc::clone(&state);
    tokio::spawn(async move {
        process_batch_job(worker_state, job_id, emails).await;
    });

    with_rate_headers(
        decision,
        (StatusCode::ACCEPTED, Json(job)).into_response(),
    )
}

pub(super) async fn get_batch_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Response {
    match state.jobs.get(&job_id) {
        None => message_response(StatusCode::NOT_FOUND, "Job not found"),
        Some((job, results)) => {
            let mut body = json!(job);
            if let Some(results) = results {
                body["results"] = json!(results);
            }
            Json(body).into_response()
        }
    }
}

pub(super) async fn metrics_snapshot(State(state): State<Arc<AppState>>) -> Response {
    Json(state.metrics.snapshot()).into_response()
}

pub(super) async fn get_rate_limit_config(State(state): State<Arc<AppState>>) -> Response {
    Json(state.limiter.config()).into_response()
}

pub(super) async fn update_rate_limit_config(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RateLimitUpdate>, JsonRejection>,
) -> Response {
    let Ok(Json(update)) = body else {
        return message_response(StatusCode::BAD_REQUEST, "request body must be a JSON object");
    };
    match state.limiter.update_config(update) {
        Ok(config) => Json(json!({
            "message": "Rate limit configuration updated",
            "config": config,
        }))
        .into_response(),
        Err(err) => message_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

async fn process_batch_job(state: Arc<AppState>, job_id: String, emails: Vec<String>) {
    state.jobs.mark_processing(&job_id);
    for email in emails {
        let record = run_verification(&state, email).await;
        state
            .jobs
            .append_result(&job_id, JobResultRow::from_record(&job_id, &record));
    }
    state.jobs.complete(&job_id);
}

/// Run one verification on the worker pool and await its record. A pool
/// rejection (terminate during shutdown) degrades to a system-error record.
async fn run_verification(state: &AppState, email: String) -> ResultRecord {
    let verifier = Arc::clone(&state.verifier);
    let task_email = email.clone();
    let receiver = state.pool.submit(VerifyTask::new(email.clone(), move || {
        map_outcome(&verifier.verify(&task_email, None))
    }));
    match receiver.await {
        Ok(record) => record,
        Err(_) => report::system_error_record(&email),
    }
}

async fn fan_out(state: &AppState, emails: Vec<String>) -> Vec<ResultRecord> {
    let verifier = &state.verifier;
    let receivers: Vec<_> = emails
        .iter()
        .map(|email| {
            let verifier = Arc::clone(verifier);
            let task_email = email.clone();
            state.pool.submit(VerifyTask::new(email.clone(), move || {
                map_outcome(&verifier.verify(&task_email, None))
            }))
        })
        .collect();

    let mut records = Vec::with_capacity(receivers.len());
    for (email, receiver) in emails.iter().zip(receivers) {
        let record = match receiver.await {
            Ok(record) => record,
            Err(_) => report::system_error_record(email),
        };
        records.push(record);
    }
    records
}

fn extract_email_list(
    body: Option<&Json<Value>>,
    max: usize,
) -> Result<Vec<String>, Response> {
    let array = body
        .and_then(|Json(value)| value.get("emails"))
        .and_then(Value::as_array)
        .ok_or_else(|| message_response(StatusCode::BAD_REQUEST, "emails must be an array"))?;
    if array.len() > max {
        return Err(message_response(
            StatusCode::BAD_REQUEST,
            &format!("emails must contain at most {max} addresses"),
        ));
    }
    array
        .iter()
        .map(|value| value.as_str().map(str::to_owned))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| {
            message_response(StatusCode::BAD_REQUEST, "emails must contain only strings")
        })
}

fn message_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"message": message}))).into_response()
}

fn rate_limited(decision: RateDecision) -> Response {
    with_rate_headers(
        decision,
        message_response(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded"),
    )
}

fn with_rate_headers(decision: RateDecision, mut response: Response) -> Response {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.reset_epoch_s.to_string()) {
        headers.insert("x-ratelimit-reset", value);
    }
    response
}
