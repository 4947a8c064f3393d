//! Projection of internal verification outcomes into the public result
//! record.
//!
//! [`map_outcome`] is a pure function; every field of [`ResultRecord`] is
//! present on every code path (missing data is the literal `"Unknown"` or
//! `null`) so downstream serialisation is stable.

use serde::{Deserialize, Serialize};

use crate::verifier::{ErrorKind, VerificationOutcome, tables};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Valid,
    Invalid,
    CatchAll,
    Error,
}

/// The wire-format contract with callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub email: String,
    pub status: Status,
    pub sub_status: Option<String>,
    pub account: String,
    pub domain: String,
    /// `"Yes"` exactly when `mx_record` is set.
    pub mx_found: String,
    pub mx_record: Option<String>,
    /// Leading dot-separated label of the exchange, else `"Unknown"`.
    pub smtp_provider: String,
    pub dmarc_policy: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// `"Yes"`/`"No"`, or `"Unknown"` when the domain itself is unknown.
    pub free_email: String,
    /// Reserved; never populated.
    pub did_you_mean: Option<String>,
    pub message: String,
    pub is_valid: bool,
}

/// Project one outcome into the public record.
pub fn map_outcome(outcome: &VerificationOutcome) -> ResultRecord {
    let status = if outcome.valid {
        if outcome.is_catch_all {
            Status::CatchAll
        } else {
            Status::Valid
        }
    } else if outcome.error == Some(ErrorKind::SystemError) {
        Status::Error
    } else {
        Status::Invalid
    };

    let sub_status = match status {
        Status::Valid | Status::CatchAll => None,
        Status::Error => Some("system_error".to_string()),
        Status::Invalid => Some(
            outcome
                .error
                .map(|kind| kind.tag())
                .unwrap_or("verification_failed")
                .to_string(),
        ),
    };

    let (first_name, last_name) = outcome
        .account
        .as_deref()
        .map(extract_names)
        .unwrap_or_else(|| ("Unknown".to_string(), "Unknown".to_string()));

    let free_email = match outcome.domain.as_deref() {
        None => "Unknown",
        Some(domain) if tables::is_free_email_provider(domain) => "Yes",
        Some(_) => "No",
    };

    let message = outcome
        .reason
        .clone()
        .unwrap_or_else(|| canonical_message(status, sub_status.as_deref()));

    ResultRecord {
        email: outcome.email.clone(),
        status,
        sub_status,
        account: outcome.account.clone().unwrap_or_else(unknown),
        domain: outcome.domain.clone().unwrap_or_else(unknown),
        mx_found: if outcome.mx_record.is_some() { "Yes" } else { "No" }.to_string(),
        mx_record: outcome.mx_record.clone(),
        smtp_provider: smtp_provider(outcome.mx_record.as_deref()),
        dmarc_policy: outcome.dmarc_policy.clone(),
        first_name,
        last_name,
        free_email: free_email.to_string(),
        did_you_mean: None,
        message,
        is_valid: outcome.valid,
    }
}

/// Record for a verification that died outside the pipeline (worker panic,
/// pool failure). Shape matches §error semantics: `status="error"`,
/// `subStatus="system_error"`.
pub fn system_error_record(email: &str) -> ResultRecord {
    let mut outcome = VerificationOutcome::base(email);
    outcome.error = Some(ErrorKind::SystemError);
    map_outcome(&outcome)
}

fn unknown() -> String {
    "Unknown".to_string()
}

fn smtp_provider(mx_record: Option<&str>) -> String {
    mx_record
        .and_then(|record| record.split('.').next())
        .filter(|label| !label.is_empty())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(unknown)
}

/// Local-part → (firstName, lastName): dots and underscores become
/// separators, parts are title-cased.
fn extract_names(local: &str) -> (String, String) {
    let cleaned = local.replace(['.', '_'], " ");
    let parts: Vec<String> = cleaned.split_whitespace().map(title_case).collect();
    match parts.len() {
        0 => (unknown(), unknown()),
        1 => (parts[0].clone(), unknown()),
        _ => (parts[0].clone(), parts[1..].join(" ")),
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => {
            first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
        }
    }
}

fn canonical_message(status: Status, sub_status: Option<&str>) -> String {
    match status {
        Status::Valid => "Valid email address".to_string(),
        Status::CatchAll => {
            "Valid corporate email domain with catch-all configuration".to_string()
        }
        Status::Error => "Email validation failed due to a system error".to_string(),
        Status::Invalid => match sub_status.unwrap_or_default() {
            "format_error" => "Invalid email format".to_string(),
            "disposable" => "Disposable email addresses are not allowed".to_string(),
            "mailbox_not_found" => "Mailbox does not exist".to_string(),
            "catch_all_detected" => {
                "Domain accepts any recipient; mailbox existence cannot be confirmed".to_string()
            }
            "no_mx_record" => "Domain has no MX records".to_string(),
            "dns_error" => "DNS lookup failed".to_string(),
            "timeout_error" => "Verification timed out".to_string(),
            "rate_limit_exceeded" => "Rate limit exceeded".to_string(),
            _ => "Email verification failed".to_string(),
        },
    }
}
