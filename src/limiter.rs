//! Process-wide sliding-window rate limiting keyed by client identifier.
//!
//! One check admits or refuses a caller and records the admission. Expired
//! entries for the id are purged on every check, so the window map cannot
//! grow without bound for an active id; [`RateLimiter::evict_expired`]
//! bounds it for idle ids and is meant to run periodically.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub requests_per_hour: u32,
    pub max_bulk_emails: usize,
    pub window_ms: u64,
    #[serde(rename = "blockDuration")]
    pub block_duration_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_hour: 100,
            max_bulk_emails: 100,
            window_ms: 3_600_000,
            block_duration_ms: 3_600_000,
        }
    }
}

/// Partial update accepted by the configuration endpoint; absent fields
/// keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitUpdate {
    pub requests_per_hour: Option<u32>,
    pub max_bulk_emails: Option<usize>,
    pub window_ms: Option<u64>,
    #[serde(rename = "blockDuration")]
    pub block_duration_ms: Option<u64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("requestsPerHour must be between 1 and 1000")]
    RequestsPerHour,
    #[error("maxBulkEmails must be between 1 and 500")]
    MaxBulkEmails,
    #[error("windowMs must be between 60000 and 86400000")]
    WindowMs,
    #[error("blockDuration must be between 300000 and 86400000")]
    BlockDuration,
}

/// Result of consulting the limiter, carrying everything the HTTP boundary
/// needs for the `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix timestamp in seconds at which the current window has fully
    /// rolled over.
    pub reset_epoch_s: u64,
}

pub struct RateLimiter {
    config: RwLock<RateLimitConfig>,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config: RwLock::new(config),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply a partial update. Validation failures name the offending
    /// field and leave the configuration untouched; successful updates
    /// take effect for subsequent checks.
    pub fn update_config(&self, update: RateLimitUpdate) -> Result<RateLimitConfig, ConfigError> {
        if let Some(value) = update.requests_per_hour {
            if !(1..=1000).contains(&value) {
                return Err(ConfigError::RequestsPerHour);
            }
        }
        if let Some(value) = update.max_bulk_emails {
            if !(1..=500).contains(&value) {
                return Err(ConfigError::MaxBulkEmails);
            }
        }
        if let Some(value) = update.window_ms {
            if !(60_000..=86_400_000).contains(&value) {
                return Err(ConfigError::WindowMs);
            }
        }
        if let Some(value) = update.block_duration_ms {
            if !(300_000..=86_400_000).contains(&value) {
                return Err(ConfigError::BlockDuration);
            }
        }

        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = update.requests_per_hour {
            config.requests_per_hour = value;
        }
        if let Some(value) = update.max_bulk_emails {
            config.max_bulk_emails = value;
        }
        if let Some(value) = update.window_ms {
            config.window_ms = value;
        }
        if let Some(value) = update.block_duration_ms {
            config.block_duration_ms = value;
        }
        Ok(config.clone())
    }

    /// Atomically admit or refuse `id`, recording the admission.
    pub fn check(&self, id: &str) -> RateDecision {
        self.check_at(id, Instant::now())
    }

    pub(crate) fn check_at(&self, id: &str, now: Instant) -> RateDecision {
        let (limit, window) = {
            let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
            (
                config.requests_per_hour,
                Duration::from_millis(config.window_ms),
            )
        };

        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = windows.entry(id.to_string()).or_default();
        while entries
            .front()
            .is_some_and(|stamp| now.duration_since(*stamp) >= window)
        {
            entries.pop_front();
        }

        let allowed = (entries.len() as u32) < limit;
        if allowed {
            entries.push_back(now);
        }
        let current = entries.len() as u32;

        RateDecision {
            allowed,
            limit,
            remaining: limit.saturating_sub(current),
            reset_epoch_s: reset_epoch_s(window),
        }
    }

    /// Drop ids whose every entry has aged out of the window. Intended to
    /// run on a timer so idle clients do not pin map entries forever.
    pub fn evict_expired(&self) {
        let window = Duration::from_millis(
            self.config
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .window_ms,
        );
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.retain(|_, entries| {
            entries.iter().any(|stamp| now.duration_since(*stamp) < window)
        });
    }

    #[cfg(test)]
    fn tracked_ids(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn reset_epoch_s(window: Duration) -> u64 {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    (now_ms + window.as_millis() as u64).div_ceil(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            requests_per_hour: limit,
            window_ms,
            ..RateLimitConfig::default()
        })
    }

    #[test]
    fn admits_up_to_limit_then_refuses() {
        let limiter = limiter(3, 60_000);
        let now = Instant::now();
        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_at("10.0.0.1", now);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }
        let decision = limiter.check_at("10.0.0.1", now);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn window_rollover_resumes_admissions() {
        let limiter = limiter(1, 60_000);
        let start = Instant::now();
        assert!(limiter.check_at("id", start).allowed);
        assert!(!limiter.check_at("id", start).allowed);
        let later = start + Duration::from_millis(60_000);
        assert!(limiter.check_at("id", later).allowed);
    }

    #[test]
    fn ids_are_independent() {
        let limiter = limiter(1, 60_000);
        let now = Instant::now();
        assert!(limiter.check_at("a", now).allowed);
        assert!(limiter.check_at("b", now).allowed);
        assert!(!limiter.check_at("a", now).allowed);
    }

    #[test]
    fn refusal_does_not_consume_an_entry() {
        let limiter = limiter(1, 60_000);
        let start = Instant::now();
        assert!(limiter.check_at("id", start).allowed);
        for _ in 0..5 {
            assert!(!limiter.check_at("id", start).allowed);
        }
        // Only the single admission should age out for the next window.
        let later = start + Duration::from_millis(60_000);
        assert!(limiter.check_at("id", later).allowed);
    }

    #[test]
    fn update_validates_ranges() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let err = limiter
            .update_config(RateLimitUpdate {
                requests_per_hour: Some(0),
                ..RateLimitUpdate::default()
            })
            .unwrap_err();
        assert_eq!(err, ConfigError::RequestsPerHour);

        let err = limiter
            .update_config(RateLimitUpdate {
                window_ms: Some(1),
                ..RateLimitUpdate::default()
            })
            .unwrap_err();
        assert_eq!(err, ConfigError::WindowMs);

        let updated = limiter
            .update_config(RateLimitUpdate {
                requests_per_hour: Some(10),
                max_bulk_emails: Some(50),
                ..RateLimitUpdate::default()
            })
            .unwrap();
        assert_eq!(updated.requests_per_hour, 10);
        assert_eq!(updated.max_bulk_emails, 50);
        // Untouched fields keep their defaults.
        assert_eq!(updated.window_ms, 3_600_000);
    }

    #[test]
    fn update_takes_effect_for_subsequent_checks() {
        let limiter = limiter(1, 60_000);
        let now = Instant::now();
        assert!(limiter.check_at("id", now).allowed);
        assert!(!limiter.check_at("id", now).allowed);
        limiter
            .update_config(RateLimitUpdate {
                requests_per_hour: Some(5),
                ..RateLimitUpdate::default()
            })
            .unwrap();
        assert!(limiter.check_at("id", now).allowed);
    }

    #[test]
    fn evict_expired_drops_idle_ids() {
        let limiter = limiter(5, 60_000);
        let Some(old) = Instant::now().checked_sub(Duration::from_millis(120_000)) else {
            return;
        };
        limiter.check_at("stale", old);
        limiter.check_at("fresh", Instant::now());
        assert_eq!(limiter.tracked_ids(), 2);
        limiter.evict_expired();
        assert_eq!(limiter.tracked_ids(), 1);
    }

    #[test]
    fn config_wire_names_are_camel_case() {
        let json = serde_json::to_value(RateLimitConfig::default()).unwrap();
        assert_eq!(json["requestsPerHour"], 100);
        assert_eq!(json["maxBulkEmails"], 100);
        assert_eq!(json["windowMs"], 3_600_000);
        assert_eq!(json["blockDuration"], 3_600_000);
    }
}
