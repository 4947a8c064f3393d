//! Process configuration.
//!
//! Assembled once in `main` and threaded through the component
//! constructors; nothing here is a global.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::limiter::RateLimitConfig;
use crate::smtp::SmtpOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub listen: SocketAddr,
    pub smtp: SmtpOptions,
    pub rate_limit: RateLimitConfig,
    /// Worker-pool size; `None` derives it from the CPU count.
    pub workers: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 3000)),
            smtp: SmtpOptions::default(),
            rate_limit: RateLimitConfig::default(),
            workers: None,
        }
    }
}
