use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration knobs for [`verify_mailbox`](crate::smtp::verify_mailbox).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpOptions {
    pub port: u16,
    /// Identity announced in `HELO`; an opaque value that need not resolve.
    pub helo_domain: String,
    /// Envelope sender for `MAIL FROM`; `verify@<helo_domain>` when unset.
    pub mail_from: Option<String>,
    /// One overall deadline covering connect through the terminal state.
    pub deadline_ms: u64,
}

impl Default for SmtpOptions {
    fn default() -> Self {
        Self {
            port: 25,
            helo_domain: "verify.local".to_string(),
            mail_from: None,
            deadline_ms: 10_000,
        }
    }
}

impl SmtpOptions {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn envelope_sender(&self) -> String {
        self.mail_from
            .as_ref()
            .filter(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("verify@{}", self.helo_domain))
    }
}
