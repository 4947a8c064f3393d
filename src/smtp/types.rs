use serde::Serialize;

use super::error::SmtpError;

pub(crate) fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The state machine's stages, in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Connect,
    Greeting,
    Helo,
    MailFrom,
    RcptTo,
    CatchAllCheck,
    Quit,
}

/// A raw SMTP reply: numeric code plus message text (multi-line replies are
/// joined with `\n`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmtpReply {
    pub code: u16,
    pub message: String,
}

impl SmtpReply {
    pub(crate) fn summary(&self) -> String {
        if self.message.is_empty() {
            self.code.to_string()
        } else {
            format!("{} {}", self.code, self.message)
        }
    }
}

/// One entry in the stage transcript attached to every probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageLog {
    pub stage: Stage,
    /// Milliseconds since the Unix epoch.
    pub started_at: u64,
    pub finished_at: u64,
    pub success: bool,
    pub error: Option<String>,
    pub request: Option<String>,
    pub response: Option<String>,
}

/// Receives each [`StageLog`] as the stage completes, before the probe
/// finishes. Implementations must tolerate concurrent probes.
pub trait StageObserver: Send + Sync {
    fn on_stage(&self, log: &StageLog);
}

/// Default observer: forwards stages to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn on_stage(&self, log: &StageLog) {
        tracing::debug!(
            stage = ?log.stage,
            success = log.success,
            request = log.request.as_deref().unwrap_or(""),
            response = log.response.as_deref().unwrap_or(""),
            error = log.error.as_deref().unwrap_or(""),
            "smtp stage",
        );
    }
}

/// Terminal resolution of a probe against one exchange.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// `RCPT TO` accepted the target and rejected the catch-all probe.
    Deliverable,
    /// The exchange also accepted a mailbox that cannot exist.
    CatchAll,
    Failed(SmtpError),
}

/// Full result of probing one recipient against one exchange.
#[derive(Debug)]
pub struct ProbeReport {
    pub exchange: String,
    pub outcome: ProbeOutcome,
    pub logs: Vec<StageLog>,
}
