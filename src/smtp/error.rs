use thiserror::Error;

/// Terminal failures of an SMTP probe, one per stage plus the cross-cutting
/// timeout and connection cases.
#[derive(Debug, Error)]
pub enum SmtpError {
    #[error("connection to {host} failed: {source}")]
    Connection {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("SMTP conversation deadline exceeded")]
    Timeout,
    #[error("unexpected greeting: {0}")]
    Greeting(String),
    #[error("HELO rejected: {0}")]
    Helo(String),
    #[error("MAIL FROM rejected: {0}")]
    MailFrom(String),
    #[error("RCPT TO failed: {0}")]
    RcptTo(String),
    #[error("mailbox not found: {0}")]
    MailboxNotFound(String),
    #[error("protocol error: {0}")]
    Unknown(String),
}

impl SmtpError {
    /// The lower-snake tag used for the public `subStatus` field.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection_error",
            Self::Timeout => "timeout_error",
            Self::Greeting(_) => "greeting_error",
            Self::Helo(_) => "helo_error",
            Self::MailFrom(_) => "mail_from_error",
            Self::RcptTo(_) => "rcpt_to_error",
            Self::MailboxNotFound(_) => "mailbox_not_found",
            Self::Unknown(_) => "unknown_error",
        }
    }

    pub(crate) fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Self::Timeout,
            _ => Self::Unknown(err.to_string()),
        }
    }
}
