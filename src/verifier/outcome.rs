use crate::smtp::{SmtpError, StageLog};

/// Failure classification carried from the pipeline to the status mapper.
/// `tag` values are the public `subStatus` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DnsError,
    NoMxRecord,
    ConnectionError,
    TimeoutError,
    GreetingError,
    HeloError,
    MailFromError,
    RcptToError,
    MailboxNotFound,
    CatchAllDetected,
    FormatError,
    Disposable,
    SystemError,
    RateLimitExceeded,
    UnknownError,
}

impl ErrorKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::DnsError => "dns_error",
            Self::NoMxRecord => "no_mx_record",
            Self::ConnectionError => "connection_error",
            Self::TimeoutError => "timeout_error",
            Self::GreetingError => "greeting_error",
            Self::HeloError => "helo_error",
            Self::MailFromError => "mail_from_error",
            Self::RcptToError => "rcpt_to_error",
            Self::MailboxNotFound => "mailbox_not_found",
            Self::CatchAllDetected => "catch_all_detected",
            Self::FormatError => "format_error",
            Self::Disposable => "disposable",
            Self::SystemError => "system_error",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::UnknownError => "unknown_error",
        }
    }

    pub fn from_smtp(err: &SmtpError) -> Self {
        match err {
            SmtpError::Connection { .. } => Self::ConnectionError,
            SmtpError::Timeout => Self::TimeoutError,
            SmtpError::Greeting(_) => Self::GreetingError,
            SmtpError::Helo(_) => Self::HeloError,
            SmtpError::MailFrom(_) => Self::MailFromError,
            SmtpError::RcptTo(_) => Self::RcptToError,
            SmtpError::MailboxNotFound(_) => Self::MailboxNotFound,
            SmtpError::Unknown(_) => Self::UnknownError,
        }
    }
}

/// Internal result of one verification, before projection into the public
/// record. `account`/`domain` are `None` when the address never split.
#[derive(Debug)]
pub struct VerificationOutcome {
    pub email: String,
    pub account: Option<String>,
    pub domain: Option<String>,
    pub valid: bool,
    pub error: Option<ErrorKind>,
    pub reason: Option<String>,
    pub mx_record: Option<String>,
    pub dmarc_policy: Option<String>,
    pub is_catch_all: bool,
    pub is_corporate: bool,
    pub logs: Vec<StageLog>,
    pub duration_ms: u64,
}

impl VerificationOutcome {
    pub(crate) fn base(email: &str) -> Self {
        Self {
            email: email.to_string(),
            account: None,
            domain: None,
            valid: false,
            error: None,
            reason: None,
            mx_record: None,
            dmarc_policy: None,
            is_catch_all: false,
            is_corporate: false,
            logs: Vec::new(),
            duration_ms: 0,
        }
    }
}
