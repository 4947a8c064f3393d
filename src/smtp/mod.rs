//! SMTP mailbox probing.
//!
//! [`verify_mailbox`] drives an explicit state machine against a single
//! exchange on one short-lived connection: banner, `HELO`, `MAIL FROM`,
//! `RCPT TO` for the target, then a `RCPT TO` for a mailbox that cannot
//! exist (the catch-all probe). No `DATA` is ever sent. Every stage entry
//! and exit is captured as a [`StageLog`] and forwarded to the configured
//! [`StageObserver`].

mod error;
mod machine;
mod options;
mod session;
mod types;

pub use error::SmtpError;
pub use machine::verify_mailbox;
pub use options::SmtpOptions;
pub use types::{
    ProbeOutcome, ProbeReport, SmtpReply, Stage, StageLog, StageObserver, TracingObserver,
};

pub(crate) use types::epoch_ms;
