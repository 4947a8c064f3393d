#![forbid(unsafe_code)]
//! mailprobe — email deliverability verification.
//!
//! The pipeline for one address: rate-limit gate, lexical check,
//! disposable-domain check, MX + DMARC resolution, an SMTP conversation
//! against the primary exchange (with catch-all probing), and projection of
//! the outcome into a stable result record. Bulk verification fans out over
//! a bounded worker pool; the `http` module exposes everything as a JSON
//! API.

pub mod address;
pub mod config;
pub mod dns;
pub mod http;
pub mod limiter;
pub mod metrics;
pub mod pool;
pub mod report;
pub mod smtp;
pub mod verifier;

pub use address::{Address, AddressError};
pub use config::AppConfig;
pub use dns::{DmarcRecord, DnsError, DnsLookup, MxRecord};
pub use limiter::{RateDecision, RateLimitConfig, RateLimiter};
pub use metrics::{MetricsRecorder, MetricsSnapshot};
pub use pool::WorkerPool;
pub use report::{ResultRecord, Status, map_outcome};
pub use smtp::{ProbeOutcome, ProbeReport, SmtpError, SmtpOptions, Stage, StageLog};
pub use verifier::{EmailVerifier, ErrorKind, VerificationOutcome};
