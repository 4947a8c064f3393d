//! Pipeline orchestration for one address.
//!
//! Order of play: rate-limit gate, shape check, disposable-domain check,
//! MX resolution, DMARC probe, SMTP conversation against the primary
//! exchange, then outcome synthesis. Every exit, success or failure, emits
//! one metrics sample.

pub mod tables;

mod outcome;

pub use outcome::{ErrorKind, VerificationOutcome};

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::address::Address;
use crate::dns::{self, DnsError, DnsLookup, LookupMx, LookupTxt};
use crate::limiter::RateLimiter;
use crate::metrics::MetricsRecorder;
use crate::smtp::{
    self, ProbeOutcome, ProbeReport, SmtpOptions, Stage, StageLog, StageObserver, TracingObserver,
};

/// Seam between the pipeline and the SMTP machine; lets tests substitute a
/// scripted prober the same way DNS tests substitute a resolver.
pub trait MailboxProber: Send + Sync {
    fn probe(&self, exchange: &str, local: &str, ascii_domain: &str) -> ProbeReport;
}

struct SmtpProber {
    options: SmtpOptions,
    observer: Arc<dyn StageObserver>,
}

impl MailboxProber for SmtpProber {
    fn probe(&self, exchange: &str, local: &str, ascii_domain: &str) -> ProbeReport {
        smtp::verify_mailbox(exchange, local, ascii_domain, &self.options, &*self.observer)
    }
}

pub struct EmailVerifier {
    resolver: Arc<dyn DnsLookup>,
    limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsRecorder>,
    prober: Box<dyn MailboxProber>,
}

impl EmailVerifier {
    /// `resolver` is a process-lifetime object (see
    /// [`dns::system_resolver`]), shared by every verification rather than
    /// rebuilt per call.
    pub fn new(
        smtp: SmtpOptions,
        resolver: Arc<dyn DnsLookup>,
        limiter: Arc<RateLimiter>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            resolver,
            limiter,
            metrics,
            prober: Box::new(SmtpProber {
                options: smtp,
                observer: Arc::new(TracingObserver),
            }),
        }
    }

    /// Replace the SMTP step. Also the hook for custom stage observers:
    /// wrap [`smtp::verify_mailbox`] with whatever observer is needed.
    pub fn with_prober(mut self, prober: Box<dyn MailboxProber>) -> Self {
        self.prober = prober;
        self
    }

    /// Verify one address. When `client_id` is given the rate limiter is
    /// consulted first and a refusal short-circuits the pipeline.
    pub fn verify(&self, email: &str, client_id: Option<&str>) -> VerificationOutcome {
        let started_wall = SystemTime::now();
        let started = Instant::now();
        let mut outcome = self.run_pipeline(email, client_id);
        outcome.duration_ms = started.elapsed().as_millis() as u64;
        ensure_stage_log(&mut outcome);
        self.metrics.record(started_wall, outcome.valid);
        tracing::info!(
            email = %outcome.email,
            valid = outcome.valid,
            error = outcome.error.map(|kind| kind.tag()).unwrap_or(""),
            duration_ms = outcome.duration_ms,
            "verification finished",
        );
        outcome
    }

    fn run_pipeline(&self, email: &str, client_id: Option<&str>) -> VerificationOutcome {
        if let Some(id) = client_id {
            if !self.limiter.check(id).allowed {
                let mut out = VerificationOutcome::base(email);
                out.error = Some(ErrorKind::RateLimitExceeded);
                out.reason = Some("Rate limit exceeded".to_string());
                return out;
            }
        }

        let address = match Address::parse(email) {
            Ok(address) => address,
            Err(_) => {
                let mut out = VerificationOutcome::base(email);
                out.error = Some(ErrorKind::FormatError);
                return out;
            }
        };

        if tables::is_disposable_domain(&address.ascii_domain) {
            let mut out = for_address(email, &address);
            out.error = Some(ErrorKind::Disposable);
            return out;
        }

        self.verify_resolved(email, &address, self.resolver.as_ref())
    }

    pub(crate) fn verify_resolved<R>(
        &self,
        email: &str,
        address: &Address,
        resolver: &R,
    ) -> VerificationOutcome
    where
        R: LookupMx + LookupTxt + ?Sized,
    {
        let mut out = for_address(email, address);

        let records = match dns::lookup_mx(resolver, &address.ascii_domain) {
            Ok(records) => records,
            Err(DnsError::NoMxRecords) => {
                out.error = Some(ErrorKind::NoMxRecord);
                return out;
            }
            Err(err) => {
                tracing::warn!(domain = %address.ascii_domain, error = %err, "MX lookup failed");
                out.error = Some(ErrorKind::DnsError);
                return out;
            }
        };
        // lookup_mx guarantees a non-empty, preference-sorted list.
        let primary = &records[0];
        out.mx_record = Some(primary.exchange.clone());

        out.dmarc_policy =
            dns::lookup_dmarc(resolver, &address.ascii_domain).map(|record| record.policy);

        let report = self
            .prober
            .probe(&primary.exchange, &address.local, &address.ascii_domain);
        out.logs = report.logs;

        match report.outcome {
            ProbeOutcome::Deliverable => {
                out.valid = true;
            }
            ProbeOutcome::CatchAll => {
                out.is_catch_all = true;
                if out.is_corporate {
                    out.valid = true;
                } else {
                    out.error = Some(ErrorKind::CatchAllDetected);
                }
            }
            ProbeOutcome::Failed(err) => {
                out.error = Some(ErrorKind::from_smtp(&err));
                if !matches!(err, smtp::SmtpError::MailboxNotFound(_)) {
                    out.reason = Some(err.to_string());
                }
            }
        }
        out
    }
}

fn for_address(email: &str, address: &Address) -> VerificationOutcome {
    let mut out = VerificationOutcome::base(email);
    out.account = Some(address.local.clone());
    out.domain = Some(address.ascii_domain.clone());
    out.is_corporate = tables::is_corporate_domain(&address.ascii_domain);
    out
}

/// The transcript always describes at least the earliest stage that ran;
/// pipelines that never reached SMTP get a synthetic pre-connect entry.
fn ensure_stage_log(outcome: &mut VerificationOutcome) {
    if !outcome.logs.is_empty() {
        return;
    }
    let reason = outcome
        .reason
        .clone()
        .or_else(|| outcome.error.map(|kind| kind.tag().to_string()));
    let now = smtp::epoch_ms();
    outcome.logs.push(StageLog {
        stage: Stage::Connect,
        started_at: now,
        finished_at: now,
        success: false,
        error: reason,
        request: None,
        response: None,
    });
}
