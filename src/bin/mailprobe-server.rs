//! mailprobe HTTP server: binds the verification pipeline, worker pool,
//! rate limiter and metrics recorder to the JSON API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mailprobe::http::{AppState, JobStore, router};
use mailprobe::{
    AppConfig, EmailVerifier, MetricsRecorder, RateLimitConfig, RateLimiter, SmtpOptions,
    WorkerPool,
};

#[derive(Debug, Parser)]
#[command(
    name = "mailprobe-server",
    about = "Email deliverability verification API",
    version
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:3000")]
    listen: SocketAddr,

    /// Domain announced in SMTP HELO; an opaque value that need not resolve.
    #[arg(long, default_value = "verify.local")]
    helo_domain: String,

    /// SMTP port on the remote exchange (25, or a smarthost submission port
    /// where direct egress is blocked).
    #[arg(long, default_value_t = 25)]
    smtp_port: u16,

    /// Overall per-verification SMTP deadline, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    smtp_deadline_ms: u64,

    /// Worker pool size; derived from the CPU count when omitted.
    #[arg(long)]
    workers: Option<usize>,

    /// Requests allowed per client per rate-limit window.
    #[arg(long, default_value_t = 100)]
    requests_per_hour: u32,
}

impl Cli {
    fn into_config(self) -> AppConfig {
        AppConfig {
            listen: self.listen,
            smtp: SmtpOptions {
                port: self.smtp_port,
                helo_domain: self.helo_domain,
                mail_from: None,
                deadline_ms: self.smtp_deadline_ms,
            },
            rate_limit: RateLimitConfig {
                requests_per_hour: self.requests_per_hour,
                ..RateLimitConfig::default()
            },
            workers: self.workers,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    run(Cli::parse().into_config()).await
}

async fn run(config: AppConfig) -> Result<()> {
    let resolver = Arc::new(mailprobe::dns::system_resolver().context("build system resolver")?);
    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
    let metrics = Arc::new(MetricsRecorder::new());
    let verifier = Arc::new(EmailVerifier::new(
        config.smtp.clone(),
        resolver,
        Arc::clone(&limiter),
        Arc::clone(&metrics),
    ));
    let pool = Arc::new(
        match config.workers {
            Some(count) => WorkerPool::with_workers(count),
            None => WorkerPool::new(),
        }
        .context("spawn worker pool")?,
    );

    // Idle rate-limiter entries age out on a timer, not only on the next
    // check for the same id.
    {
        let limiter = Arc::clone(&limiter);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(60));
            loop {
                tick.tick().await;
                limiter.evict_expired();
            }
        });
    }

    let state = Arc::new(AppState {
        verifier,
        pool: Arc::clone(&pool),
        limiter,
        metrics,
        jobs: Arc::new(JobStore::new()),
    });
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("bind {}", config.listen))?;
    tracing::info!(listen = %config.listen, workers = pool.workers(), "mailprobe listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;

    tracing::info!("shutting down; draining worker pool");
    pool.terminate();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
    }
}
