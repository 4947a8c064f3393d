use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rand::{Rng, distributions::Alphanumeric};

use super::error::SmtpError;
use super::options::SmtpOptions;
use super::session::{Connection, Transport};
use super::types::{ProbeOutcome, ProbeReport, SmtpReply, Stage, StageLog, StageObserver, epoch_ms};

static PROBE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Local-part for the catch-all probe: literal prefix, monotonic counter,
/// random tail. Must be practically certain not to exist at any domain.
fn probe_local_part() -> String {
    let sequence = PROBE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let tail: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("test{sequence}{tail}")
}

/// One overall deadline covers the conversation from connect to terminal
/// state; each I/O step is armed with whatever remains.
struct Deadline {
    end: Instant,
}

impl Deadline {
    fn new(budget: Duration) -> Self {
        Self {
            end: Instant::now() + budget,
        }
    }

    fn remaining(&self) -> Result<Duration, SmtpError> {
        let now = Instant::now();
        if now >= self.end {
            Err(SmtpError::Timeout)
        } else {
            Ok(self.end - now)
        }
    }
}

fn stage_error_text(err: &SmtpError) -> String {
    match err {
        SmtpError::Timeout => "timeout".to_string(),
        other => other.to_string(),
    }
}

struct StageRecorder<'a> {
    logs: Vec<StageLog>,
    observer: &'a dyn StageObserver,
}

impl<'a> StageRecorder<'a> {
    fn new(observer: &'a dyn StageObserver) -> Self {
        Self {
            logs: Vec::new(),
            observer,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &mut self,
        stage: Stage,
        started_at: u64,
        success: bool,
        error: Option<String>,
        request: Option<String>,
        response: Option<String>,
    ) {
        let log = StageLog {
            stage,
            started_at,
            finished_at: epoch_ms(),
            success,
            error,
            request,
            response,
        };
        self.observer.on_stage(&log);
        self.logs.push(log);
    }
}

/// Probe `local@ascii_domain` against `exchange` on one short-lived
/// connection. Never sends `DATA`; always attempts `QUIT`; the socket is
/// closed on every exit path.
pub fn verify_mailbox(
    exchange: &str,
    local: &str,
    ascii_domain: &str,
    options: &SmtpOptions,
    observer: &dyn StageObserver,
) -> ProbeReport {
    let deadline = Deadline::new(options.deadline());
    let mut recorder = StageRecorder::new(observer);

    let started = epoch_ms();
    let request = format!("connect {exchange}:{}", options.port);
    let stream = match connect(exchange, options.port, &deadline) {
        Ok(stream) => {
            recorder.record(Stage::Connect, started, true, None, Some(request), None);
            stream
        }
        Err(err) => {
            recorder.record(
                Stage::Connect,
                started,
                false,
                Some(stage_error_text(&err)),
                Some(request),
                None,
            );
            return ProbeReport {
                exchange: exchange.to_string(),
                outcome: ProbeOutcome::Failed(err),
                logs: recorder.logs,
            };
        }
    };

    let mut conn = Connection::new(stream);
    let outcome = converse(&mut conn, local, ascii_domain, options, &deadline, &mut recorder);
    quit(&mut conn, &deadline, &mut recorder);

    ProbeReport {
        exchange: exchange.to_string(),
        outcome,
        logs: recorder.logs,
    }
}

fn connect(exchange: &str, port: u16, deadline: &Deadline) -> Result<TcpStream, SmtpError> {
    let addrs: Vec<SocketAddr> = (exchange, port)
        .to_socket_addrs()
        .map_err(|source| SmtpError::Connection {
            host: exchange.to_string(),
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(SmtpError::Connection {
            host: exchange.to_string(),
            source: io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses resolved"),
        });
    }

    let mut last_err = None;
    for addr in addrs {
        let remaining = deadline.remaining()?;
        match TcpStream::connect_timeout(&addr, remaining) {
            Ok(stream) => return Ok(stream),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => {
                return Err(SmtpError::Timeout);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(SmtpError::Connection {
        host: exchange.to_string(),
        source: last_err.unwrap_or_else(|| io::Error::other("connect failed")),
    })
}

fn converse<T: Transport>(
    conn: &mut Connection<T>,
    local: &str,
    domain: &str,
    options: &SmtpOptions,
    deadline: &Deadline,
    recorder: &mut StageRecorder<'_>,
) -> ProbeOutcome {
    let steps = [
        (Stage::Greeting, None),
        (Stage::Helo, Some(format!("HELO {}", options.helo_domain))),
        (
            Stage::MailFrom,
            Some(format!("MAIL FROM:<{}>", options.envelope_sender())),
        ),
        (Stage::RcptTo, Some(format!("RCPT TO:<{local}@{domain}>"))),
    ];

    for (stage, command) in steps {
        let started = epoch_ms();
        let reply = match exchange_io(conn, deadline, command.as_deref()) {
            Ok(reply) => reply,
            Err(err) => {
                recorder.record(
                    stage,
                    started,
                    false,
                    Some(stage_error_text(&err)),
                    command,
                    None,
                );
                return ProbeOutcome::Failed(err);
            }
        };
        match classify(stage, &reply) {
            Ok(()) => recorder.record(stage, started, true, None, command, Some(reply.summary())),
            Err(err) => {
                recorder.record(
                    stage,
                    started,
                    false,
                    Some(stage_error_text(&err)),
                    command,
                    Some(reply.summary()),
                );
                return ProbeOutcome::Failed(err);
            }
        }
    }

    // Target accepted; probe a mailbox that cannot exist. A second 250
    // means the exchange accepts anything.
    let started = epoch_ms();
    let probe = format!("RCPT TO:<{}@{}>", probe_local_part(), domain);
    match exchange_io(conn, deadline, Some(&probe)) {
        Ok(reply) => {
            let catch_all = reply.code == 250;
            recorder.record(
                Stage::CatchAllCheck,
                started,
                true,
                None,
                Some(probe),
                Some(reply.summary()),
            );
            if catch_all {
                ProbeOutcome::CatchAll
            } else {
                ProbeOutcome::Deliverable
            }
        }
        Err(SmtpError::Timeout) => {
            recorder.record(
                Stage::CatchAllCheck,
                started,
                false,
                Some("timeout".to_string()),
                Some(probe),
                None,
            );
            ProbeOutcome::Failed(SmtpError::Timeout)
        }
        Err(err) => {
            // Anything short of an acceptance is not a catch-all; the
            // target itself already passed.
            recorder.record(
                Stage::CatchAllCheck,
                started,
                false,
                Some(stage_error_text(&err)),
                Some(probe),
                None,
            );
            ProbeOutcome::Deliverable
        }
    }
}

fn exchange_io<T: Transport>(
    conn: &mut Connection<T>,
    deadline: &Deadline,
    command: Option<&str>,
) -> Result<SmtpReply, SmtpError> {
    if let Some(cmd) = command {
        let remaining = deadline.remaining()?;
        conn.send_line(cmd, remaining).map_err(SmtpError::from_io)?;
    }
    let remaining = deadline.remaining()?;
    conn.read_reply(remaining).map_err(SmtpError::from_io)
}

fn classify(stage: Stage, reply: &SmtpReply) -> Result<(), SmtpError> {
    match stage {
        Stage::Greeting => {
            if reply.code == 220 {
                Ok(())
            } else {
                Err(SmtpError::Greeting(reply.summary()))
            }
        }
        Stage::Helo => {
            if reply.code == 250 {
                Ok(())
            } else {
                Err(SmtpError::Helo(reply.summary()))
            }
        }
        Stage::MailFrom => {
            if reply.code == 250 {
                Ok(())
            } else {
                Err(SmtpError::MailFrom(reply.summary()))
            }
        }
        Stage::RcptTo => {
            if reply.code == 250 {
                Ok(())
            } else if matches!(reply.code, 550 | 551 | 553 | 501 | 504 | 511 | 554)
                || reply.message.to_ascii_lowercase().contains("does not exist")
            {
                Err(SmtpError::MailboxNotFound(reply.summary()))
            } else {
                Err(SmtpError::RcptTo(reply.summary()))
            }
        }
        Stage::Connect | Stage::CatchAllCheck | Stage::Quit => {
            unreachable!("classify only covers conversation stages")
        }
    }
}

fn quit<T: Transport>(conn: &mut Connection<T>, deadline: &Deadline, recorder: &mut StageRecorder<'_>) {
    let started = epoch_ms();
    // Best-effort on all exit paths, including past the deadline.
    let remaining = deadline.remaining().unwrap_or(Duration::from_millis(250));
    match conn.send_line("QUIT", remaining) {
        Ok(()) => recorder.record(
            Stage::Quit,
            started,
            true,
            None,
            Some("QUIT".to_string()),
            None,
        ),
        Err(err) => recorder.record(
            Stage::Quit,
            started,
            false,
            Some(err.to_string()),
            Some("QUIT".to_string()),
            None,
        ),
    }
}
