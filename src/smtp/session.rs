use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use super::types::SmtpReply;

/// Byte stream the state machine talks over. The timeout hook lets the
/// machine re-arm the socket before each I/O step with whatever remains of
/// the overall deadline; in-memory test transports ignore it.
pub(crate) trait Transport: Read + Write {
    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))
    }
}

pub(crate) struct Connection<T: Transport> {
    transport: T,
    buffer: Vec<u8>,
}

impl<T: Transport> Connection<T> {
    pub(crate) fn new(transport: T) -> Self {
        Self {
            transport,
            buffer: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn into_transport(self) -> T {
        self.transport
    }

    pub(crate) fn send_line(&mut self, line: &str, remaining: Duration) -> io::Result<()> {
        self.transport.set_io_timeout(remaining)?;
        let mut data = line.as_bytes().to_vec();
        data.extend_from_slice(b"\r\n");
        self.transport.write_all(&data)?;
        self.transport.flush()
    }

    /// Read one full reply, following `NNN-` continuation lines until the
    /// final `NNN ` line.
    pub(crate) fn read_reply(&mut self, remaining: Duration) -> io::Result<SmtpReply> {
        self.transport.set_io_timeout(remaining)?;
        let mut code: Option<u16> = None;
        let mut message_lines = Vec::new();
        loop {
            let line = self.read_line()?;
            if line.len() < 3 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid SMTP reply: '{line}'"),
                ));
            }
            let parsed_code = line[..3].parse::<u16>().map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid SMTP status code in '{line}'"),
                )
            })?;
            if let Some(existing) = code {
                if existing != parsed_code {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("inconsistent SMTP reply codes: {existing} vs {parsed_code}"),
                    ));
                }
            } else {
                code = Some(parsed_code);
            }
            let continuation = line.as_bytes().get(3).copied() == Some(b'-');
            let text = if line.len() > 4 {
                line[4..].to_string()
            } else {
                String::new()
            };
            message_lines.push(text);
            if !continuation {
                break;
            }
        }
        Ok(SmtpReply {
            code: code.unwrap_or(0),
            message: message_lines.join("\n"),
        })
    }

    fn read_line(&mut self) -> io::Result<String> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                if line.ends_with(b"\r\n") {
                    line.truncate(line.len() - 2);
                } else if line.ends_with(b"\n") {
                    line.truncate(line.len() - 1);
                }
                return String::from_utf8(line).map_err(|err| {
                    io::Error::new(io::ErrorKind::InvalidData, format!("non-utf8 reply: {err}"))
                });
            }

            let mut buf = [0u8; 512];
            let read = self.transport.read(&mut buf)?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed while reading reply",
                ));
            }
            self.buffer.extend_from_slice(&buf[..read]);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::io::Cursor;

    /// Scripted transport: serves a fixed byte sequence as server replies
    /// and records everything the machine writes.
    pub(crate) struct ScriptedTransport {
        inbound: Cursor<Vec<u8>>,
        pub(crate) outbound: Vec<u8>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(replies: &str) -> Self {
            Self {
                inbound: Cursor::new(replies.as_bytes().to_vec()),
                outbound: Vec::new(),
            }
        }

        pub(crate) fn sent_lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.outbound)
                .split("\r\n")
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        }
    }

    impl Read for ScriptedTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inbound.read(buf)
        }
    }

    impl Write for ScriptedTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.outbound.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for ScriptedTransport {
        fn set_io_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
            Ok(())
        }
    }

    /// Transport whose reads time out, simulating a black-hole peer.
    pub(crate) struct BlackHoleTransport;

    impl Read for BlackHoleTransport {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"))
        }
    }

    impl Write for BlackHoleTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for BlackHoleTransport {
        fn set_io_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
            Ok(())
        }
    }
}
