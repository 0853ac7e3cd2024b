//! TCP transport against the daemon's text-line command socket (§4.C).

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::TcpStream;
use std::time::Duration;

use super::line::{build_read_h_command, build_write_h_command, parse_response_lines};
use super::{Transport, TransportError, TransportResult};

const TIMEOUT_RETRY_DELAY: Duration = Duration::from_secs(1);
const POST_RESPONSE_DRAIN_TIMEOUT: Duration = Duration::from_millis(10);

/// Connection parameters for [`EbusdTcpTransport`].
#[derive(Debug, Clone)]
pub struct EbusdTcpConfig {
    /// Daemon hostname or IP address.
    pub host: String,
    /// Daemon TCP port.
    pub port: u16,
    /// Per-attempt read/write/connect timeout.
    pub timeout: Duration,
}

impl Default for EbusdTcpConfig {
    fn default() -> Self {
        EbusdTcpConfig {
            host: "127.0.0.1".to_string(),
            port: 8888,
            timeout: Duration::from_secs(5),
        }
    }
}

/// TCP transport that speaks the daemon's `read -h` text-line command
/// protocol (§4.C).
///
/// A fresh connection is opened for every attempt; a timeout on the first
/// attempt triggers exactly one retry after a fixed backoff.
pub struct EbusdTcpTransport {
    config: EbusdTcpConfig,
}

impl EbusdTcpTransport {
    /// Create a new transport from `config`.
    pub fn new(config: EbusdTcpConfig) -> Self {
        EbusdTcpTransport { config }
    }

    fn send_once(&self, dst: u8, primary: u8, secondary: u8, payload: &[u8]) -> TransportResult<Vec<u8>> {
        let cmd = build_read_h_command(dst, primary, secondary, payload)?;

        let stream = TcpStream::connect((self.config.host.as_str(), self.config.port))
            .map_err(classify_io_error)?;
        stream.set_read_timeout(Some(self.config.timeout)).map_err(classify_io_error)?;
        stream.set_write_timeout(Some(self.config.timeout)).map_err(classify_io_error)?;

        let mut writer = stream.try_clone().map_err(classify_io_error)?;
        writer.write_all(&cmd).map_err(classify_io_error)?;
        writer.flush().map_err(classify_io_error)?;

        let mut reader = BufReader::new(stream);
        let mut lines: Vec<String> = Vec::new();

        loop {
            let mut raw = String::new();
            let n = reader.read_line(&mut raw).map_err(classify_io_error)?;
            if n == 0 {
                break;
            }
            let text = raw.trim_end_matches(['\r', '\n']).to_string();
            if text.is_empty() {
                break;
            }
            if text.trim().is_empty() {
                continue;
            }
            lines.push(text);
            break;
        }

        if !lines.is_empty() {
            // Best-effort: drain spurious trailing lines (e.g. extra ERR
            // lines some daemon versions emit) with a short timeout. A
            // drain timeout is not a request timeout.
            let drain_timeout = self.config.timeout.min(POST_RESPONSE_DRAIN_TIMEOUT);
            reader
                .get_ref()
                .set_read_timeout(Some(drain_timeout))
                .map_err(classify_io_error)?;
            loop {
                let mut raw = String::new();
                match reader.read_line(&mut raw) {
                    Ok(0) => break,
                    Ok(_) => {
                        let text = raw.trim_end_matches(['\r', '\n']).to_string();
                        if text.is_empty() {
                            break;
                        }
                        if text.trim().is_empty() {
                            continue;
                        }
                        lines.push(text);
                    }
                    Err(e) if is_timeout(&e) => break,
                    Err(e) => return Err(classify_io_error(e)),
                }
            }
        }

        parse_response_lines(&lines)
    }

    /// Issue the daemon's `info` command and return its output lines
    /// (used to auto-resolve a destination address via
    /// [`crate::ebusd_info::parse_ebusd_info_target_addresses`]).
    pub fn send_info_command(&self) -> TransportResult<Vec<String>> {
        let stream = TcpStream::connect((self.config.host.as_str(), self.config.port)).map_err(classify_io_error)?;
        stream.set_read_timeout(Some(self.config.timeout)).map_err(classify_io_error)?;
        stream.set_write_timeout(Some(self.config.timeout)).map_err(classify_io_error)?;

        let mut writer = stream.try_clone().map_err(classify_io_error)?;
        writer.write_all(b"info\n").map_err(classify_io_error)?;
        writer.flush().map_err(classify_io_error)?;

        let mut reader = BufReader::new(stream);
        let mut lines = Vec::new();
        loop {
            let mut raw = String::new();
            let n = reader.read_line(&mut raw).map_err(classify_io_error)?;
            if n == 0 {
                break;
            }
            let text = raw.trim_end_matches(['\r', '\n']).to_string();
            if text.is_empty() {
                break;
            }
            lines.push(text);
        }
        Ok(lines)
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn classify_io_error(err: std::io::Error) -> TransportError {
    if is_timeout(&err) {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Io(err)
    }
}

impl Transport for EbusdTcpTransport {
    fn send_proto(&mut self, dst: u8, primary: u8, secondary: u8, payload: &[u8]) -> TransportResult<Vec<u8>> {
        match self.send_once(dst, primary, secondary, payload) {
            Err(TransportError::Timeout(msg)) => {
                log::debug!(
                    "timeout talking to {}:{} for dst=0x{dst:02x}, retrying once after backoff: {msg}",
                    self.config.host,
                    self.config.port
                );
                std::thread::sleep(TIMEOUT_RETRY_DELAY);
                self.send_once(dst, primary, secondary, payload)
            }
            other => other,
        }
    }

    fn send_broadcast(&mut self, primary: u8, secondary: u8, payload: &[u8]) -> TransportResult<()> {
        let cmd = build_write_h_command(primary, secondary, payload)?;

        let stream = TcpStream::connect((self.config.host.as_str(), self.config.port)).map_err(classify_io_error)?;
        stream.set_write_timeout(Some(self.config.timeout)).map_err(classify_io_error)?;

        let mut writer = stream;
        writer.write_all(&cmd).map_err(classify_io_error)?;
        writer.flush().map_err(classify_io_error)?;
        Ok(())
    }
}
