//! Daemon TCP text-line protocol: command framing and response
//! classification (§4.C).

use super::TransportError;

const HEX_CHARS: &str = "0123456789abcdefABCDEF";

/// Build a `read -h <DST><PRIM><SEC><LEN><PAYLOAD-HEX>\n` command line.
///
/// `payload` must fit in a single length byte (0..=0xFF bytes).
pub fn build_read_h_command(dst: u8, primary: u8, secondary: u8, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    if payload.len() > 0xFF {
        return Err(TransportError::Protocol(format!(
            "payload too large for hex command: {} bytes",
            payload.len()
        )));
    }
    let payload_hex = crate::codec::value::hex_encode(payload).to_uppercase();
    let mut cmd = format!(
        "read -h {dst:02X}{primary:02X}{secondary:02X}{:02X}{payload_hex}",
        payload.len()
    );
    cmd.push('\n');
    Ok(cmd.into_bytes())
}

/// Build a broadcast `write -h ff<PRIM><SEC><LEN><PAYLOAD-HEX>\n` command
/// line (§4.C/§6). Always targets the broadcast address; the daemon sends no
/// response line for a broadcast write, so the caller must not read one.
///
/// `payload` must fit in a single length byte (0..=0xFF bytes).
pub fn build_write_h_command(primary: u8, secondary: u8, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    if payload.len() > 0xFF {
        return Err(TransportError::Protocol(format!(
            "payload too large for hex command: {} bytes",
            payload.len()
        )));
    }
    let payload_hex = crate::codec::value::hex_encode(payload).to_uppercase();
    let mut cmd = format!("write -h ff{primary:02X}{secondary:02X}{:02X}{payload_hex}", payload.len());
    cmd.push('\n');
    Ok(cmd.into_bytes())
}

/// Classify a sequence of response lines (already stripped of their newline
/// terminators) and return the first hex payload line as bytes.
///
/// An `err` line containing "timeout", "timed out", or "no answer"
/// (case-insensitive) is a [`TransportError::Timeout`]; any other `err` line
/// is a [`TransportError::Protocol`]. Blank lines are skipped. A line may
/// carry a leading `0x` and/or internal whitespace, both stripped before hex
/// decoding.
pub fn parse_response_lines(lines: &[String]) -> Result<Vec<u8>, TransportError> {
    for raw_line in lines {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line.len() >= 3 && line[..3].eq_ignore_ascii_case("err") {
            let lowered = line.to_lowercase();
            if lowered.contains("timeout") || lowered.contains("timed out") || lowered.contains("no answer") {
                return Err(TransportError::Timeout(line.to_string()));
            }
            return Err(TransportError::Protocol(line.to_string()));
        }

        let without_0x = if line.len() >= 2 && line[..2].eq_ignore_ascii_case("0x") {
            line[2..].trim()
        } else {
            line
        };
        let normalized: String = without_0x.chars().filter(|c| !c.is_whitespace()).collect();
        if normalized.is_empty() {
            continue;
        }
        if !normalized.chars().all(|c| HEX_CHARS.contains(c)) {
            return Err(TransportError::Protocol(format!("unexpected response line: {raw_line:?}")));
        }
        if normalized.len() % 2 != 0 {
            return Err(TransportError::Protocol(format!("odd-length hex payload in response: {raw_line:?}")));
        }
        return crate::codec::value::hex_decode(&normalized)
            .map_err(|_| TransportError::Protocol(format!("invalid hex payload in response: {raw_line:?}")));
    }
    Err(TransportError::Protocol("empty response".to_string()))
}
