//! Register reads and the response-decoding pipeline (§4.E).

use std::thread::sleep;
use std::time::Duration;

use crate::artifact::RegisterEntry;
use crate::codec::selector::build_register_read_payload;
use crate::codec::value;
use crate::transport::{Transport, TransportError};

const REMOTE_GROUPS: [u8; 3] = [0x09, 0x0A, 0x0C];
const TIMEOUT_RETRY_DELAY: Duration = Duration::from_secs(1);

const PRINTABLE_LATIN1_LOW: std::ops::RangeInclusive<u8> = 0x20..=0x7E;
const PRINTABLE_LATIN1_HIGH: std::ops::RangeInclusive<u8> = 0xA0..=0xFF;

/// Return the B524 register opcode family for a group: `0x06` (remote) for
/// `{0x09, 0x0A, 0x0C}`, `0x02` (local) otherwise.
pub fn opcode_for_group(group: u8) -> u8 {
    if REMOTE_GROUPS.contains(&group) { 0x06 } else { 0x02 }
}

/// Interpret a reply's leading TT byte (user-observed semantics, §4.E).
pub fn interpret_tt(tt: u8) -> &'static str {
    match tt {
        0x00 => "no_data",
        0x01 => "live",
        0x02 => "parameter_limit",
        0x03 => "parameter_config",
        _ => "unknown",
    }
}

fn looks_like_nul_terminated_latin1(data: &[u8]) -> bool {
    let Some(nul_index) = data.iter().position(|&b| b == 0x00) else {
        return false;
    };
    if data[nul_index..].iter().any(|&b| b != 0x00) {
        return false;
    }
    let prefix = &data[..nul_index];
    if prefix.is_empty() {
        return false;
    }
    prefix.iter().all(|&b| PRINTABLE_LATIN1_LOW.contains(&b) || PRINTABLE_LATIN1_HIGH.contains(&b))
}

/// Strip the 4-byte echoed header (`<STATUS> <GG> <RR_LO> <RR_HI>`) from a
/// register read response, validating it against the request payload.
fn strip_echo_header<'a>(payload: &[u8], response: &'a [u8]) -> Result<&'a [u8], String> {
    if response.len() < 4 {
        return Err(format!("short register response: expected >=4 bytes, got {} bytes", response.len()));
    }
    let header = &response[..4];
    let expected_group = payload[2];
    let expected_rr = &payload[4..6];
    let group = header[1];
    let rr = &header[2..4];
    if group != expected_group || rr != expected_rr {
        return Err(format!(
            "register header mismatch: expected_gg={expected_group:02x} expected_rr={} got={} payload={}",
            value::hex_encode(expected_rr),
            value::hex_encode(header),
            value::hex_encode(payload)
        ));
    }
    Ok(&response[4..])
}

fn parse_inferred_value(value_bytes: &[u8]) -> (Option<String>, Option<serde_json::Value>, Option<String>) {
    if value_bytes.is_empty() {
        return (None, None, None);
    }

    let hex_fallback = || {
        let spec = format!("HEX:{}", value_bytes.len());
        let decoded = value::decode(&spec, value_bytes).expect("HEX:n decode never fails for matching length");
        (Some(spec), Some(decoded.to_json()), None)
    };

    match value_bytes.len() {
        4 => match value::decode("EXP", value_bytes) {
            Ok(v) => (Some("EXP".to_string()), Some(v.to_json()), None),
            Err(_) => hex_fallback(),
        },
        2 => match value::decode("UIN", value_bytes) {
            Ok(v) => (Some("UIN".to_string()), Some(v.to_json()), None),
            Err(_) => hex_fallback(),
        },
        1 => match value::decode("UCH", value_bytes) {
            Ok(v) => (Some("UCH".to_string()), Some(v.to_json()), None),
            Err(_) => hex_fallback(),
        },
        3 => {
            if let Ok(v) = value::decode("HDA:3", value_bytes) {
                return (Some("HDA:3".to_string()), Some(v.to_json()), None);
            }
            if let Ok(v) = value::decode("HTI", value_bytes) {
                return (Some("HTI".to_string()), Some(v.to_json()), None);
            }
            hex_fallback()
        }
        _ if looks_like_nul_terminated_latin1(value_bytes) => match value::decode("STR:*", value_bytes) {
            Ok(v) => (Some("STR:*".to_string()), Some(v.to_json()), None),
            Err(_) => hex_fallback(),
        },
        _ => hex_fallback(),
    }
}

/// Read a single B524 register and parse it into an artifact-ready entry
/// (§4.E).
///
/// A transport timeout is retried once after a fixed backoff; on a second
/// timeout, or any other transport error, `error` carries the failure
/// reason and every other field is `None`. A single-byte reply is a valid
/// "status-only" response — no value bytes were present to decode — and
/// reports `error` as `status_only_response: 0xTT`.
pub fn read_register(
    transport: &mut dyn Transport,
    dst: u8,
    opcode: u8,
    group: u8,
    instance: u8,
    register: u16,
    type_hint: Option<&str>,
) -> RegisterEntry {
    transport.trace_label(&format!(
        "Reading dst=0x{dst:02X} GG=0x{group:02X} II=0x{instance:02X} RR=0x{register:04X}"
    ));

    let payload = match build_register_read_payload(opcode, group, instance, register) {
        Ok(p) => p,
        Err(e) => return RegisterEntry { error: Some(format!("selector_error: {e}")), ..Default::default() },
    };

    let response = match transport.send(dst, &payload) {
        Ok(resp) => resp,
        Err(TransportError::Timeout(_)) => {
            sleep(TIMEOUT_RETRY_DELAY);
            match transport.send(dst, &payload) {
                Ok(resp) => resp,
                Err(TransportError::Timeout(_)) => {
                    return RegisterEntry { error: Some("timeout".to_string()), ..Default::default() };
                }
                Err(other) => {
                    return RegisterEntry { error: Some(format!("transport_error: {other}")), ..Default::default() };
                }
            }
        }
        Err(other) => {
            return RegisterEntry { error: Some(format!("transport_error: {other}")), ..Default::default() };
        }
    };

    let reply_hex = value::hex_encode(&response);
    let tt = response.first().copied();
    let tt_kind = tt.map(interpret_tt).map(str::to_string);

    if response.len() == 1 {
        return RegisterEntry {
            reply_hex: Some(reply_hex),
            tt,
            tt_kind,
            error: Some(format!("status_only_response: 0x{:02x}", response[0])),
            ..Default::default()
        };
    }

    let value_bytes = match strip_echo_header(&payload, &response) {
        Ok(bytes) => bytes,
        Err(detail) => {
            return RegisterEntry {
                reply_hex: Some(reply_hex),
                tt,
                tt_kind,
                error: Some(format!("decode_error: {detail}")),
                ..Default::default()
            };
        }
    };

    let raw_hex = value::hex_encode(value_bytes);

    if let Some(hint) = type_hint {
        return match value::decode(hint, value_bytes) {
            Ok(v) => RegisterEntry {
                reply_hex: Some(reply_hex),
                tt,
                tt_kind,
                raw_hex: Some(raw_hex),
                type_spec: Some(hint.to_string()),
                value: Some(v.to_json()),
                ..Default::default()
            },
            Err(e) => RegisterEntry {
                reply_hex: Some(reply_hex),
                tt,
                tt_kind,
                raw_hex: Some(raw_hex),
                type_spec: Some(hint.to_string()),
                error: Some(format!("parse_error: {e}")),
                ..Default::default()
            },
        };
    }

    let (inferred_type, inferred_value, inferred_error) = parse_inferred_value(value_bytes);
    RegisterEntry {
        reply_hex: Some(reply_hex),
        tt,
        tt_kind,
        raw_hex: Some(raw_hex),
        type_spec: inferred_type,
        value: inferred_value,
        error: inferred_error,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fixture::{FixtureEntry, FixtureTransport};

    fn entry(dst: u8, payload: &[u8], response_hex: &str) -> FixtureEntry {
        FixtureEntry {
            dst,
            primary: 0xB5,
            secondary: 0x24,
            payload_hex: value::hex_encode(payload),
            response_hex: Some(response_hex.to_string()),
            error: None,
        }
    }

    #[test]
    fn opcode_for_group_picks_remote_for_room_groups() {
        assert_eq!(opcode_for_group(0x09), 0x06);
        assert_eq!(opcode_for_group(0x0A), 0x06);
        assert_eq!(opcode_for_group(0x0C), 0x06);
        assert_eq!(opcode_for_group(0x02), 0x02);
    }

    #[test]
    fn read_register_decodes_inferred_exp_value() {
        let payload = build_register_read_payload(0x02, 0x02, 0x00, 0x0016).unwrap();
        // reply: TT=0x01 GG=0x02 RR_LO=0x16 RR_HI=0x00, value=2.2f32 LE
        let mut response = vec![0x01, 0x02, 0x16, 0x00];
        response.extend_from_slice(&2.2f32.to_le_bytes());
        let response_hex = value::hex_encode(&response);
        let mut transport = FixtureTransport::new(vec![entry(0x15, &payload, &response_hex)]);

        let result = read_register(&mut transport, 0x15, 0x02, 0x02, 0x00, 0x0016, None);
        assert_eq!(result.error, None);
        assert_eq!(result.type_spec.as_deref(), Some("EXP"));
        assert_eq!(result.tt_kind.as_deref(), Some("live"));
        match result.value {
            Some(serde_json::Value::Number(n)) => assert!((n.as_f64().unwrap() - 2.2).abs() < 1e-4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn read_register_reports_status_only_response_error() {
        let payload = build_register_read_payload(0x02, 0x02, 0x00, 0x0016).unwrap();
        let mut transport = FixtureTransport::new(vec![entry(0x15, &payload, "00")]);

        let result = read_register(&mut transport, 0x15, 0x02, 0x02, 0x00, 0x0016, None);
        assert_eq!(result.error.as_deref(), Some("status_only_response: 0x00"));
        assert_eq!(result.tt, Some(0x00));
    }

    #[test]
    fn read_register_reports_timeout_after_retry() {
        let payload = build_register_read_payload(0x02, 0x02, 0x00, 0x0016).unwrap();
        let mut transport = FixtureTransport::new(vec![FixtureEntry {
            dst: 0x15,
            primary: 0xB5,
            secondary: 0x24,
            payload_hex: value::hex_encode(&payload),
            response_hex: None,
            error: Some("timeout".to_string()),
        }]);

        let result = read_register(&mut transport, 0x15, 0x02, 0x02, 0x00, 0x0016, None);
        assert_eq!(result.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn read_register_detects_header_mismatch() {
        let payload = build_register_read_payload(0x02, 0x02, 0x00, 0x0016).unwrap();
        // Wrong RR echoed back.
        let response = vec![0x01, 0x02, 0xFF, 0xFF, 0x01];
        let response_hex = value::hex_encode(&response);
        let mut transport = FixtureTransport::new(vec![entry(0x15, &payload, &response_hex)]);

        let result = read_register(&mut transport, 0x15, 0x02, 0x02, 0x00, 0x0016, None);
        assert!(result.error.unwrap().starts_with("decode_error"));
    }

    #[test]
    fn read_register_with_type_hint_reports_parse_error_on_mismatch() {
        let payload = build_register_read_payload(0x02, 0x02, 0x00, 0x0016).unwrap();
        let response = vec![0x01, 0x02, 0x16, 0x00, 0xAB]; // 1 value byte, hint expects 2
        let response_hex = value::hex_encode(&response);
        let mut transport = FixtureTransport::new(vec![entry(0x15, &payload, &response_hex)]);

        let result = read_register(&mut transport, 0x15, 0x02, 0x02, 0x00, 0x0016, Some("UIN"));
        assert!(result.error.unwrap().starts_with("parse_error"));
    }
}
