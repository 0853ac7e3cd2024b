//! Phase C: per-group instance presence heuristics (§4.F).

use crate::register::{opcode_for_group, read_register};
use crate::transport::Transport;

fn uint_value(entry: &crate::artifact::RegisterEntry) -> Option<u64> {
    entry.value.as_ref().and_then(|v| v.as_u64())
}

fn float_value(entry: &crate::artifact::RegisterEntry) -> Option<f64> {
    entry.value.as_ref().and_then(|v| v.as_f64())
}

fn is_no_data(entry: &crate::artifact::RegisterEntry) -> bool {
    entry.tt_kind.as_deref() == Some("no_data")
}

/// Presence heuristic for instanced groups (descriptor == 1.0) (§4.F).
///
/// Groups with no defined heuristic are assumed present (logged at debug).
pub fn is_instance_present(transport: &mut dyn Transport, dst: u8, group: u8, instance: u8) -> bool {
    let opcode = opcode_for_group(group);

    match group {
        0x02 => {
            let entry = read_register(transport, dst, opcode, group, instance, 0x0002, Some("UIN"));
            if entry.error.is_some() || is_no_data(&entry) {
                return false;
            }
            match uint_value(&entry) {
                Some(value) => value != 0x0000 && value != 0xFFFF,
                None => false,
            }
        }
        0x03 => {
            let entry = read_register(transport, dst, opcode, group, instance, 0x001C, Some("UCH"));
            if entry.error.is_some() || is_no_data(&entry) {
                return false;
            }
            match uint_value(&entry) {
                Some(value) => value != 0xFF,
                None => false,
            }
        }
        0x09 | 0x0A => {
            let present = |entry: &crate::artifact::RegisterEntry| {
                entry.error.is_none() && !is_no_data(entry) && float_value(entry).is_some_and(|v| !v.is_nan())
            };
            let entry1 = read_register(transport, dst, 0x06, group, instance, 0x0007, Some("EXP"));
            if present(&entry1) {
                return true;
            }
            let entry2 = read_register(transport, dst, 0x06, group, instance, 0x000F, Some("EXP"));
            present(&entry2)
        }
        0x0C => {
            for rr in [0x0002u16, 0x0007, 0x000F, 0x0016] {
                let entry = read_register(transport, dst, 0x06, group, instance, rr, None);
                if entry.error.is_none() && !is_no_data(&entry) {
                    return true;
                }
            }
            false
        }
        other => {
            log::debug!("no presence heuristic for GG=0x{other:02x}; assuming present for II=0x{instance:02x}");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::selector::build_register_read_payload;
    use crate::codec::value::hex_encode;
    use crate::transport::fixture::{FixtureEntry, FixtureTransport};

    fn fixture(dst: u8, opcode: u8, group: u8, instance: u8, register: u16, response_hex: &str) -> FixtureEntry {
        let payload = build_register_read_payload(opcode, group, instance, register).unwrap();
        FixtureEntry {
            dst,
            primary: 0xB5,
            secondary: 0x24,
            payload_hex: hex_encode(&payload),
            response_hex: Some(response_hex.to_string()),
            error: None,
        }
    }

    #[test]
    fn group_0x02_present_when_uin_nonzero_and_not_sentinel() {
        let response = {
            let mut r = vec![0x01, 0x02, 0x02, 0x00];
            r.extend_from_slice(&5u16.to_le_bytes());
            r
        };
        let mut transport = FixtureTransport::new(vec![fixture(0x15, 0x02, 0x02, 0x00, 0x0002, &hex_encode(&response))]);
        assert!(is_instance_present(&mut transport, 0x15, 0x02, 0x00));
    }

    #[test]
    fn group_0x02_absent_when_uin_is_sentinel() {
        let response = {
            let mut r = vec![0x01, 0x02, 0x02, 0x00];
            r.extend_from_slice(&0xFFFFu16.to_le_bytes());
            r
        };
        let mut transport = FixtureTransport::new(vec![fixture(0x15, 0x02, 0x02, 0x00, 0x0002, &hex_encode(&response))]);
        assert!(!is_instance_present(&mut transport, 0x15, 0x02, 0x00));
    }

    #[test]
    fn group_0x09_present_when_first_probe_is_non_nan() {
        let mut response = vec![0x01, 0x09, 0x07, 0x00];
        response.extend_from_slice(&21.5f32.to_le_bytes());
        let mut transport = FixtureTransport::new(vec![fixture(0x15, 0x06, 0x09, 0x00, 0x0007, &hex_encode(&response))]);
        assert!(is_instance_present(&mut transport, 0x15, 0x09, 0x00));
    }

    #[test]
    fn group_0x09_falls_back_to_second_probe() {
        let mut nan_response = vec![0x01, 0x09, 0x07, 0x00];
        nan_response.extend_from_slice(&f32::NAN.to_le_bytes());
        let mut ok_response = vec![0x01, 0x09, 0x0F, 0x00];
        ok_response.extend_from_slice(&10.0f32.to_le_bytes());
        let mut transport = FixtureTransport::new(vec![
            fixture(0x15, 0x06, 0x09, 0x00, 0x0007, &hex_encode(&nan_response)),
            fixture(0x15, 0x06, 0x09, 0x00, 0x000F, &hex_encode(&ok_response)),
        ]);
        assert!(is_instance_present(&mut transport, 0x15, 0x09, 0x00));
    }

    #[test]
    fn group_0x09_absent_when_both_probes_fail() {
        let mut nan_response = vec![0x01, 0x09, 0x07, 0x00];
        nan_response.extend_from_slice(&f32::NAN.to_le_bytes());
        let mut nan_response_2 = vec![0x01, 0x09, 0x0F, 0x00];
        nan_response_2.extend_from_slice(&f32::NAN.to_le_bytes());
        let mut transport = FixtureTransport::new(vec![
            fixture(0x15, 0x06, 0x09, 0x00, 0x0007, &hex_encode(&nan_response)),
            fixture(0x15, 0x06, 0x09, 0x00, 0x000F, &hex_encode(&nan_response_2)),
        ]);
        assert!(!is_instance_present(&mut transport, 0x15, 0x09, 0x00));
    }

    #[test]
    fn unknown_group_assumed_present() {
        let mut transport = FixtureTransport::new(vec![]);
        assert!(is_instance_present(&mut transport, 0x15, 0x69, 0x00));
    }
}
