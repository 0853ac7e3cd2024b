//! Phase A (directory discovery) and Phase B (classification) of the scan
//! engine (§4.D).

use crate::codec::selector::build_directory_probe_payload;
use crate::transport::Transport;

/// Static configuration for a known group (§4.D table).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupConfig {
    /// Expected directory descriptor value.
    pub descriptor: f32,
    /// Human-readable group name.
    pub name: &'static str,
    /// Maximum instance index. `None` for singleton groups (descriptor !=
    /// 1.0) — instances never apply to them regardless of what a raw
    /// lookup table might otherwise carry for the slot.
    pub ii_max: Option<u8>,
    /// Maximum register id within an instance.
    pub rr_max: u8,
}

/// Static table of known groups, keyed by group byte (§4.D).
pub const GROUP_CONFIG: &[(u8, GroupConfig)] = &[
    (0x00, GroupConfig { descriptor: 3.0, name: "Discovery", ii_max: None, rr_max: 0xFF }),
    (0x01, GroupConfig { descriptor: 3.0, name: "Regulator Parameters", ii_max: None, rr_max: 0x8F }),
    (0x02, GroupConfig { descriptor: 1.0, name: "Heating Circuits", ii_max: Some(0x0A), rr_max: 0x21 }),
    (0x03, GroupConfig { descriptor: 1.0, name: "Zones", ii_max: Some(0x0A), rr_max: 0x2F }),
    (0x04, GroupConfig { descriptor: 6.0, name: "Solar Circuit", ii_max: None, rr_max: 0x40 }),
    (0x09, GroupConfig { descriptor: 1.0, name: "RoomState", ii_max: Some(0x2F), rr_max: 0x1F }),
    (0x0A, GroupConfig { descriptor: 1.0, name: "RoomSensors", ii_max: Some(0x2F), rr_max: 0x4F }),
    (0x0C, GroupConfig { descriptor: 1.0, name: "Unrecognized", ii_max: Some(0x2F), rr_max: 0x4F }),
];

/// Look up a group's static configuration.
pub fn lookup_group_config(group: u8) -> Option<GroupConfig> {
    GROUP_CONFIG.iter().find(|(g, _)| *g == group).map(|(_, cfg)| *cfg)
}

/// A group found during Phase A directory discovery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscoveredGroup {
    /// Group byte.
    pub group: u8,
    /// Directory descriptor reported for this group.
    pub descriptor: f32,
}

/// A discovered group after Phase B classification against
/// [`GROUP_CONFIG`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedGroup {
    /// Group byte.
    pub group: u8,
    /// Directory descriptor reported for this group.
    pub descriptor: f32,
    /// Group name (`"Unknown"` when not in [`GROUP_CONFIG`]).
    pub name: String,
    /// Expected descriptor from [`GROUP_CONFIG`], `None` for unknown groups.
    pub expected_descriptor: Option<f32>,
    /// Whether the reported descriptor differed from the expected one.
    pub descriptor_mismatch: bool,
}

fn parse_directory_descriptor(resp: &[u8], group: u8) -> Option<f32> {
    if resp.len() < 4 {
        log::warn!("short directory probe response for GG=0x{group:02x}: expected >=4 bytes, got {}", resp.len());
        return None;
    }
    Some(f32::from_le_bytes(resp[..4].try_into().unwrap()))
}

/// Phase A: probe GG=0x00..=0xFF via the directory probe (opcode 0x00).
///
/// Stops after two consecutive NaN descriptors. Holes (descriptor == 0.0)
/// are skipped without resetting the streak. Transport failures (timeout,
/// protocol error) and short responses are likewise skipped without
/// resetting or advancing the streak — they carry no information about
/// whether the directory has ended, only that this one probe failed.
pub fn discover_groups(transport: &mut dyn Transport, dst: u8) -> Vec<DiscoveredGroup> {
    let mut discovered = Vec::new();
    let mut nan_streak = 0u32;

    for gg in 0x00u16..=0xFF {
        let gg = gg as u8;
        let payload = build_directory_probe_payload(gg);
        let resp = match transport.send(dst, &payload) {
            Ok(resp) => resp,
            Err(_) => continue,
        };

        let Some(descriptor) = parse_directory_descriptor(&resp, gg) else {
            continue;
        };

        if descriptor == 0.0 {
            continue;
        }

        if descriptor.is_nan() {
            nan_streak += 1;
            if nan_streak >= 2 {
                log::info!("directory terminator after GG=0x{gg:02x} (NaN streak={nan_streak})");
                break;
            }
            continue;
        }

        nan_streak = 0;
        discovered.push(DiscoveredGroup { group: gg, descriptor });
    }

    discovered
}

/// Phase B: classify discovered groups against [`GROUP_CONFIG`].
///
/// Unknown groups get `name = "Unknown"` and no expected descriptor. A known
/// group whose reported descriptor doesn't match its configured value logs
/// a warning but is not otherwise treated as an error.
pub fn classify_groups(discovered: &[DiscoveredGroup]) -> Vec<ClassifiedGroup> {
    discovered
        .iter()
        .map(|group| match lookup_group_config(group.group) {
            None => ClassifiedGroup {
                group: group.group,
                descriptor: group.descriptor,
                name: "Unknown".to_string(),
                expected_descriptor: None,
                descriptor_mismatch: false,
            },
            Some(config) => {
                let mismatch = config.descriptor != group.descriptor;
                if mismatch {
                    log::warn!(
                        "Descriptor mismatch for GG=0x{:02x}: expected {}, got {}",
                        group.group,
                        config.descriptor,
                        group.descriptor
                    );
                }
                ClassifiedGroup {
                    group: group.group,
                    descriptor: group.descriptor,
                    name: config.name.to_string(),
                    expected_descriptor: Some(config.descriptor),
                    descriptor_mismatch: mismatch,
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fixture::{FixtureEntry, FixtureTransport};
    use crate::transport::{TransportError, TransportResult};

    fn directory_entry(group: u8, response_hex: &str) -> FixtureEntry {
        FixtureEntry {
            dst: 0x15,
            primary: 0xB5,
            secondary: 0x24,
            payload_hex: crate::codec::value::hex_encode(&build_directory_probe_payload(group)),
            response_hex: Some(response_hex.to_string()),
            error: None,
        }
    }

    #[test]
    fn discover_stops_after_second_nan_and_skips_holes() {
        // GG=0x00: descriptor 3.0, GG=0x01/0x02: holes (0.0), GG=0x03: descriptor 1.0,
        // GG=0x04/0x05: NaN (terminator after the second one).
        let nan_hex = crate::codec::value::hex_encode(&f32::NAN.to_le_bytes());
        let hole_hex = crate::codec::value::hex_encode(&0.0f32.to_le_bytes());
        let three_hex = crate::codec::value::hex_encode(&3.0f32.to_le_bytes());
        let one_hex = crate::codec::value::hex_encode(&1.0f32.to_le_bytes());

        let entries = vec![
            directory_entry(0x00, &three_hex),
            directory_entry(0x01, &hole_hex),
            directory_entry(0x02, &hole_hex),
            directory_entry(0x03, &one_hex),
            directory_entry(0x04, &nan_hex),
            directory_entry(0x05, &nan_hex),
        ];
        let mut transport = FixtureTransport::new(entries);

        let discovered = discover_groups(&mut transport, 0x15);
        assert_eq!(
            discovered.iter().map(|g| g.group).collect::<Vec<_>>(),
            vec![0x00, 0x03]
        );
    }

    struct FlakyTransport {
        inner: FixtureTransport,
        timeouts: Vec<u8>,
        errors: Vec<u8>,
        short_responses: Vec<u8>,
        probed_groups: Vec<u8>,
    }

    impl Transport for FlakyTransport {
        fn send_proto(&mut self, dst: u8, primary: u8, secondary: u8, payload: &[u8]) -> TransportResult<Vec<u8>> {
            if payload.first() == Some(&0x00) && payload.len() >= 2 {
                let gg = payload[1];
                self.probed_groups.push(gg);
                if self.timeouts.contains(&gg) {
                    return Err(TransportError::Timeout("boom".to_string()));
                }
                if self.errors.contains(&gg) {
                    return Err(TransportError::Protocol("nope".to_string()));
                }
                if self.short_responses.contains(&gg) {
                    return Ok(vec![0x00]);
                }
            }
            self.inner.send_proto(dst, primary, secondary, payload)
        }

        fn send_broadcast(&mut self, primary: u8, secondary: u8, payload: &[u8]) -> TransportResult<()> {
            self.inner.send_broadcast(primary, secondary, payload)
        }
    }

    #[test]
    fn transport_failures_do_not_count_toward_nan_streak() {
        let nan_hex = crate::codec::value::hex_encode(&f32::NAN.to_le_bytes());
        let hole_hex = crate::codec::value::hex_encode(&0.0f32.to_le_bytes());
        let three_hex = crate::codec::value::hex_encode(&3.0f32.to_le_bytes());
        let one_hex = crate::codec::value::hex_encode(&1.0f32.to_le_bytes());

        // Terminator NaNs live at 0x08/0x09; 0x04/0x05/0x06 are flaky and
        // must not be mistaken for terminator NaNs.
        let entries = vec![
            directory_entry(0x00, &three_hex),
            directory_entry(0x01, &hole_hex),
            directory_entry(0x02, &hole_hex),
            directory_entry(0x03, &one_hex),
            directory_entry(0x07, &hole_hex),
            directory_entry(0x08, &nan_hex),
            directory_entry(0x09, &nan_hex),
        ];
        let mut transport = FlakyTransport {
            inner: FixtureTransport::new(entries),
            timeouts: vec![0x04],
            errors: vec![0x05],
            short_responses: vec![0x06],
            probed_groups: Vec::new(),
        };

        let discovered = discover_groups(&mut transport, 0x15);
        assert_eq!(
            discovered.iter().map(|g| g.group).collect::<Vec<_>>(),
            vec![0x00, 0x03]
        );
        assert_eq!(
            transport.probed_groups,
            vec![0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09]
        );
    }

    #[test]
    fn classify_warns_on_descriptor_mismatch() {
        let classified = classify_groups(&[DiscoveredGroup { group: 0x02, descriptor: 3.0 }]);
        assert!(classified[0].descriptor_mismatch);
        assert_eq!(classified[0].expected_descriptor, Some(1.0));
    }

    #[test]
    fn classify_marks_unknown_groups() {
        let classified = classify_groups(&[DiscoveredGroup { group: 0x69, descriptor: 2.0 }]);
        assert_eq!(classified[0].name, "Unknown");
        assert_eq!(classified[0].expected_descriptor, None);
        assert!(!classified[0].descriptor_mismatch);
    }

    #[test]
    fn group_0x04_is_singleton_despite_raw_python_table_ii_max() {
        let config = lookup_group_config(0x04).unwrap();
        assert_eq!(config.descriptor, 6.0);
        assert_eq!(config.ii_max, None);
    }
}
