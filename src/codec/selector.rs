//! B524 selector parsing and payload construction (§4.A).
//!
//! The daemon's CSV export encodes a request's raw payload bytes as hex in
//! an `id` column, typically prefixed `b524,`. [`Selector::parse`] turns
//! that hex string into a typed selector; the `build_*` functions go the
//! other way, producing the payload bytes the scan engine sends over the
//! wire.

use crate::error::{Error, Result};

const DIRECTORY_SELECTOR_LEN: usize = 3;
const METADATA_SELECTOR_LEN: usize = 5;
const REGISTER_SELECTOR_LEN: usize = 6;
const TIMER_SELECTOR_LEN: usize = 5;

/// A parsed B524 id selector, dispatched by opcode family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// `00 <GG> 00`: directory probe.
    Directory {
        /// Group byte.
        group: u8,
    },
    /// `01 <GG> <II> <RR_LO> <RR_HI>`: metadata probe.
    Metadata {
        /// Group byte.
        group: u8,
        /// Instance byte.
        instance: u8,
        /// Register id, decoded little-endian.
        register: u16,
    },
    /// `<opcode> <optype> <GG> <II> <RR_LO> <RR_HI>`: local (0x02) or remote
    /// (0x06) register read/write.
    Register {
        /// 0x02 (local) or 0x06 (remote).
        opcode: u8,
        /// 0x00 (read) or 0x01 (write).
        optype: u8,
        /// Group byte.
        group: u8,
        /// Instance byte.
        instance: u8,
        /// Register id, decoded little-endian.
        register: u16,
    },
    /// `<opcode> <SEL1> <SEL2> <SEL3> <WEEKDAY>`: timer read (0x03) or write
    /// (0x04).
    Timer {
        /// 0x03 (read) or 0x04 (write).
        opcode: u8,
        /// Three selector tuple bytes.
        selector: (u8, u8, u8),
        /// 0x00..=0x06 (Monday..Sunday).
        weekday: u8,
    },
}

fn strip_prefixes(id_hex: &str) -> &str {
    let trimmed = id_hex.trim();
    let without_csv_prefix = if trimmed.len() >= 5 && trimmed[..5].eq_ignore_ascii_case("b524,") {
        trimmed[5..].trim()
    } else {
        trimmed
    };
    without_csv_prefix
        .strip_prefix("0x")
        .or_else(|| without_csv_prefix.strip_prefix("0X"))
        .unwrap_or(without_csv_prefix)
}

impl Selector {
    /// Parse a selector from its CSV `id` hex string (§4.A).
    ///
    /// Accepts an optional leading `b524,` and an optional `0x`/`0X` prefix,
    /// both case-insensitively for the former.
    pub fn parse(id_hex: &str) -> Result<Selector> {
        let normalized = strip_prefixes(id_hex);
        let payload = super::value::hex_decode(normalized)
            .map_err(|_| Error::SelectorHex(id_hex.to_string()))?;

        let opcode = *payload.first().ok_or(Error::SelectorHex(id_hex.to_string()))?;

        match opcode {
            0x00 => {
                if payload.len() != DIRECTORY_SELECTOR_LEN {
                    return Err(Error::SelectorLength {
                        opcode,
                        expected: DIRECTORY_SELECTOR_LEN,
                        got: payload.len(),
                    });
                }
                if payload[2] != 0x00 {
                    return Err(Error::SelectorField {
                        field: "trailer",
                        detail: format!("opcode 0x00 expects final byte 0x00, got 0x{:02x}", payload[2]),
                    });
                }
                Ok(Selector::Directory { group: payload[1] })
            }
            0x02 | 0x06 => {
                if payload.len() != REGISTER_SELECTOR_LEN {
                    return Err(Error::SelectorLength {
                        opcode,
                        expected: REGISTER_SELECTOR_LEN,
                        got: payload.len(),
                    });
                }
                let optype = payload[1];
                if optype != 0x00 && optype != 0x01 {
                    return Err(Error::SelectorField {
                        field: "optype",
                        detail: format!("expected 0x00 (read) or 0x01 (write), got 0x{optype:02x}"),
                    });
                }
                let register = u16::from_le_bytes([payload[4], payload[5]]);
                Ok(Selector::Register {
                    opcode,
                    optype,
                    group: payload[2],
                    instance: payload[3],
                    register,
                })
            }
            0x03 | 0x04 => {
                if payload.len() != TIMER_SELECTOR_LEN {
                    return Err(Error::SelectorLength {
                        opcode,
                        expected: TIMER_SELECTOR_LEN,
                        got: payload.len(),
                    });
                }
                let weekday = payload[4];
                if weekday > 0x06 {
                    return Err(Error::SelectorField {
                        field: "weekday",
                        detail: format!("must be 0x00..=0x06, got 0x{weekday:02x}"),
                    });
                }
                Ok(Selector::Timer {
                    opcode,
                    selector: (payload[1], payload[2], payload[3]),
                    weekday,
                })
            }
            0x01 => {
                if payload.len() != METADATA_SELECTOR_LEN {
                    return Err(Error::SelectorLength {
                        opcode,
                        expected: METADATA_SELECTOR_LEN,
                        got: payload.len(),
                    });
                }
                let register = u16::from_le_bytes([payload[3], payload[4]]);
                Ok(Selector::Metadata {
                    group: payload[1],
                    instance: payload[2],
                    register,
                })
            }
            other => Err(Error::UnknownOpcode(other)),
        }
    }
}

/// Build a directory probe payload: `00 <GG> 00`.
pub fn build_directory_probe_payload(group: u8) -> Vec<u8> {
    vec![0x00, group, 0x00]
}

/// Build a metadata probe payload: `01 <GG> <II> <RR_LO> <RR_HI>`.
pub fn build_metadata_probe_payload(group: u8, instance: u8, register: u16) -> Vec<u8> {
    let reg = register.to_le_bytes();
    vec![0x01, group, instance, reg[0], reg[1]]
}

fn build_register_payload(opcode: u8, optype: u8, group: u8, instance: u8, register: u16) -> Result<Vec<u8>> {
    if opcode != 0x02 && opcode != 0x06 {
        return Err(Error::SelectorField {
            field: "opcode",
            detail: format!("must be 0x02 or 0x06, got 0x{opcode:02x}"),
        });
    }
    let reg = register.to_le_bytes();
    Ok(vec![opcode, optype, group, instance, reg[0], reg[1]])
}

/// Build a register read payload: `<opcode> 0x00 <GG> <II> <RR_LO> <RR_HI>`.
///
/// `opcode` must be 0x02 (local) or 0x06 (remote); any other value is a
/// caller bug, not a runtime condition, since every call site in this crate
/// picks the opcode from [`crate::presence::opcode_for_group`].
pub fn build_register_read_payload(opcode: u8, group: u8, instance: u8, register: u16) -> Result<Vec<u8>> {
    build_register_payload(opcode, 0x00, group, instance, register)
}

/// Build a register write payload: `<opcode> 0x01 <GG> <II> <RR_LO> <RR_HI>`.
///
/// Same opcode constraint as [`build_register_read_payload`]. The write
/// value itself is not part of the selector; it is appended by the caller
/// as trailing payload bytes per the target register's type.
pub fn build_register_write_payload(opcode: u8, group: u8, instance: u8, register: u16) -> Result<Vec<u8>> {
    build_register_payload(opcode, 0x01, group, instance, register)
}

fn build_timer_payload(opcode: u8, selector: (u8, u8, u8), weekday: u8) -> Result<Vec<u8>> {
    if weekday > 0x06 {
        return Err(Error::SelectorField {
            field: "weekday",
            detail: format!("must be 0x00..=0x06, got 0x{weekday:02x}"),
        });
    }
    Ok(vec![opcode, selector.0, selector.1, selector.2, weekday])
}

/// Build a timer read payload: `03 <SEL1> <SEL2> <SEL3> <WEEKDAY>`.
pub fn build_timer_read_payload(selector: (u8, u8, u8), weekday: u8) -> Result<Vec<u8>> {
    build_timer_payload(0x03, selector, weekday)
}

/// Build a timer write payload: `04 <SEL1> <SEL2> <SEL3> <WEEKDAY>`.
pub fn build_timer_write_payload(selector: (u8, u8, u8), weekday: u8) -> Result<Vec<u8>> {
    build_timer_payload(0x04, selector, weekday)
}
