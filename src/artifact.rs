//! Scan artifact schema and validator (§4.I).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::value;

/// One register's scan result.
///
/// `error` carries a human-readable failure reason (`"timeout"`,
/// `"transport_error: ..."`, `"decode_error: ..."`, `"parse_error: ..."`,
/// or `"status_only_response: 0xTT"`); when set, `raw_hex`/`type`/`value`
/// are left `None` and are not cross-checked by [`validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegisterEntry {
    /// Full raw reply payload (after daemon length-prefix stripping), hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_hex: Option<String>,
    /// Leading TT byte of the reply, if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tt: Option<u8>,
    /// Interpretation of `tt` (`"no_data"`, `"live"`, `"parameter_limit"`,
    /// `"parameter_config"`, `"unknown"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tt_kind: Option<String>,
    /// Register name from an ebusd CSV schema, when one was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebusd_name: Option<String>,
    /// Register name from a myVAILLANT schema mapping, when one was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub myvaillant_name: Option<String>,
    /// Value bytes after stripping the echoed header, hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_hex: Option<String>,
    /// Type spec used to decode `raw_hex` (explicit hint, or inferred).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_spec: Option<String>,
    /// Decoded value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Failure reason, `None` on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Registers for one instance, keyed by `"0xRRRR"`.
pub type InstanceRegisters = BTreeMap<String, RegisterEntry>;

/// One group's scanned instances.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupEntry {
    /// Group name (`"Unknown"` for groups absent from the static table).
    pub name: String,
    /// Directory descriptor reported for this group.
    pub descriptor_type: f32,
    /// Instances, keyed by `"0xII"`.
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceEntry>,
}

/// One instance's presence and (if present) scanned registers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InstanceEntry {
    /// Whether the presence heuristic found this instance populated.
    pub present: bool,
    /// Registers, keyed by `"0xRRRR"`. Absent or partial when `present` is
    /// `false` or a scan was interrupted mid-instance.
    #[serde(default, skip_serializing_if = "InstanceRegisters::is_empty")]
    pub registers: InstanceRegisters,
}

/// Artifact-level metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Meta {
    /// UTC scan start timestamp, `%Y-%m-%dT%H:%M:%SZ`.
    pub scan_timestamp: String,
    /// Wall-clock scan duration, seconds.
    pub scan_duration_seconds: f64,
    /// Destination address, `"0xDD"`.
    pub destination_address: String,
    /// Schema sources consulted while annotating register names (always
    /// present, possibly empty).
    #[serde(default)]
    pub schema_sources: Vec<String>,
    /// Set when the scan was interrupted before completion.
    #[serde(default)]
    pub incomplete: bool,
    /// Reason for an incomplete scan (e.g. `"user_interrupt"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incomplete_reason: Option<String>,
    /// Daemon host, when scanning over TCP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebusd_host: Option<String>,
    /// Daemon port, when scanning over TCP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebusd_port: Option<u16>,
}

/// A complete scan artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    /// Scan metadata.
    pub meta: Meta,
    /// Scanned groups, keyed by `"0xGG"`.
    #[serde(default)]
    pub groups: BTreeMap<String, GroupEntry>,
    /// Present only when a `b509-dump` ran alongside the scan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b509_dump: Option<serde_json::Value>,
}

fn parse_hex_key(key: &str) -> Option<i64> {
    let trimmed = key.trim();
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        trimmed.parse().ok()
    }
}

/// Validate an artifact's internal consistency (§4.I): reply/raw/group/
/// register key agreement, and that each entry's stored `value` matches
/// re-decoding `raw_hex` under `type`. Returns every violation found (does
/// not stop at the first).
pub fn validate(artifact: &Artifact) -> Vec<String> {
    let mut errors = Vec::new();

    for (group_key, group_obj) in &artifact.groups {
        for (instance_key, instance_obj) in &group_obj.instances {
            for (rr_key, entry) in &instance_obj.registers {
                let loc = format!("{group_key}/{instance_key}/{rr_key}");
                let Some(gg) = parse_hex_key(group_key) else {
                    errors.push(format!("{loc}: invalid group key"));
                    continue;
                };
                let Some(rr) = parse_hex_key(rr_key) else {
                    errors.push(format!("{loc}: invalid register key"));
                    continue;
                };

                if let Some(reply_hex) = entry.reply_hex.as_deref().filter(|s| !s.is_empty()) {
                    validate_reply_hex(&loc, reply_hex, entry, gg, rr, &mut errors);
                }

                if entry.error.is_some() {
                    continue;
                }

                if let (Some(type_spec), Some(raw_hex)) =
                    (entry.type_spec.as_deref(), entry.raw_hex.as_deref().filter(|s| !s.is_empty()))
                {
                    validate_value(&loc, type_spec, raw_hex, entry.value.as_ref(), &mut errors);
                }
            }
        }
    }

    errors
}

fn validate_reply_hex(loc: &str, reply_hex: &str, entry: &RegisterEntry, gg: i64, rr: i64, errors: &mut Vec<String>) {
    let Ok(reply) = value::hex_decode(reply_hex) else {
        errors.push(format!("{loc}: invalid reply_hex"));
        return;
    };

    if reply.len() == 1 {
        if entry.raw_hex.as_deref().is_some_and(|s| !s.is_empty()) {
            errors.push(format!("{loc}: status-only reply but raw_hex is present"));
        }
        return;
    }

    if reply.len() < 4 {
        return;
    }
    let Some(raw_hex) = entry.raw_hex.as_deref() else {
        return;
    };
    let Ok(raw) = value::hex_decode(raw_hex) else {
        errors.push(format!("{loc}: invalid raw_hex"));
        return;
    };

    if !raw.is_empty() && reply[4..] != raw[..] {
        errors.push(format!("{loc}: reply_hex tail mismatch raw_hex"));
    }
    if reply[1] as i64 != (gg & 0xFF) {
        errors.push(format!("{loc}: reply_hex GG mismatch ({:02x})", reply[1]));
    }
    let rr_le = (rr as u16).to_le_bytes();
    if reply[2..4] != rr_le {
        errors.push(format!("{loc}: reply_hex RR mismatch ({})", value::hex_encode(&reply[2..4])));
    }
}

fn validate_value(loc: &str, type_spec: &str, raw_hex: &str, value: Option<&serde_json::Value>, errors: &mut Vec<String>) {
    let Ok(value_bytes) = crate::codec::value::hex_decode(raw_hex) else {
        errors.push(format!("{loc}: invalid raw_hex for parsing"));
        return;
    };
    let parsed = match crate::codec::value::decode(type_spec, &value_bytes) {
        Ok(v) => v,
        Err(e) => {
            errors.push(format!("{loc}: parse_typed_value failed: {e}"));
            return;
        }
    };

    match &parsed {
        crate::codec::value::Value::Exp(None) => {
            if !matches!(value, None | Some(serde_json::Value::Null)) {
                errors.push(format!("{loc}: expected null value, got {value:?}"));
            }
        }
        crate::codec::value::Value::Exp(Some(expected)) => match value.and_then(|v| v.as_f64()) {
            Some(got) if (got - *expected as f64).abs() <= 1e-6 + 1e-6 * (*expected as f64).abs() => {}
            Some(got) => errors.push(format!("{loc}: float mismatch expected={expected} got={got}")),
            None => errors.push(format!("{loc}: expected numeric float, got {value:?}")),
        },
        other => {
            let expected_json = other.to_json();
            if value != Some(&expected_json) {
                errors.push(format!(
                    "{loc}: value mismatch type={type_spec} expected={expected_json:?} got={value:?}"
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact_with_entry(group: &str, instance: &str, register: &str, entry: RegisterEntry) -> Artifact {
        let mut registers = InstanceRegisters::new();
        registers.insert(register.to_string(), entry);
        let mut instances = BTreeMap::new();
        instances.insert(instance.to_string(), InstanceEntry { present: true, registers });
        let mut groups = BTreeMap::new();
        groups.insert(group.to_string(), GroupEntry { name: "Heating Circuits".to_string(), descriptor_type: 1.0, instances });
        Artifact { meta: Meta::default(), groups, b509_dump: None }
    }

    #[test]
    fn valid_entry_produces_no_errors() {
        let entry = RegisterEntry {
            reply_hex: Some("01021600cdcc0c40".to_string()),
            raw_hex: Some("cdcc0c40".to_string()),
            type_spec: Some("EXP".to_string()),
            value: Some(serde_json::json!(2.2)),
            ..Default::default()
        };
        let artifact = artifact_with_entry("0x02", "0x00", "0x0016", entry);
        assert!(validate(&artifact).is_empty());
    }

    #[test]
    fn detects_group_mismatch_in_reply_hex() {
        let entry = RegisterEntry {
            reply_hex: Some("01031600cdcc0c40".to_string()), // GG byte is 0x03, not 0x02
            raw_hex: Some("cdcc0c40".to_string()),
            type_spec: Some("EXP".to_string()),
            value: Some(serde_json::json!(2.2)),
            ..Default::default()
        };
        let artifact = artifact_with_entry("0x02", "0x00", "0x0016", entry);
        let errors = validate(&artifact);
        assert!(errors.iter().any(|e| e.contains("GG mismatch")));
    }

    #[test]
    fn detects_register_mismatch_in_reply_hex() {
        let entry = RegisterEntry {
            reply_hex: Some("0102ff00cdcc0c40".to_string()), // RR bytes should be 1600
            raw_hex: Some("cdcc0c40".to_string()),
            type_spec: Some("EXP".to_string()),
            value: Some(serde_json::json!(2.2)),
            ..Default::default()
        };
        let artifact = artifact_with_entry("0x02", "0x00", "0x0016", entry);
        let errors = validate(&artifact);
        assert!(errors.iter().any(|e| e.contains("RR mismatch")));
    }

    #[test]
    fn status_only_reply_with_raw_hex_is_an_error() {
        let entry = RegisterEntry {
            reply_hex: Some("00".to_string()),
            raw_hex: Some("aabb".to_string()),
            ..Default::default()
        };
        let artifact = artifact_with_entry("0x02", "0x00", "0x0016", entry);
        let errors = validate(&artifact);
        assert!(errors.iter().any(|e| e.contains("status-only reply but raw_hex is present")));
    }

    #[test]
    fn entries_with_error_skip_value_validation() {
        let entry = RegisterEntry {
            raw_hex: Some("ff".to_string()),
            type_spec: Some("UCH".to_string()),
            value: Some(serde_json::json!(1)), // wrong, but ignored because error is set
            error: Some("timeout".to_string()),
            ..Default::default()
        };
        let artifact = artifact_with_entry("0x02", "0x00", "0x0016", entry);
        assert!(validate(&artifact).is_empty());
    }

    #[test]
    fn detects_value_mismatch() {
        let entry = RegisterEntry {
            raw_hex: Some("05".to_string()),
            type_spec: Some("UCH".to_string()),
            value: Some(serde_json::json!(6)),
            ..Default::default()
        };
        let artifact = artifact_with_entry("0x02", "0x00", "0x0016", entry);
        let errors = validate(&artifact);
        assert!(errors.iter().any(|e| e.contains("value mismatch")));
    }

    #[test]
    fn nan_exp_requires_null_value() {
        let entry = RegisterEntry {
            raw_hex: Some(value::hex_encode(&f32::NAN.to_le_bytes())),
            type_spec: Some("EXP".to_string()),
            value: Some(serde_json::json!(1.0)),
            ..Default::default()
        };
        let artifact = artifact_with_entry("0x02", "0x00", "0x0016", entry);
        let errors = validate(&artifact);
        assert!(errors.iter().any(|e| e.contains("expected null value")));
    }

    #[test]
    fn detects_invalid_group_key() {
        let artifact = artifact_with_entry("not-hex", "0x00", "0x0016", RegisterEntry::default());
        let errors = validate(&artifact);
        assert!(errors.iter().any(|e| e.contains("invalid group key")));
    }
}
