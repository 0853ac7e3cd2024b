//! Scan engine: orchestrates Phases A-D into a complete [`Artifact`] (§4.G).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::artifact::{Artifact, GroupEntry, InstanceEntry, Meta, RegisterEntry};
use crate::codec::b509::{build_b509_register_read_payload, merge_b509_ranges, PRIMARY_VAILLANT, SECONDARY_B509};
use crate::codec::value::hex_encode;
use crate::director::{classify_groups, discover_groups, lookup_group_config};
use crate::observer::{phase, NullObserver, ScanObserver};
use crate::plan::{build_custom_plan, build_plan_from_preset, CustomOverrides, GroupScanPlan, Preset};
use crate::presence::is_instance_present;
use crate::register::{opcode_for_group, read_register};
use crate::transport::{Transport, TransportResult};

fn hex_u8(value: u8) -> String {
    format!("0x{value:02x}")
}

fn hex_u16(value: u16) -> String {
    format!("0x{value:04x}")
}

fn now_iso8601() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Shared flag a caller (typically wired to SIGINT) can set to request a
/// scan stop at the next cooperative checkpoint, between register reads.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

struct Interrupted;

/// Phase D: scan `RR = 0x0000..=rr_max` for a present instance.
///
/// Returns `Err(Interrupted)` (and whatever registers were already read) if
/// `cancel` fired mid-sweep.
fn scan_registers_for_instance(
    transport: &mut dyn Transport,
    dst: u8,
    group: u8,
    instance: u8,
    rr_max: u8,
    observer: &mut dyn ScanObserver,
    cancel: &CancellationToken,
) -> (BTreeMap<String, RegisterEntry>, Option<Interrupted>) {
    let opcode = opcode_for_group(group);
    let mut registers = BTreeMap::new();

    for rr in 0x0000u16..=rr_max as u16 {
        if cancel.is_cancelled() {
            return (registers, Some(Interrupted));
        }
        if rr % 8 == 0 {
            observer.status(&format!("Read GG=0x{group:02x} II=0x{instance:02x} RR=0x{rr:04x}"));
        }
        observer.phase_advance(phase::REGISTER_SCAN, 1);
        registers.insert(hex_u16(rr), read_register(transport, dst, opcode, group, instance, rr, None));
    }

    (registers, None)
}

/// Build a [`ScanPlan`]-equivalent (§4.H) for `classified` under `preset`,
/// running Phase C presence probes for instanced groups along the way.
fn plan_groups(
    transport: &mut dyn Transport,
    dst: u8,
    classified: &[crate::director::ClassifiedGroup],
    preset: Preset,
    overrides: &CustomOverrides,
    observer: &mut dyn ScanObserver,
) -> (Vec<crate::plan::PlannerGroup>, BTreeMap<u8, GroupScanPlan>) {
    observer.phase_start(phase::INSTANCE_DISCOVERY, classified.len() as u64);

    let planner_groups: Vec<crate::plan::PlannerGroup> = classified
        .iter()
        .map(|group| {
            let present_instances = if group.descriptor == 1.0 {
                let ii_max = lookup_group_config(group.group).and_then(|c| c.ii_max).unwrap_or(0x2F);
                (0x00..=ii_max)
                    .filter(|&ii| is_instance_present(transport, dst, group.group, ii))
                    .collect()
            } else {
                Vec::new()
            };
            observer.phase_advance(phase::INSTANCE_DISCOVERY, 1);
            crate::plan::PlannerGroup::from_classified(group, present_instances)
        })
        .collect();
    observer.phase_finish(phase::INSTANCE_DISCOVERY);

    let plan = match preset {
        Preset::Custom => build_custom_plan(&planner_groups, overrides),
        other => build_plan_from_preset(&planner_groups, other),
    };
    (planner_groups, plan)
}

/// Run a full B524 scan against `dst` and return a complete artifact
/// (§4.G): Phase A/B discovery and classification, Phase C presence, Phase D
/// register sweep, under the group/instance selection `plan` resolves.
///
/// `cancel` is polled between register reads; when set, the returned
/// artifact carries every register read so far with `meta.incomplete = true`
/// and `meta.incomplete_reason = "user_interrupt"`.
pub fn scan_b524(
    transport: &mut dyn Transport,
    dst: u8,
    preset: Preset,
    overrides: &CustomOverrides,
    scan_absent: bool,
    observer: &mut dyn ScanObserver,
    cancel: &CancellationToken,
) -> Artifact {
    let start = Instant::now();
    let scan_timestamp = now_iso8601();

    let mut artifact = Artifact {
        meta: Meta { scan_timestamp, destination_address: hex_u8(dst), ..Default::default() },
        groups: BTreeMap::new(),
        b509_dump: None,
    };

    let mut incomplete_reason: Option<&'static str> = None;

    'scan: {
        observer.phase_start(phase::GROUP_DISCOVERY, 0x100);
        let discovered = discover_groups(transport, dst);
        observer.phase_finish(phase::GROUP_DISCOVERY);
        if cancel.is_cancelled() {
            incomplete_reason = Some("user_interrupt");
            break 'scan;
        }

        let classified = classify_groups(&discovered);
        let (_planner_groups, plan) = plan_groups(transport, dst, &classified, preset, overrides, observer);

        let total_registers: u64 = plan.values().map(|p| p.instances.len() as u64 * (p.rr_max as u64 + 1)).sum();
        observer.phase_start(phase::REGISTER_SCAN, total_registers);

        for group in &classified {
            let group_key = hex_u8(group.group);
            let mut group_entry = GroupEntry { name: group.name.clone(), descriptor_type: group.descriptor, instances: BTreeMap::new() };

            if let Some(group_plan) = plan.get(&group.group) {
                for &ii in &group_plan.instances {
                    if cancel.is_cancelled() {
                        artifact.groups.insert(group_key.clone(), group_entry);
                        incomplete_reason = Some("user_interrupt");
                        break 'scan;
                    }
                    let present = group.descriptor != 1.0 || scan_absent || is_instance_present(transport, dst, group.group, ii);
                    let mut instance_entry = InstanceEntry { present, registers: BTreeMap::new() };
                    if present {
                        let (registers, interrupted) = scan_registers_for_instance(
                            transport,
                            dst,
                            group.group,
                            ii,
                            group_plan.rr_max,
                            observer,
                            cancel,
                        );
                        instance_entry.registers = registers;
                        if interrupted.is_some() {
                            group_entry.instances.insert(hex_u8(ii), instance_entry);
                            artifact.groups.insert(group_key.clone(), group_entry);
                            incomplete_reason = Some("user_interrupt");
                            break 'scan;
                        }
                    }
                    group_entry.instances.insert(hex_u8(ii), instance_entry);
                }
            }

            artifact.groups.insert(group_key, group_entry);
        }
        observer.phase_finish(phase::REGISTER_SCAN);
    }

    artifact.meta.scan_duration_seconds = (start.elapsed().as_secs_f64() * 10000.0).round() / 10000.0;
    if let Some(reason) = incomplete_reason {
        artifact.meta.incomplete = true;
        artifact.meta.incomplete_reason = Some(reason.to_string());
    }
    artifact
}

/// Scan a flat range of B509 registers and return a JSON-serializable dump
/// (§4.G), merging overlapping/adjacent ranges first.
pub fn scan_b509(
    transport: &mut dyn Transport,
    dst: u8,
    ranges: &[(u16, u16)],
    observer: &mut dyn ScanObserver,
    cancel: &CancellationToken,
) -> serde_json::Value {
    let start = Instant::now();
    let merged = merge_b509_ranges(ranges);
    let total_reads: u64 = merged.iter().map(|&(lo, hi)| (hi - lo + 1) as u64).sum();

    let mut read_count = 0u64;
    let mut error_count = 0u64;
    let mut incomplete = false;
    let mut incomplete_reason: Option<&'static str> = None;
    let mut registers = serde_json::Map::new();

    observer.phase_start("b509_dump", total_reads.max(1));
    transport.trace_label("B509 Register Dump");

    'scan: for &(lo, hi) in &merged {
        transport.trace_label(&format!("B509 range {}..{}", hex_u16(lo), hex_u16(hi)));
        for register in lo..=hi {
            if cancel.is_cancelled() {
                incomplete = true;
                incomplete_reason = Some("user_interrupt");
                break 'scan;
            }
            observer.status(&format!("B509 read RR={}", hex_u16(register)));
            observer.phase_advance("b509_dump", 1);

            let payload = build_b509_register_read_payload(register);
            let (reply_hex, error) = match transport.send_proto(dst, PRIMARY_VAILLANT, SECONDARY_B509, &payload) {
                Ok(response) => (Some(hex_encode(&response)), None),
                Err(e) => (None, Some(e.to_string())),
            };

            read_count += 1;
            if error.is_some() {
                error_count += 1;
            }

            registers.insert(
                hex_u16(register),
                serde_json::json!({
                    "addr": hex_u16(register),
                    "op": "0x0d",
                    "reply_hex": reply_hex.clone(),
                    "raw_hex": reply_hex,
                    "type": serde_json::Value::Null,
                    "value": serde_json::Value::Null,
                    "error": error,
                    "ebusd_name": serde_json::Value::Null,
                    "myvaillant_name": serde_json::Value::Null,
                }),
            );
        }
    }
    observer.phase_finish("b509_dump");

    serde_json::json!({
        "meta": {
            "scan_timestamp": now_iso8601(),
            "scan_duration_seconds": (start.elapsed().as_secs_f64() * 10000.0).round() / 10000.0,
            "ranges": merged.iter().map(|&(lo, hi)| format!("{}..{}", hex_u16(lo), hex_u16(hi))).collect::<Vec<_>>(),
            "read_count": read_count,
            "error_count": error_count,
            "incomplete": incomplete,
            "incomplete_reason": incomplete_reason,
        },
        "devices": {
            hex_u8(dst): { "registers": registers },
        },
    })
}

/// Issue a broadcast identification round (§4.J/§6): a fire-and-forget
/// directory probe for `GG=0x00` sent to [`crate::transport::BROADCAST_DESTINATION`],
/// used by the `discover` CLI command to wake/announce devices before reading
/// the daemon's own address table.
pub fn broadcast_identification_round(transport: &mut dyn Transport) -> TransportResult<()> {
    let payload = crate::codec::selector::build_directory_probe_payload(0x00);
    transport.send_broadcast(crate::transport::PRIMARY_VAILLANT, crate::transport::SECONDARY_EXTENDED_REGISTER, &payload)
}

/// Default artifact file name: `b524_scan_<DST>_<ISO8601-no-colons>.json`.
pub fn default_output_filename(dst: u8, scan_timestamp: &str) -> String {
    format!("b524_scan_{}_{}.json", hex_u8(dst), scan_timestamp.replace(':', ""))
}

/// A [`ScanObserver`] that never renders anything, for callers that don't
/// need progress reporting.
pub fn silent_observer() -> NullObserver {
    NullObserver
}
