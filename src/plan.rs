//! Scan planning: preset-driven group/instance selection and the
//! integer-set override mini-language (§4.H).

use std::collections::BTreeMap;

use crate::director::{lookup_group_config, ClassifiedGroup};
use crate::error::{Error, Result};

/// Synthetic defaults applied to unknown groups under the `aggressive`
/// preset, or when a `custom` override explicitly adds one (§4.H).
pub const UNKNOWN_GROUP_DEFAULT_II_MAX: u8 = 0x0A;
/// See [`UNKNOWN_GROUP_DEFAULT_II_MAX`].
pub const UNKNOWN_GROUP_DEFAULT_RR_MAX: u8 = 0x30;

/// A classified group plus the planner's view of it: whether it's known,
/// and (for known instanced groups) which instances responded present.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerGroup {
    /// Group byte.
    pub group: u8,
    /// Display name (`"Unknown"` for unrecognized groups).
    pub name: String,
    /// Directory descriptor.
    pub descriptor: f32,
    /// Whether this group is in [`crate::director::GROUP_CONFIG`].
    pub known: bool,
    /// Maximum instance index, `None` for singleton groups.
    pub ii_max: Option<u8>,
    /// Maximum register id within an instance.
    pub rr_max: u8,
    /// Instances that responded present during Phase C (only meaningful
    /// when `ii_max.is_some()`).
    pub present_instances: Vec<u8>,
}

impl PlannerGroup {
    /// Build a [`PlannerGroup`] from a classified group, consulting
    /// [`crate::director::GROUP_CONFIG`] for known groups and falling back
    /// to the unknown-group synthetic defaults otherwise.
    pub fn from_classified(classified: &ClassifiedGroup, present_instances: Vec<u8>) -> PlannerGroup {
        match lookup_group_config(classified.group) {
            Some(config) => PlannerGroup {
                group: classified.group,
                name: config.name.to_string(),
                descriptor: classified.descriptor,
                known: true,
                ii_max: config.ii_max,
                rr_max: config.rr_max,
                present_instances,
            },
            None => PlannerGroup {
                group: classified.group,
                name: classified.name.clone(),
                descriptor: classified.descriptor,
                known: false,
                ii_max: Some(UNKNOWN_GROUP_DEFAULT_II_MAX),
                rr_max: UNKNOWN_GROUP_DEFAULT_RR_MAX,
                present_instances,
            },
        }
    }
}

/// Which instances a preset would scan for `group` (§4.H).
fn instances_for_preset(group: &PlannerGroup, preset: Preset) -> Vec<u8> {
    let Some(ii_max) = group.ii_max else {
        return vec![0x00];
    };
    match preset {
        Preset::Conservative => group.present_instances.clone(),
        _ => (0x00..=ii_max).collect(),
    }
}

/// A planner preset (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Known groups only, present-instance slots only.
    Conservative,
    /// Known groups only, all instance slots (the default preset).
    Recommended,
    /// Every group including unknown ones (with synthetic defaults), all
    /// instance slots.
    Aggressive,
    /// Seeded from `recommended`, then overridden by the caller.
    Custom,
}

/// A fully resolved per-group scan plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupScanPlan {
    /// Group byte.
    pub group: u8,
    /// Maximum register id to sweep.
    pub rr_max: u8,
    /// Instances to sweep, in ascending order.
    pub instances: Vec<u8>,
}

impl GroupScanPlan {
    /// Render this plan's metadata for the artifact's `meta` block.
    pub fn to_meta(&self) -> serde_json::Value {
        serde_json::json!({
            "rr_max": format!("0x{:04x}", self.rr_max),
            "instances": self.instances.iter().map(|ii| format!("0x{ii:02x}")).collect::<Vec<_>>(),
        })
    }
}

/// Build a scan plan for every eligible group under `preset` (§4.H).
///
/// Unknown groups are skipped unless `preset` is [`Preset::Aggressive`].
pub fn build_plan_from_preset(groups: &[PlannerGroup], preset: Preset) -> BTreeMap<u8, GroupScanPlan> {
    let mut sorted: Vec<&PlannerGroup> = groups.iter().collect();
    sorted.sort_by_key(|g| g.group);

    let mut selected = BTreeMap::new();
    for group in sorted {
        if preset != Preset::Aggressive && !group.known {
            continue;
        }
        selected.insert(
            group.group,
            GroupScanPlan {
                group: group.group,
                rr_max: group.rr_max,
                instances: instances_for_preset(group, preset),
            },
        );
    }
    selected
}

/// Caller-supplied overrides applied on top of a `recommended`-equivalent
/// base plan to build a `custom` plan.
#[derive(Debug, Clone, Default)]
pub struct CustomOverrides {
    /// Explicit group set to scan. `None` keeps the base (known-groups-only)
    /// selection.
    pub groups: Option<Vec<u8>>,
    /// Per-group instance overrides.
    pub instances: BTreeMap<u8, Vec<u8>>,
    /// Per-group `rr_max` overrides.
    pub rr_max: BTreeMap<u8, u8>,
}

/// Build a `custom` plan: start from the `recommended`-equivalent selection
/// (all instance slots, known groups only), then apply `overrides`.
///
/// A group named in `overrides.groups` that wasn't otherwise selected is
/// added using its [`PlannerGroup`] defaults (or the unknown-group synthetic
/// defaults, since [`PlannerGroup::from_classified`] already applied those).
pub fn build_custom_plan(groups: &[PlannerGroup], overrides: &CustomOverrides) -> BTreeMap<u8, GroupScanPlan> {
    let mut selected = build_plan_from_preset(groups, Preset::Custom);

    if let Some(wanted) = &overrides.groups {
        let by_group: BTreeMap<u8, &PlannerGroup> = groups.iter().map(|g| (g.group, g)).collect();
        let mut next = BTreeMap::new();
        for &gg in wanted {
            let plan = selected.remove(&gg).or_else(|| {
                by_group.get(&gg).map(|group| GroupScanPlan {
                    group: gg,
                    rr_max: group.rr_max,
                    instances: instances_for_preset(group, Preset::Custom),
                })
            });
            if let Some(plan) = plan {
                next.insert(gg, plan);
            }
        }
        selected = next;
    }

    for (&gg, instances) in &overrides.instances {
        if let Some(plan) = selected.get_mut(&gg) {
            plan.instances = instances.clone();
        }
    }
    for (&gg, &rr_max) in &overrides.rr_max {
        if let Some(plan) = selected.get_mut(&gg) {
            plan.rr_max = rr_max;
        }
    }

    selected
}

/// Sum of `len(instances) * (rr_max + 1)` across every planned group.
pub fn estimate_register_requests(plan: &BTreeMap<u8, GroupScanPlan>) -> u64 {
    plan.values()
        .map(|p| p.instances.len() as u64 * (p.rr_max as u64 + 1))
        .sum()
}

/// Estimated wall-clock time to run `requests` requests at `request_rate_rps`.
/// `None` when no rate is given or the rate is non-positive.
pub fn estimate_eta_seconds(requests: u64, request_rate_rps: Option<f64>) -> Option<f64> {
    let rate = request_rate_rps?;
    if rate <= 0.0 {
        return None;
    }
    Some(requests as f64 / rate)
}

fn is_hex_digit_ascii(ch: char) -> bool {
    ch.is_ascii_hexdigit()
}

/// Parse a single integer token: decimal digits, a `0x`/`0X`-prefixed hex
/// literal, or bare hex digits (in that precedence order) (§4.H).
pub fn parse_int_token(token: &str) -> Result<i64> {
    let raw = token.trim();
    if raw.is_empty() {
        return Err(Error::IntToken(token.to_string()));
    }
    let lowered = raw.to_lowercase();
    if let Some(hex) = lowered.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).map_err(|_| Error::IntToken(token.to_string()));
    }
    if raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.parse().map_err(|_| Error::IntToken(token.to_string()));
    }
    if raw.chars().all(is_hex_digit_ascii) {
        return i64::from_str_radix(raw, 16).map_err(|_| Error::IntToken(token.to_string()));
    }
    Err(Error::IntToken(token.to_string()))
}

/// Parse a comma-separated set of integers and `lo-hi` ranges, bounded by
/// `[min_value, max_value]` (§4.H). Descending ranges are auto-swapped.
/// Returns the sorted, deduplicated result.
pub fn parse_int_set(spec: &str, min_value: i64, max_value: i64) -> Result<Vec<i64>> {
    if min_value > max_value {
        return Err(Error::Config("min_value must be <= max_value".to_string()));
    }
    let raw = spec.trim();
    if raw.is_empty() {
        return Err(Error::Config("empty set specification".to_string()));
    }

    let mut result = std::collections::BTreeSet::new();
    for part in raw.split(',') {
        let token = part.trim();
        if token.is_empty() {
            continue;
        }
        let check_range = |value: i64| -> Result<()> {
            if value < min_value || value > max_value {
                Err(Error::IntRange { value, min: min_value, max: max_value })
            } else {
                Ok(())
            }
        };
        if let Some((lo_str, hi_str)) = token.split_once('-') {
            let a = parse_int_token(lo_str)?;
            let b = parse_int_token(hi_str)?;
            let (start, end) = if a > b { (b, a) } else { (a, b) };
            for value in start..=end {
                check_range(value)?;
                result.insert(value);
            }
            continue;
        }
        let value = parse_int_token(token)?;
        check_range(value)?;
        result.insert(value);
    }
    Ok(result.into_iter().collect())
}

/// Render a sorted, deduplicated integer slice back into the compact
/// `lo-hi`/comma notation (the companion of [`parse_int_set`]).
/// Consecutive runs collapse into a single `lo-hi` token.
pub fn format_int_set(values: &[i64]) -> String {
    if values.is_empty() {
        return String::new();
    }
    let mut tokens = Vec::new();
    let mut run_start = values[0];
    let mut run_end = values[0];
    for &value in &values[1..] {
        if value == run_end + 1 {
            run_end = value;
        } else {
            tokens.push(render_run(run_start, run_end));
            run_start = value;
            run_end = value;
        }
    }
    tokens.push(render_run(run_start, run_end));
    tokens.join(",")
}

fn render_run(start: i64, end: i64) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}-{end}")
    }
}
