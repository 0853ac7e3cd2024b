//! Caller-facing scan configuration (§3, ambient).
//!
//! Bundles the knobs a caller (CLI driver or library consumer) needs to
//! parameterize a scan into one struct, mirroring the defaults baked into the
//! daemon TCP transport's own config.

use std::time::Duration;

use crate::plan::{CustomOverrides, Preset};
use crate::transport::tcp::EbusdTcpConfig;

/// Destination address resolution strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    /// Resolve the target address via the daemon's `info` command.
    Auto,
    /// Use a fixed destination address.
    Fixed(u8),
}

impl Default for Destination {
    fn default() -> Self {
        Destination::Auto
    }
}

/// All caller-supplied knobs for a scan (§3).
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Daemon connection settings.
    pub ebusd: EbusdTcpConfig,
    /// Per-request timeout (mirrors `ebusd.timeout`; kept distinct so a
    /// caller can override just this knob without rebuilding `ebusd`).
    pub timeout: Duration,
    /// Destination address, or `Auto` to resolve via `info`.
    pub destination: Destination,
    /// Planner preset.
    pub preset: Preset,
    /// Overrides applied on top of the preset (only consulted when
    /// `preset == Preset::Custom`).
    pub custom_overrides: CustomOverrides,
    /// When set, scan every known-group instance slot regardless of what the
    /// presence heuristic reports (the CLI's `--scan-absent` flag).
    pub scan_absent: bool,
    /// Optional file to append request/response trace lines to.
    pub trace_file: Option<std::path::PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let ebusd = EbusdTcpConfig::default();
        let timeout = ebusd.timeout;
        Self {
            ebusd,
            timeout,
            destination: Destination::default(),
            preset: Preset::Recommended,
            custom_overrides: CustomOverrides::default(),
            scan_absent: false,
            trace_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_daemon_conventional_host_port_and_timeout() {
        let config = ScanConfig::default();
        assert_eq!(config.ebusd.host, "127.0.0.1");
        assert_eq!(config.ebusd.port, 8888);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.destination, Destination::Auto);
        assert_eq!(config.preset, Preset::Recommended);
        assert!(!config.scan_absent);
        assert!(config.trace_file.is_none());
    }
}
