//! Narrow progress/log callback surface for the scan engine (§4.G).
//!
//! Scanner code drives a [`ScanObserver`] to report phase progress and
//! user-facing log lines without depending on any particular UI. The rich
//! TUI/report layers a caller might build on top of this are out of scope
//! here; this crate ships only the trait and a couple of small, dependency-free
//! implementations.

/// Phase names used by the scan engine when calling into a [`ScanObserver`].
pub mod phase {
    pub const GROUP_DISCOVERY: &str = "group_discovery";
    pub const INSTANCE_DISCOVERY: &str = "instance_discovery";
    pub const REGISTER_SCAN: &str = "register_scan";
}

/// Observer for scan progress and user-facing logs.
///
/// Implementations must be fast and must never panic: a misbehaving observer
/// must not be able to abort a scan.
pub trait ScanObserver {
    /// Start (or reset) a phase's progress counter.
    fn phase_start(&mut self, _phase: &str, _total: u64) {}

    /// Advance a phase's progress counter.
    fn phase_advance(&mut self, _phase: &str, _advance: u64) {}

    /// Update a phase's total without resetting its progress.
    fn phase_set_total(&mut self, _phase: &str, _total: u64) {}

    /// Mark a phase complete.
    fn phase_finish(&mut self, _phase: &str) {}

    /// Update the current operation's status line.
    fn status(&mut self, _message: &str) {}

    /// Emit a scrollable log line at the given level (`"info"`, `"warn"`,
    /// `"error"`).
    fn log(&mut self, _message: &str, _level: &str) {}
}

/// An observer that discards everything. The default when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ScanObserver for NullObserver {}

/// An observer that routes phase/status events through the `log` crate.
///
/// Phase progress is logged at `debug`, one line per [`ScanObserver::log`]
/// call at the level it names, and unrecognized levels fall back to `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl ScanObserver for LoggingObserver {
    fn phase_start(&mut self, phase: &str, total: u64) {
        log::debug!("phase '{phase}' starting, total={total}");
    }

    fn phase_advance(&mut self, phase: &str, advance: u64) {
        log::trace!("phase '{phase}' advanced by {advance}");
    }

    fn phase_set_total(&mut self, phase: &str, total: u64) {
        log::debug!("phase '{phase}' total updated to {total}");
    }

    fn phase_finish(&mut self, phase: &str) {
        log::debug!("phase '{phase}' finished");
    }

    fn status(&mut self, message: &str) {
        log::debug!("status: {message}");
    }

    fn log(&mut self, message: &str, level: &str) {
        match level {
            "warn" => log::warn!("{message}"),
            "error" => log::error!("{message}"),
            _ => log::info!("{message}"),
        }
    }
}
