//! Crate-wide error type.
//!
//! Only *fallible construction* goes through [`Error`] — malformed selector
//! bytes, an unparseable value, a misconfigured [`crate::config::ScanConfig`].
//! Failures that the scan protocol expects to recover from at the register
//! level (timeouts, transport errors, decode mismatches) are instead recorded
//! as strings inside a [`crate::artifact::RegisterEntry`]; see §7 of the
//! design notes for the full split.

use thiserror::Error as ThisError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Selector hex was not valid hex (odd length, non-hex characters).
    #[error("invalid selector hex: {0}")]
    SelectorHex(String),

    /// Selector payload had the wrong length for its opcode family.
    #[error("selector length mismatch: opcode 0x{opcode:02x} expects {expected} bytes, got {got}")]
    SelectorLength {
        /// Opcode byte.
        opcode: u8,
        /// Expected payload length.
        expected: usize,
        /// Observed payload length.
        got: usize,
    },

    /// Selector opcode byte is not one of the known opcodes.
    #[error("unknown selector opcode: 0x{0:02x}")]
    UnknownOpcode(u8),

    /// A selector field value was out of its valid range.
    #[error("selector field {field} out of range: {detail}")]
    SelectorField {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable detail.
        detail: String,
    },

    /// A value decoder was given the wrong number of bytes, or a value
    /// outside the valid range for its type spec.
    #[error("value decode error for {spec}: {detail}")]
    ValueDecode {
        /// The type-spec string that was attempted.
        spec: String,
        /// Human-readable detail.
        detail: String,
    },

    /// Identification payload was too short to contain the fixed fields.
    #[error("identification payload too short: {0} bytes")]
    IdentificationTooShort(usize),

    /// Vendor scan-id chunks did not decode under either known layout.
    #[error("vendor scan-id parse error: {0}")]
    ScanIdParse(String),

    /// An integer-set token (used by planner overrides) failed to parse.
    #[error("invalid integer token: {0:?}")]
    IntToken(String),

    /// An integer-set value fell outside the caller-supplied bounds.
    #[error("value {value} out of range {min}..={max}")]
    IntRange {
        /// The offending value.
        value: i64,
        /// Lower bound (inclusive).
        min: i64,
        /// Upper bound (inclusive).
        max: i64,
    },

    /// `ScanConfig` or CLI argument validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// Artifact failed schema/consistency validation.
    #[error("artifact validation error: {0}")]
    ArtifactInvalid(String),

    /// Underlying I/O failure (connect, read, write).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
