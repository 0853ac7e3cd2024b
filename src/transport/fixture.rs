//! Fixture-backed transport: replays canned responses instead of talking to
//! a live daemon. Backs `--dry-run` and every test that exercises the scan
//! engine without a socket.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Transport, TransportError, TransportResult};
use crate::codec::value::hex_encode;

/// One canned request/response pair, keyed by exact request bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureEntry {
    /// Destination address.
    pub dst: u8,
    /// Primary bus byte.
    pub primary: u8,
    /// Secondary bus byte.
    pub secondary: u8,
    /// Request payload, hex-encoded (no `0x` prefix).
    pub payload_hex: String,
    /// Response payload, hex-encoded, when the request should succeed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_hex: Option<String>,
    /// When set instead of `response_hex`, the request fails with this
    /// transport error kind: `"timeout"`, `"protocol"`, or
    /// `"command_not_enabled"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct FixtureKey {
    dst: u8,
    primary: u8,
    secondary: u8,
    payload_hex: String,
}

/// A transport that answers from a fixed table of canned responses, loaded
/// from a JSON file or built programmatically by tests.
pub struct FixtureTransport {
    entries: HashMap<FixtureKey, FixtureEntry>,
    unmatched_is_timeout: bool,
    broadcasts: Vec<(u8, u8, Vec<u8>)>,
}

impl FixtureTransport {
    /// Build an empty fixture transport. Requests with no matching entry
    /// fail as a protocol error unless `unmatched_is_timeout` is set via
    /// [`FixtureTransport::with_unmatched_as_timeout`].
    pub fn new(entries: Vec<FixtureEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| {
                (
                    FixtureKey {
                        dst: entry.dst,
                        primary: entry.primary,
                        secondary: entry.secondary,
                        payload_hex: entry.payload_hex.to_lowercase(),
                    },
                    entry,
                )
            })
            .collect();
        FixtureTransport { entries, unmatched_is_timeout: false, broadcasts: Vec::new() }
    }

    /// Parse a fixture transport from its JSON representation (a top-level
    /// array of [`FixtureEntry`]).
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        let entries: Vec<FixtureEntry> = serde_json::from_str(json)?;
        Ok(Self::new(entries))
    }

    /// Treat any request with no matching fixture entry as a transport
    /// timeout rather than a protocol error. Useful for exercising the
    /// director's NaN-streak resilience against unprobed groups.
    pub fn with_unmatched_as_timeout(mut self) -> Self {
        self.unmatched_is_timeout = true;
        self
    }

    /// Broadcasts recorded by [`Transport::send_broadcast`], in call order,
    /// as `(primary, secondary, payload)`. Used by tests to assert a
    /// broadcast was sent without needing a live or fixture-matched reply.
    pub fn broadcasts(&self) -> &[(u8, u8, Vec<u8>)] {
        &self.broadcasts
    }
}

impl Transport for FixtureTransport {
    fn send_proto(&mut self, dst: u8, primary: u8, secondary: u8, payload: &[u8]) -> TransportResult<Vec<u8>> {
        let key = FixtureKey {
            dst,
            primary,
            secondary,
            payload_hex: hex_encode(payload),
        };
        let Some(entry) = self.entries.get(&key) else {
            return if self.unmatched_is_timeout {
                Err(TransportError::Timeout(format!("no fixture entry for {key:?}")))
            } else {
                Err(TransportError::Protocol(format!("no fixture entry for {key:?}")))
            };
        };

        if let Some(response_hex) = &entry.response_hex {
            return crate::codec::value::hex_decode(response_hex)
                .map_err(|_| TransportError::Protocol(format!("invalid fixture response hex: {response_hex}")));
        }
        match entry.error.as_deref() {
            Some("timeout") => Err(TransportError::Timeout("fixture timeout".to_string())),
            Some("command_not_enabled") => {
                Err(TransportError::CommandNotEnabled("fixture command not enabled".to_string()))
            }
            Some(other) => Err(TransportError::Protocol(format!("fixture error: {other}"))),
            None => Err(TransportError::Protocol("fixture entry has neither response nor error".to_string())),
        }
    }

    fn send_broadcast(&mut self, primary: u8, secondary: u8, payload: &[u8]) -> TransportResult<()> {
        self.broadcasts.push((primary, secondary, payload.to_vec()));
        Ok(())
    }
}
