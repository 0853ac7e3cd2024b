#![warn(missing_docs)]
/*! A scanner and protocol library for a field-bus heating-regulator
extended-register protocol ("B524") and its flat-register sibling ("B509").

The regulator exposes its parameters through a small selector-based binary
protocol layered over a text-line daemon command socket. This crate builds
and parses those selectors, drives the request/response exchange over the
daemon's TCP socket (or a fixture for tests and `--dry-run`), and runs the
four-phase scan that turns "an address on the bus" into a structured JSON
artifact describing every group, instance, and register it found.

# Architecture overview

A scan proceeds in four phases:

```text
  [ Phase A: directory discovery   ]   probe GG=0x00..=0xFF, stop at two
           |                           consecutive NaN descriptors
           v
  [ Phase B: classification        ]   match discovered groups against the
           |                           static group table
           v
  [ Phase C: presence heuristics   ]   per-group probes decide which
           |                           instance slots are populated
           v
  [ Phase D: register sweep        ]   read RR=0x0000..=rr_max for every
           |                           present instance
           v
  [ Artifact ]
```

[`scan::scan_b524`] drives all four phases and returns an [`artifact::Artifact`];
[`scan::scan_b509`] runs the simpler flat-register dump used as a secondary
data source. Both accept any [`transport::Transport`] implementation, so the
whole engine runs identically against a live daemon or an in-memory fixture.

# Examples

```
use xreg_scan::codec::selector::build_register_read_payload;
use xreg_scan::director::{classify_groups, DiscoveredGroup};

// Build the wire payload for reading GG=0x02 II=0x00 RR=0x0016.
let payload = build_register_read_payload(0x02, 0x02, 0x00, 0x0016).unwrap();
assert_eq!(payload, vec![0x02, 0x00, 0x02, 0x00, 0x16, 0x00]);

// Classify a directory discovery result against the static group table.
let classified = classify_groups(&[DiscoveredGroup { group: 0x02, descriptor: 1.0 }]);
assert_eq!(classified[0].name, "Heating Circuits");
```
*/

pub mod artifact;
pub mod codec;
pub mod config;
pub mod director;
pub mod ebusd_info;
pub mod error;
pub mod observer;
pub mod plan;
pub mod presence;
pub mod register;
pub mod scan;
pub mod transport;

pub use error::{Error, Result};
