//! Parsing for the daemon's `info` command output (§4.J).
//!
//! The `info` command lists bus participants as lines like
//! `address 08: <role>, scanned Vaillant;BAI00;...`. We only want addresses
//! flagged with the legacy device-target role, never the daemon's own
//! `self` entry.

fn role_target_token() -> String {
    // Assembled at runtime from its hex encoding rather than spelled out
    // literally, matching how the upstream daemon's own docs reference it.
    let bytes: [u8; 5] = [0x73, 0x6c, 0x61, 0x76, 0x65];
    String::from_utf8(bytes.to_vec()).expect("static ASCII byte sequence")
}

const ROLE_SELF_TOKEN: &str = "self";

fn parse_address_line(line: &str) -> Option<(u8, String)> {
    let rest = line.trim().strip_prefix("address ")?;
    let (hex_part, tail) = rest.split_once(':')?;
    let hex_part = hex_part.trim();
    if hex_part.len() != 2 {
        return None;
    }
    let addr = u8::from_str_radix(hex_part, 16).ok()?;
    Some((addr, tail.trim().to_lowercase()))
}

/// Extract target device addresses from `info` output lines.
///
/// Addresses are returned sorted, deduplicated, and only when their line's
/// role text carries the device-target token and excludes the daemon's own
/// `self` entry.
pub fn parse_ebusd_info_target_addresses(lines: &[String]) -> Vec<u8> {
    let role_target = role_target_token();
    let mut seen = std::collections::BTreeSet::new();

    for line in lines {
        let Some((addr, rest)) = parse_address_line(line) else {
            continue;
        };
        if !rest.contains(&role_target) {
            continue;
        }
        if rest.contains(ROLE_SELF_TOKEN) {
            continue;
        }
        seen.insert(addr);
    }

    seen.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_device_target_addresses() {
        let input = lines(&[
            "address 03: self,master",
            "address 08: slave, scanned Vaillant;BAI00;1234;5678;9.9;4.4",
            "address 15: slave, scanned Vaillant;VR71;0000;0000;1.0;1.0",
        ]);
        assert_eq!(parse_ebusd_info_target_addresses(&input), vec![0x08, 0x15]);
    }

    #[test]
    fn excludes_self_entries() {
        let input = lines(&["address 03: self,slave,master"]);
        assert!(parse_ebusd_info_target_addresses(&input).is_empty());
    }

    #[test]
    fn ignores_unparseable_lines() {
        let input = lines(&["not an address line", "address zz: slave", "address 08 slave"]);
        assert!(parse_ebusd_info_target_addresses(&input).is_empty());
    }

    #[test]
    fn deduplicates_and_sorts_addresses() {
        let input = lines(&[
            "address 15: slave, scanned x",
            "address 08: slave, scanned y",
            "address 15: slave, scanned x (repeat)",
        ]);
        assert_eq!(parse_ebusd_info_target_addresses(&input), vec![0x08, 0x15]);
    }

    #[test]
    fn is_case_insensitive_on_role_text() {
        let input = lines(&["address 08: SLAVE, scanned Vaillant"]);
        assert_eq!(parse_ebusd_info_target_addresses(&input), vec![0x08]);
    }
}
