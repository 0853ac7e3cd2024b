//! Identification payload decoding: the `0704` broadcast scan-identification
//! response and the Vaillant-specific scan-id chunk layout (§4.A).

use crate::error::{Error, Result};

/// A decoded `0704` identification response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanIdentification {
    /// Manufacturer byte.
    pub manufacturer: u8,
    /// Device id, ASCII with trailing NUL/whitespace trimmed.
    pub device_id: String,
    /// Software version, rendered as a 2-byte hex string.
    pub sw: String,
    /// Hardware version, rendered as a 2-byte hex string.
    pub hw: String,
}

/// Parse a `0704` identification payload (no length prefix).
///
/// Layout: `<manufacturer:1> <device_id:N> <sw:2> <hw:2>`.
pub fn parse_scan_identification(payload: &[u8]) -> Result<ScanIdentification> {
    if payload.len() < 5 {
        return Err(Error::IdentificationTooShort(payload.len()));
    }
    let manufacturer = payload[0];
    let sw_bytes = &payload[payload.len() - 4..payload.len() - 2];
    let hw_bytes = &payload[payload.len() - 2..];
    let device_id_bytes = &payload[1..payload.len() - 4];

    let device_id = String::from_utf8_lossy(device_id_bytes)
        .trim_end_matches('\0')
        .trim()
        .to_string();

    Ok(ScanIdentification {
        manufacturer,
        device_id,
        sw: super::value::hex_encode(sw_bytes),
        hw: super::value::hex_encode(hw_bytes),
    })
}

/// A decoded Vaillant scan-id, assembled from four B509 chunks (QQ=0x24..0x27).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaillantScanId {
    /// First two characters of the raw string.
    pub prefix: String,
    /// Manufacture year, two digits.
    pub year: String,
    /// Manufacture week, two digits.
    pub week: String,
    /// Product/model code, ten characters.
    pub product: String,
    /// Supplier code, four characters.
    pub supplier: String,
    /// Serial counter, six characters.
    pub counter: String,
    /// Trailing suffix, two characters.
    pub suffix: String,
    /// The full normalized raw string all fields were sliced from.
    pub raw: String,
}

impl VaillantScanId {
    /// The model number: alias for [`VaillantScanId::product`].
    pub fn model_number(&self) -> &str {
        &self.product
    }

    /// The serial number: the complete normalized scan-id string.
    pub fn serial_number(&self) -> &str {
        &self.raw
    }

    /// The legacy shorthand serial number used in earlier artifacts/logs:
    /// `prefix + year + week + supplier + counter + suffix` (omits `product`).
    pub fn serial_number_short(&self) -> String {
        format!(
            "{}{}{}{}{}{}",
            self.prefix, self.year, self.week, self.supplier, self.counter, self.suffix
        )
    }
}

const TRIM_BYTES: &[u8] = &[0x00, 0x20, 0xFF];

fn strip_trim_bytes(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|b| !TRIM_BYTES.contains(b)).unwrap_or(data.len());
    let end = data.iter().rposition(|b| !TRIM_BYTES.contains(b)).map(|i| i + 1).unwrap_or(start);
    &data[start..end]
}

fn ascii_lossy(data: &[u8]) -> String {
    data.iter()
        .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
        .collect()
}

fn try_parse_candidate(payload: &[u8]) -> Option<VaillantScanId> {
    let trimmed = strip_trim_bytes(payload);
    let raw = ascii_lossy(trimmed);
    if raw.chars().count() < 28 {
        return None;
    }
    let chars: Vec<char> = raw.chars().collect();
    let slice = |lo: usize, hi: usize| chars[lo..hi].iter().collect::<String>();
    Some(VaillantScanId {
        prefix: slice(0, 2),
        year: slice(2, 4),
        week: slice(4, 6),
        product: slice(6, 16),
        supplier: slice(16, 20),
        counter: slice(20, 26),
        suffix: slice(26, 28),
        raw,
    })
}

/// Parse four B509 scan-id chunks (QQ=0x24..0x27) into a [`VaillantScanId`].
///
/// Each chunk is expected to be at least 9 bytes. Two candidate layouts are
/// tried in order: Variant A treats byte 0 of every chunk as a status byte
/// that must be `0x00` and concatenates bytes `1..9`; Variant B concatenates
/// the raw 9-byte chunks with no status byte. The first candidate that
/// normalizes (after trimming NUL/space/0xFF) to at least 28 characters wins.
pub fn parse_vaillant_scan_id_chunks(chunks: &[Vec<u8>]) -> Result<VaillantScanId> {
    if chunks.len() != 4 {
        return Err(Error::ScanIdParse(format!("expected 4 chunks (0x24..0x27), got {}", chunks.len())));
    }
    for chunk in chunks {
        if chunk.len() < 9 {
            return Err(Error::ScanIdParse(format!(
                "scan-id chunk too short: expected >=9 bytes, got {}",
                chunk.len()
            )));
        }
    }

    let mut candidates: Vec<Vec<u8>> = Vec::new();
    if chunks.iter().all(|c| c[0] == 0x00) {
        let mut status_payload = Vec::new();
        for chunk in chunks {
            status_payload.extend_from_slice(&chunk[1..9]);
        }
        candidates.push(status_payload);
    }
    let mut raw9_payload = Vec::new();
    for chunk in chunks {
        raw9_payload.extend_from_slice(&chunk[..9]);
    }
    candidates.push(raw9_payload);

    for candidate in &candidates {
        if let Some(parsed) = try_parse_candidate(candidate) {
            return Ok(parsed);
        }
    }

    Err(Error::ScanIdParse(
        "scan-id string too short after normalization (expected >=28 chars)".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_identification_seed_scenario() {
        // manufacturer=0xB5, device id "XREG" padded, sw=0102, hw=0304
        let mut payload = vec![0xB5];
        payload.extend_from_slice(b"XREG\0\0");
        payload.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        let id = parse_scan_identification(&payload).unwrap();
        assert_eq!(id.manufacturer, 0xB5);
        assert_eq!(id.device_id, "XREG");
        assert_eq!(id.sw, "0102");
        assert_eq!(id.hw, "0304");
    }

    #[test]
    fn parse_identification_rejects_short_payload() {
        let err = parse_scan_identification(&[0x01, 0x02]).unwrap_err();
        assert!(matches!(err, Error::IdentificationTooShort(2)));
    }

    #[test]
    fn parse_vaillant_scan_id_variant_a_status_byte() {
        // Each chunk is a status byte (0x00) followed by 8 ASCII bytes; the
        // trailing \0\0 of the last chunk is trimmed from the concatenated
        // 32-byte payload, leaving a 30-character raw string.
        let chunk = |ascii8: &[u8]| {
            let mut v = vec![0x00u8];
            v.extend_from_slice(ascii8);
            v
        };
        let chunks = vec![
            chunk(b"12250750"),
            chunk(b"PRODUCTA"),
            chunk(b"B0SUPPCO"),
            chunk(b"UNT1ZZ\0\0"),
        ];
        let parsed = parse_vaillant_scan_id_chunks(&chunks).unwrap();
        assert_eq!(parsed.prefix, "12");
        assert_eq!(parsed.year, "25");
        assert_eq!(parsed.week, "07");
        assert_eq!(parsed.model_number(), "50PRODUCTA");
        assert_eq!(parsed.serial_number(), parsed.raw);
    }

    #[test]
    fn parse_vaillant_scan_id_variant_b_raw_nine_bytes() {
        // Only the first chunk's status byte is 0x00, so the status-byte
        // candidate (which requires all four to be 0x00) is skipped and the
        // raw 9-byte-per-chunk candidate is used instead. 0xFF padding on
        // the last chunk is trimmed like NUL/space.
        let chunks = vec![
            b"\x0012250750".to_vec(),
            b"PRODUCTAB".to_vec(),
            b"0SUPPCOUN".to_vec(),
            vec![b'T', b'1', b'Z', b'Z', 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
        ];
        let parsed = parse_vaillant_scan_id_chunks(&chunks).unwrap();
        assert_eq!(parsed.raw.len(), 30);
        assert_eq!(parsed.prefix, "12");
        assert_eq!(parsed.year, "25");
        assert_eq!(parsed.week, "07");
        assert_eq!(parsed.product, "50PRODUCTA");
    }

    #[test]
    fn parse_vaillant_scan_id_rejects_wrong_chunk_count() {
        let err = parse_vaillant_scan_id_chunks(&[vec![0; 9]]).unwrap_err();
        assert!(matches!(err, Error::ScanIdParse(_)));
    }

    #[test]
    fn parse_vaillant_scan_id_rejects_short_chunk() {
        let chunks = vec![vec![0; 9], vec![0; 9], vec![0; 9], vec![0; 3]];
        let err = parse_vaillant_scan_id_chunks(&chunks).unwrap_err();
        assert!(matches!(err, Error::ScanIdParse(_)));
    }

    #[test]
    fn serial_number_short_omits_product() {
        let id = VaillantScanId {
            prefix: "12".into(),
            year: "25".into(),
            week: "07".into(),
            product: "PRODUCTABC".into(),
            supplier: "SUPP".into(),
            counter: "COUNT1".into(),
            suffix: "ZZ".into(),
            raw: "1225070PRODUCTABCSUPPCOUNT1ZZ".into(),
        };
        assert_eq!(id.serial_number_short(), "1225070SUPPCOUNT1ZZ");
    }
}
