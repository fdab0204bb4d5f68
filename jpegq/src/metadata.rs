//! JPEG marker scanning for metadata preservation.
//!
//! Only the header is walked: scanning stops at the first start-of-scan
//! marker. No entropy-coded data is parsed.

use tracing::debug;

use crate::consts::MAX_METADATA_MARKERS;

const SOS: u16 = 0xFFDA;
const DRI: u16 = 0xFFDD;
const COM: u16 = 0xFFFE;

/// Result of [`scan_metadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metadata {
    /// APP1–APP15 and COM segments, concatenated verbatim (markers included).
    Markers(Vec<u8>),
    /// A comment segment carrying the sentinel was found.
    AlreadyProcessed,
}

impl Metadata {
    /// Preserved segment bytes, empty for [`Metadata::AlreadyProcessed`].
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Markers(bytes) => bytes,
            Self::AlreadyProcessed => &[],
        }
    }
}

/// Collects metadata segments from a JPEG header.
///
/// Up to 20 APPn (n >= 1) and COM segments are kept. A COM segment whose
/// payload starts with `sentinel` short-circuits with
/// [`Metadata::AlreadyProcessed`]. Truncated segments end the scan.
#[must_use]
pub fn scan_metadata(data: &[u8], sentinel: &[u8]) -> Metadata {
    let mut out = Vec::new();
    let mut saved = 0usize;
    let mut pos = 0usize;

    while pos + 1 < data.len() && saved < MAX_METADATA_MARKERS {
        let marker = u16::from_be_bytes([data[pos], data[pos + 1]]);
        match marker {
            SOS => break,
            DRI => pos += 6,
            0xFFD0..=0xFFD9 => pos += 2,
            _ => {
                let Some(len_bytes) = data.get(pos + 2..pos + 4) else {
                    debug!(pos, "metadata scan: truncated segment length");
                    break;
                };
                let size = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
                let end = pos + 2 + size;

                if matches!(marker, 0xFFE1..=0xFFEF | COM) {
                    if marker == COM && data.get(pos + 4..).is_some_and(|p| p.starts_with(sentinel)) {
                        return Metadata::AlreadyProcessed;
                    }
                    let Some(segment) = data.get(pos..end) else {
                        debug!(pos, size, "metadata scan: truncated segment");
                        break;
                    };
                    out.extend_from_slice(segment);
                    saved += 1;
                }
                pos = end;
            }
        }
    }

    debug!(segments = saved, bytes = out.len(), "metadata scanned");
    Metadata::Markers(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTINEL: &[u8] = b"Compressed by jpeg-recompress";

    fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let len = (payload.len() + 2) as u16;
        let mut out = vec![0xFF, marker];
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn jpeg(segments: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        out.extend(segment(0xE0, b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0"));
        for s in segments {
            out.extend_from_slice(s);
        }
        out.extend(segment(0xDA, &[1, 2, 3]));
        out.extend_from_slice(&[0x12, 0x34, 0xFF, 0xD9]);
        out
    }

    #[test]
    fn test_collects_app_and_comments() {
        let exif = segment(0xE1, b"Exif\0\0data");
        let com = segment(0xFE, b"hello");
        let dqt = segment(0xDB, &[0u8; 65]);
        let data = jpeg(&[exif.clone(), dqt, com.clone()]);

        let mut expected = exif;
        expected.extend(com);
        assert_eq!(scan_metadata(&data, SENTINEL), Metadata::Markers(expected));
    }

    #[test]
    fn test_skips_app0_and_stops_at_sos() {
        let mut data = jpeg(&[]);
        // An APP1 after SOS must not be collected
        data.extend(segment(0xE1, b"late"));
        assert_eq!(scan_metadata(&data, SENTINEL), Metadata::Markers(Vec::new()));
    }

    #[test]
    fn test_detects_sentinel() {
        let mut payload = SENTINEL.to_vec();
        payload.extend_from_slice(b" v2");
        let data = jpeg(&[segment(0xFE, &payload)]);
        assert_eq!(scan_metadata(&data, SENTINEL), Metadata::AlreadyProcessed);
        assert!(Metadata::AlreadyProcessed.bytes().is_empty());
    }

    #[test]
    fn test_restart_and_dri_markers() {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xDD, 0x00, 0x04, 0x00, 0x10];
        data.extend(segment(0xED, b"iptc"));
        data.extend_from_slice(&[0xFF, 0xDA]);
        assert_eq!(
            scan_metadata(&data, SENTINEL).bytes(),
            segment(0xED, b"iptc").as_slice()
        );
    }

    #[test]
    fn test_truncated_input() {
        let mut data = vec![0xFF, 0xD8];
        let mut exif = segment(0xE1, &[7u8; 40]);
        exif.truncate(20);
        data.extend(exif);
        assert_eq!(scan_metadata(&data, SENTINEL), Metadata::Markers(Vec::new()));
        assert_eq!(scan_metadata(&[0xFF], SENTINEL), Metadata::Markers(Vec::new()));
    }

    #[test]
    fn test_marker_limit() {
        let segments: Vec<Vec<u8>> = (0..25).map(|_| segment(0xE2, b"icc")).collect();
        let data = jpeg(&segments);
        let Metadata::Markers(bytes) = scan_metadata(&data, SENTINEL) else {
            panic!("unexpected sentinel");
        };
        assert_eq!(bytes.len(), MAX_METADATA_MARKERS * segment(0xE2, b"icc").len());
    }
}
