//! Minimal MPEG-TS packet inspection.
//!
//! Just enough for segment cutting: sync-byte validation, payload
//! extraction past the adaptation field, and an Annex B NALU scan that
//! classifies frame units versus parameter-set units. No PID tracking,
//! no PES reassembly - the capture stream carries a single h264
//! elementary stream and the cutter only needs unit boundaries.

use thiserror::Error;

/// Fixed transport packet length.
pub const PACKET_LEN: usize = 188;

const SYNC_BYTE: u8 = 0x47;

// h264 NALU types the cutter cares about
pub const NALU_NON_IDR: u8 = 1;
pub const NALU_IDR: u8 = 5;
pub const NALU_SPS: u8 = 7;
pub const NALU_PPS: u8 = 8;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("bad sync byte 0x{0:02x}")]
    BadSync(u8),

    #[error("adaptation field overruns packet (length {0})")]
    BadAdaptationField(u8),
}

/// What segment cutting needs to know about one packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketScan {
    /// Frame units (IDR + non-IDR) seen before any parameter set.
    pub frame_units: usize,
    /// Whether a parameter-set unit (SPS/PPS) was seen.
    pub parameter_set: bool,
}

/// Classify one 188-byte transport packet.
pub fn scan_packet(pkt: &[u8; PACKET_LEN]) -> Result<PacketScan, PacketError> {
    let payload = match payload(pkt)? {
        Some(p) => p,
        None => return Ok(PacketScan::default()),
    };

    let mut scan = PacketScan::default();
    for nalu in split_annexb_nalus(payload) {
        if nalu.is_empty() {
            continue;
        }
        match nalu[0] & 0x1f {
            NALU_SPS | NALU_PPS => {
                // The parameter set describes frames that follow it;
                // the cutter withholds this packet, so stop scanning.
                scan.parameter_set = true;
                break;
            }
            NALU_IDR | NALU_NON_IDR => scan.frame_units += 1,
            _ => {}
        }
    }
    Ok(scan)
}

/// Payload slice of a packet, skipping header and adaptation field.
/// `None` when the adaptation_field_control bits say there is no payload.
fn payload(pkt: &[u8; PACKET_LEN]) -> Result<Option<&[u8]>, PacketError> {
    if pkt[0] != SYNC_BYTE {
        return Err(PacketError::BadSync(pkt[0]));
    }

    let afc = (pkt[3] >> 4) & 0b11;
    match afc {
        // payload only
        0b01 => Ok(Some(&pkt[4..])),
        // adaptation field then payload
        0b11 => {
            let af_len = pkt[4];
            let start = 5 + af_len as usize;
            if start > PACKET_LEN {
                return Err(PacketError::BadAdaptationField(af_len));
            }
            Ok(Some(&pkt[start..]))
        }
        // reserved or adaptation-only
        _ => Ok(None),
    }
}

/// Split an Annex B byte stream on 00 00 01 / 00 00 00 01 start codes.
/// Returns an empty vec when no start code is present (the payload is
/// then a continuation of a unit started in an earlier packet).
pub fn split_annexb_nalus(data: &[u8]) -> Vec<&[u8]> {
    let mut starts = Vec::new();
    let mut i = 0;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            starts.push(i + 3);
            i += 3;
        } else {
            i += 1;
        }
    }

    let mut nalus = Vec::with_capacity(starts.len());
    for (n, &start) in starts.iter().enumerate() {
        let mut end = match starts.get(n + 1) {
            Some(&next) => next - 3,
            None => data.len(),
        };
        // four-byte start code: strip the leading zero from the previous unit
        if end > start && end >= 1 && data[end - 1] == 0 && starts.get(n + 1).is_some() {
            end -= 1;
        }
        nalus.push(&data[start..end]);
    }
    nalus
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_with_payload(payload: &[u8]) -> [u8; PACKET_LEN] {
        let mut pkt = [0xffu8; PACKET_LEN];
        pkt[0] = SYNC_BYTE;
        pkt[1] = 0x40;
        pkt[2] = 0x00;
        pkt[3] = 0x10; // payload only
        pkt[4..4 + payload.len()].copy_from_slice(payload);
        pkt
    }

    fn annexb(nalu_types: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for &t in nalu_types {
            out.extend_from_slice(&[0, 0, 1, t, 0xaa, 0xbb]);
        }
        out
    }

    #[test]
    fn test_frame_packet() {
        let pkt = packet_with_payload(&annexb(&[NALU_NON_IDR]));
        let scan = scan_packet(&pkt).unwrap();
        assert_eq!(scan.frame_units, 1);
        assert!(!scan.parameter_set);
    }

    #[test]
    fn test_parameter_set_packet() {
        let pkt = packet_with_payload(&annexb(&[NALU_SPS, NALU_PPS, NALU_IDR]));
        let scan = scan_packet(&pkt).unwrap();
        // scanning stops at the parameter set; the IDR after it is not counted
        assert!(scan.parameter_set);
        assert_eq!(scan.frame_units, 0);
    }

    #[test]
    fn test_frames_before_parameter_set_counted() {
        let pkt = packet_with_payload(&annexb(&[NALU_IDR, NALU_PPS]));
        let scan = scan_packet(&pkt).unwrap();
        assert!(scan.parameter_set);
        assert_eq!(scan.frame_units, 1);
    }

    #[test]
    fn test_continuation_packet_has_no_units() {
        // no start codes: mid-unit continuation data
        let pkt = packet_with_payload(&[0x12, 0x34, 0x56, 0x78]);
        let scan = scan_packet(&pkt).unwrap();
        assert_eq!(scan, PacketScan::default());
    }

    #[test]
    fn test_bad_sync_byte() {
        let mut pkt = packet_with_payload(&[]);
        pkt[0] = 0x00;
        assert!(matches!(scan_packet(&pkt), Err(PacketError::BadSync(0))));
    }

    #[test]
    fn test_adaptation_only_packet() {
        let mut pkt = [0xffu8; PACKET_LEN];
        pkt[0] = SYNC_BYTE;
        pkt[3] = 0x20; // adaptation field only, no payload
        let scan = scan_packet(&pkt).unwrap();
        assert_eq!(scan, PacketScan::default());
    }

    #[test]
    fn test_adaptation_field_overrun() {
        let mut pkt = [0xffu8; PACKET_LEN];
        pkt[0] = SYNC_BYTE;
        pkt[3] = 0x30; // adaptation + payload
        pkt[4] = 0xff; // 255-byte adaptation field can't fit
        assert!(matches!(
            scan_packet(&pkt),
            Err(PacketError::BadAdaptationField(0xff))
        ));
    }

    #[test]
    fn test_split_four_byte_start_codes() {
        let data = [0u8, 0, 0, 1, NALU_SPS, 0x42, 0, 0, 0, 1, NALU_IDR, 0x99];
        let nalus = split_annexb_nalus(&data);
        assert_eq!(nalus.len(), 2);
        assert_eq!(nalus[0], &[NALU_SPS, 0x42]);
        assert_eq!(nalus[1], &[NALU_IDR, 0x99]);
    }
}
