//! Data model shared by the protocol state machines (spec §3).

use heapless::Vec;

/// Number of hop channels used by a DSMX frame.
pub const DSM_MAX_USED_CHANNELS: usize = 23;
/// Highest channel number usable by DSM2/DSMX.
pub const DSM_MAX_CHANNEL: u8 = 0x4F;

/// The 4-byte transmitter id observed from a target DSM transmitter, plus
/// the values derived from it (spec §3, `DsmIdentity`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DsmIdentity {
    pub id: [u8; 4],
    pub is_dsmx: bool,
    pub sop_col: u8,
    pub data_col: u8,
    pub crc_seed: u16,
    pub channels: [u8; DSM_MAX_USED_CHANNELS],
}

impl DsmIdentity {
    /// Derive `crc_seed`, `sop_col` and `data_col` from `id` (spec §3/§4.4).
    pub fn new(id: [u8; 4], is_dsmx: bool) -> Self {
        let crc_seed = !(((id[0] as u16) << 8) | id[1] as u16);
        let sop_col = (id[0].wrapping_add(id[1]).wrapping_add(id[2]).wrapping_add(2)) & 0x07;
        let data_col = 7 - sop_col;
        Self {
            id,
            is_dsmx,
            sop_col,
            data_col,
            crc_seed,
            channels: [0; DSM_MAX_USED_CHANNELS],
        }
    }

    /// Flip the CRC seed, done on every hop (spec §4.4 "Hop step") and on
    /// CRC-error-with-valid-match recovery.
    pub fn flip_crc_seed(&mut self) {
        self.crc_seed = !self.crc_seed;
    }

    /// Whether a received packet's first two bytes identify this transmitter
    /// (spec §4.4 "Receive validation" / `CHECK_MFG_ID` in
    /// `original_source/src/helper/dsm.h`).
    pub fn packet_matches(&self, byte0: u8, byte1: u8) -> bool {
        if self.is_dsmx {
            byte0 == self.id[2] && byte1 == self.id[3]
        } else {
            byte0 == !self.id[2] && byte1 == !self.id[3]
        }
    }

    /// The two bytes a forged frame (or a genuine one) opens with (spec §4.4
    /// "Forged frame layout").
    pub fn frame_header(&self) -> [u8; 2] {
        if self.is_dsmx {
            [self.id[2], self.id[3]]
        } else {
            [!self.id[2], !self.id[3]]
        }
    }
}

/// Number of FSK hop channels learned from a FrSky transmitter (spec §3).
pub const FRSKY_HOP_TABLE_LENGTH: usize = 47;

/// The 2-byte transmitter id plus the hop table and tuning state learned
/// during binding (spec §3, `FskIdentity`).
#[derive(Debug, Clone, Copy)]
pub struct FskIdentity {
    pub id: [u8; 2],
    pub hop_table: [u8; FRSKY_HOP_TABLE_LENGTH],
    pub fsctrl0: i8,
    pub rx_num: u8,
}

impl Default for FskIdentity {
    fn default() -> Self {
        Self {
            id: [0; 2],
            hop_table: [0; FRSKY_HOP_TABLE_LENGTH],
            fsctrl0: 0,
            rx_num: 1,
        }
    }
}

/// Per-channel calibration learned before the first non-scanning receive
/// (spec §3, `TuningTable`).
#[derive(Debug, Clone, Copy)]
pub struct TuningTable {
    pub fscal1: [u8; FRSKY_HOP_TABLE_LENGTH],
    pub fscal1_bind: u8,
    pub fscal2: u8,
    pub fscal3: u8,
    populated: bool,
}

impl Default for TuningTable {
    fn default() -> Self {
        Self {
            fscal1: [0; FRSKY_HOP_TABLE_LENGTH],
            fscal1_bind: 0,
            fscal2: 0,
            fscal3: 0,
            populated: false,
        }
    }
}

impl TuningTable {
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn mark_populated(&mut self) {
        self.populated = true;
    }

    /// Invalidated whenever the identity changes (spec §3 invariant).
    pub fn invalidate(&mut self) {
        self.populated = false;
    }
}

/// Up to 16 16-bit servo values supplied by the host (spec §3, `RcChannelBuffer`).
///
/// Single-writer (the host-link message handler), single-reader (the
/// transmitter protocols' packet builder); no locking is required on a
/// single-threaded dispatcher (spec §5).
#[derive(Debug, Clone, Default)]
pub struct RcChannelBuffer {
    channels: Vec<u16, 16>,
}

impl RcChannelBuffer {
    pub fn set(&mut self, channels: &[u16]) {
        self.channels.clear();
        for &v in channels.iter().take(16) {
            let _ = self.channels.push(v);
        }
    }

    pub fn get(&self, index: usize) -> Option<u16> {
        self.channels.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.channels
    }
}

/// An event raised by a radio chip driver (spec §3, `RadioEvent`).
///
/// Never queued: the handler that observes it runs to completion in the
/// same context (interrupt or polled probe) that discovered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioEvent {
    RecvReady { length: u8, error: bool },
    SendDone { error: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsmx_identity_derivation() {
        let id = [0x2A, 0xA2, 0xCC, 0x16];
        let ident = DsmIdentity::new(id, true);
        assert_eq!(ident.sop_col, (0x2A_u8 + 0xA2 + 0xCC + 2) & 0x07);
        assert_eq!(ident.data_col, 7 - ident.sop_col);
        assert_eq!(ident.crc_seed, !(((0x2A_u16) << 8) | 0xA2));
        assert_eq!(ident.frame_header(), [0xCC, 0x16]);
    }

    #[test]
    fn dsm2_header_is_complemented() {
        let ident = DsmIdentity::new([0x01, 0x02, 0xCC, 0x16], false);
        assert_eq!(ident.frame_header(), [!0xCC_u8, !0x16_u8]);
        assert!(ident.packet_matches(!0xCC_u8, !0x16_u8));
        assert!(!ident.packet_matches(0xCC, 0x16));
    }

    #[test]
    fn crc_seed_flips_back_after_two_hops() {
        // Invariant 3: after two hops, crc_seed equals its initial value.
        let mut ident = DsmIdentity::new([0x2A, 0xA2, 0xCC, 0x16], true);
        let initial = ident.crc_seed;
        ident.flip_crc_seed();
        ident.flip_crc_seed();
        assert_eq!(ident.crc_seed, initial);
    }

    #[test]
    fn rc_channel_buffer_truncates_to_16() {
        let mut buf = RcChannelBuffer::default();
        let values: heapless::Vec<u16, 20> = (0u16..20).collect();
        buf.set(&values);
        assert_eq!(buf.len(), 16);
        assert_eq!(buf.get(0), Some(0));
        assert_eq!(buf.get(15), Some(15));
        assert_eq!(buf.get(16), None);
    }
}
