//! FSK protocol variants and their CC2500 register profiles (spec §4.5
//! "Data-packet validation (FSKX variants)", §6 `parse_arg` "protocol:u8").
//!
//! Grounded byte-for-byte on `original_source/src/helper/frsky.c`'s
//! `frskyv_conf`/`frskyd_conf`/`frskyx_conf`/`frskyx_eu_conf` tables and the
//! common register block `frsky_conf_common` applied after the per-variant
//! one. The register addresses themselves (silicon bit patterns) are out of
//! scope per spec §1 Non-goals; what's in scope here is which variant picks
//! which profile and the frame-length / id layout that follows from it.

/// Which FrSky-compatible radio protocol the FSK chip is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FskProtocol {
    FrskyV,
    FrskyD,
    FrskyX,
    FrskyXEu,
}

impl FskProtocol {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::FrskyV),
            1 => Some(Self::FrskyD),
            2 => Some(Self::FrskyX),
            3 => Some(Self::FrskyXEu),
            _ => None,
        }
    }

    /// The 19-byte register profile written to the common address table
    /// (spec §6 "Radio chip control primitives"; addresses themselves are a
    /// silicon detail the radio driver owns, not modeled here).
    pub fn register_profile(self) -> [u8; 19] {
        match self {
            Self::FrskyV => [
                0x06, 0x06, 0x0c, 0x18, 0xff, 0x04, 0x05, 0xfe, 0x08, 0x00, 0x5c, 0x58, 0x9d, 0xAA, 0x10, 0x93, 0x23,
                0x7a, 0x41,
            ],
            Self::FrskyD => [
                0x06, 0x06, 0x0c, 0x18, 0x19, 0x04, 0x05, 0xff, 0x08, 0x00, 0x5c, 0x76, 0x27, 0xAA, 0x39, 0x11, 0x23,
                0x7a, 0x42,
            ],
            Self::FrskyX => [
                0x06, 0x06, 0x0c, 0x18, 0x1E, 0x04, 0x01, 0xff, 0x0A, 0x00, 0x5c, 0x76, 0x27, 0x7B, 0x61, 0x13, 0x23,
                0x7a, 0x51,
            ],
            Self::FrskyXEu => [
                0x06, 0x06, 0x0E, 0x18, 0x23, 0x04, 0x01, 0xff, 0x08, 0x00, 0x5c, 0x80, 0x00, 0x7B, 0xF8, 0x03, 0x23,
                0x7a, 0x53,
            ],
        }
    }

    /// Declared payload length for a data packet (spec §4.5: "declared
    /// length equals the configured protocol's length (29 or 32 bytes)");
    /// `FrskyXEu` is the LBT/EU variant with the longer duty-cycle-compliant
    /// frame (`FRSKY_PACKET_LENGTH_EU` in `original_source/src/helper/frsky.h`).
    pub fn payload_length(self) -> usize {
        match self {
            Self::FrskyV | Self::FrskyD | Self::FrskyX => 29,
            Self::FrskyXEu => 32,
        }
    }

    /// Whether this variant is one of the FrSkyX data-packet / CRC-validated
    /// family (spec §4.5 heading "Data-packet validation (FSKX variants)").
    pub fn is_fskx(self) -> bool {
        matches!(self, Self::FrskyX | Self::FrskyXEu)
    }
}

/// Register writes applied after the per-variant profile, identical across
/// all four variants (`frsky_conf_common` in the original source).
pub const COMMON_PROFILE: [u8; 17] = [
    0x16, 0x6c, 0x43, 0x40, 0x91, 0x56, 0x10, 0xa9, 0x0A, 0x00, 0x11, 0x59, 0x88, 0x31, 0x0B, 0x07, 0x00,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_id() {
        for (id, expected) in [(0, FskProtocol::FrskyV), (1, FskProtocol::FrskyD), (2, FskProtocol::FrskyX), (3, FskProtocol::FrskyXEu)] {
            assert_eq!(FskProtocol::from_id(id), Some(expected));
        }
        assert_eq!(FskProtocol::from_id(4), None);
    }

    #[test]
    fn fskx_variants_are_flagged() {
        assert!(FskProtocol::FrskyX.is_fskx());
        assert!(FskProtocol::FrskyXEu.is_fskx());
        assert!(!FskProtocol::FrskyV.is_fskx());
        assert!(!FskProtocol::FrskyD.is_fskx());
    }

    #[test]
    fn profiles_have_distinct_deviation_byte() {
        let devs: heapless::Vec<u8, 4> = [FskProtocol::FrskyV, FskProtocol::FrskyD, FskProtocol::FrskyX, FskProtocol::FrskyXEu]
            .iter()
            .map(|p| p.register_profile()[18])
            .collect();
        assert_eq!(devs.as_slice(), &[0x41, 0x42, 0x51, 0x53]);
    }
}
