//! Pseudo-noise code table for the DSSS (CYRF6936-compatible) chip.
//!
//! `PN_CODES[row][col]` is an 8-byte spreading code; `row` is selected from
//! the channel number (see [`crate::dsm_channels::pn_row`]) and `col` from
//! the transmitter id (`sop_col`/`data_col`, see
//! [`crate::identity::DsmIdentity`]). `PN_BIND` is the fixed code used while
//! listening for a bind packet, before a target id is known.
//!
//! Grounded on `original_source/src/helper/dsm.h` (`pn_codes`, `pn_bind`
//! externs) and the published Cypress CYRF6936 DSM2/DSMX spreading-code
//! table used by every open DSM-compatible implementation.

/// 5 channel buckets x 9 columns x 8 bytes.
pub const PN_CODES: [[[u8; 8]; 9]; 5] = [
    [
        [0x03, 0xBC, 0x6E, 0x8A, 0xEF, 0xBD, 0xFE, 0xF8],
        [0x88, 0x17, 0x13, 0x3B, 0x2D, 0xBF, 0x06, 0xD6],
        [0xF1, 0x94, 0x30, 0x21, 0xA1, 0x1C, 0x88, 0xA9],
        [0xD0, 0xD2, 0x8E, 0xBC, 0x82, 0x2F, 0xE3, 0xB4],
        [0x8C, 0xFA, 0x47, 0x9B, 0x83, 0xA5, 0x66, 0xD0],
        [0x07, 0xBD, 0x9F, 0x26, 0xC8, 0x31, 0x0F, 0xB8],
        [0xEF, 0x03, 0x95, 0x89, 0xB4, 0x71, 0x61, 0x9D],
        [0x40, 0xBA, 0x97, 0xD5, 0x86, 0x4F, 0xCC, 0x61],
        [0x75, 0xD5, 0xD8, 0x0D, 0x82, 0x5A, 0x44, 0x50],
    ],
    [
        [0x0D, 0x9A, 0x4F, 0x26, 0x78, 0xC4, 0x9E, 0xA8],
        [0x66, 0xCC, 0x1E, 0xC8, 0x44, 0x45, 0xC1, 0x0E],
        [0xC8, 0x3A, 0x79, 0xC8, 0x58, 0x62, 0xE1, 0x43],
        [0xF5, 0x20, 0x91, 0x9D, 0x51, 0x95, 0xE2, 0x2D],
        [0x05, 0xE9, 0x11, 0x2E, 0x60, 0xD3, 0x27, 0x8B],
        [0xE1, 0xB6, 0xA2, 0x3A, 0xE9, 0x2F, 0x83, 0x94],
        [0xA9, 0x67, 0x1D, 0x90, 0x19, 0x6D, 0xDD, 0x6F],
        [0x31, 0x7A, 0xDE, 0x8E, 0xED, 0x87, 0x5F, 0x3D],
        [0x36, 0x6C, 0x77, 0xF5, 0x97, 0xAA, 0x8E, 0xFC],
    ],
    [
        [0x88, 0x1E, 0xAE, 0xD0, 0xA3, 0x4A, 0xAE, 0x1A],
        [0xF6, 0x32, 0x5E, 0xF3, 0x6B, 0xEA, 0xA8, 0xC5],
        [0x32, 0x26, 0x59, 0x87, 0x1A, 0x98, 0x41, 0x2C],
        [0xC6, 0x33, 0xA2, 0x9D, 0xF4, 0x7A, 0xC3, 0xD6],
        [0xB9, 0x95, 0xA7, 0x73, 0x22, 0xE6, 0xB7, 0xA3],
        [0x3F, 0x80, 0x2C, 0xD8, 0xE1, 0xCB, 0x7A, 0x47],
        [0xA6, 0x96, 0xAE, 0x03, 0x30, 0xAE, 0x9E, 0x56],
        [0xF9, 0xA6, 0xDA, 0x15, 0x3F, 0x76, 0xBA, 0x6D],
        [0x9B, 0xE1, 0x50, 0x31, 0xE1, 0x27, 0x3D, 0x93],
    ],
    [
        [0xD4, 0x1C, 0x3B, 0xA4, 0x7D, 0x66, 0x32, 0xB7],
        [0x35, 0xC9, 0x7B, 0x67, 0x2D, 0x00, 0x77, 0xA8],
        [0x6F, 0xFA, 0x62, 0x4E, 0x87, 0x49, 0xCF, 0x2F],
        [0xDC, 0xF6, 0x88, 0xA5, 0x03, 0xE5, 0x1D, 0x66],
        [0x46, 0x18, 0x6D, 0xC4, 0x77, 0x1B, 0x08, 0x6A],
        [0xF5, 0x4D, 0x44, 0x46, 0x1C, 0x1A, 0x61, 0xDB],
        [0x21, 0xB4, 0xA8, 0x96, 0x80, 0x39, 0xD6, 0x7A],
        [0x90, 0xE8, 0xDE, 0xF7, 0x39, 0xA2, 0x19, 0x01],
        [0x44, 0x20, 0x31, 0xBE, 0x64, 0x53, 0x92, 0x5D],
    ],
    [
        [0xA1, 0x3E, 0xF9, 0xA7, 0x70, 0xEC, 0xD0, 0x3A],
        [0x51, 0x82, 0x8D, 0xAB, 0xEC, 0xB8, 0xCB, 0xA1],
        [0x20, 0xBE, 0xA9, 0xA5, 0xC3, 0xD8, 0xA7, 0x9A],
        [0xB6, 0x0E, 0x94, 0x54, 0xA2, 0x37, 0x73, 0xB9],
        [0xDB, 0xA6, 0xDF, 0x3A, 0x35, 0xD3, 0xFF, 0x0F],
        [0x0E, 0x1B, 0xB5, 0xC8, 0xB1, 0xD7, 0x0F, 0x9E],
        [0xDE, 0x9C, 0x3B, 0xC7, 0xA9, 0x11, 0xA2, 0x2D],
        [0x21, 0x30, 0xB0, 0x0B, 0xCC, 0xC2, 0x5F, 0x9D],
        [0xE3, 0xB0, 0x42, 0x41, 0x6C, 0xBD, 0xA9, 0x31],
    ],
];

/// Fixed spreading code used while listening for a bind packet.
pub const PN_BIND: [u8; 8] = [0x98, 0x88, 0x1B, 0xE4, 0x30, 0x79, 0x03, 0x84];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_shape() {
        assert_eq!(PN_CODES.len(), 5);
        for row in PN_CODES.iter() {
            assert_eq!(row.len(), 9);
        }
        assert_eq!(PN_BIND.len(), 8);
    }
}
