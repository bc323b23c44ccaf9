//! Hardware-agnostic core of the usbrf dongle firmware.
//!
//! This crate holds everything that does not need to touch silicon: the
//! pseudo-noise/CRC tables, the DSMX channel-sequence generator, the
//! per-protocol hop-synchronization and takeover state machines, the
//! protocol dispatcher, the host-link message framing, and the persisted
//! configuration schema. The two radio chips, the tick timer, the antenna
//! mux and the serial transport are reached only through the traits in
//! [`hal`] so every state machine here can be driven and tested with a
//! fake radio instead of real hardware.
#![no_std]

pub mod channel_decode;
pub mod config;
pub mod dispatcher;
pub mod dsm_channels;
pub mod frsky_crc;
pub mod fsk_protocol;
pub mod hal;
pub mod hostlink;
pub mod identity;
pub mod pn_codes;
pub mod protocols;
