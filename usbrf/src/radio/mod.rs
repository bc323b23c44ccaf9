//! Concrete radio drivers wiring `usbrf-core`'s [`usbrf_core::hal`] traits to
//! real silicon over a shared SPI2 bus (spec §2 "two radio chips").

pub mod cc2500;
pub mod cyrf6936;
