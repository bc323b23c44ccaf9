//! Flash-backed [`usbrf_core::config::ConfigStore`] for the last page of the
//! STM32F103's internal flash (spec §6 "Persisted configuration", §9 design
//! note "Macro-synthesized config struct → schema-driven derive").
//!
//! The reference firmware persists into an EEPROM-emulated flash page
//! (`original_source/src/modules/config.c`); this erases and rewrites the
//! same single page every `save`, which is the flash-write pattern the
//! teacher's own `Lr2021`/board code doesn't need but `embassy-stm32`'s
//! `Flash` driver exposes directly.

use embassy_stm32::flash::{Error as FlashError, Flash};

use usbrf_core::config::{ConfigStore, ENCODED_LEN};

/// Last 1K page of a 128K STM32F103RB, reserved for configuration.
const CONFIG_OFFSET: u32 = 127 * 1024;

pub struct FlashConfigStore<'a> {
    flash: Flash<'a>,
}

impl<'a> FlashConfigStore<'a> {
    pub fn new(flash: Flash<'a>) -> Self {
        Self { flash }
    }
}

impl<'a> ConfigStore for FlashConfigStore<'a> {
    type Error = FlashError;

    fn read(&mut self, out: &mut [u8; ENCODED_LEN]) -> Result<(), Self::Error> {
        self.flash.blocking_read(CONFIG_OFFSET, out)
    }

    fn write(&mut self, data: &[u8; ENCODED_LEN]) -> Result<(), Self::Error> {
        self.flash.blocking_erase(CONFIG_OFFSET, CONFIG_OFFSET + 1024)?;
        self.flash.blocking_write(CONFIG_OFFSET, data)
    }
}
