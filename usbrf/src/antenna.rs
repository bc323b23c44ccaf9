//! Antenna switch implementing [`usbrf_core::hal::AntennaMux`] (spec §2 item
//! 3, supplemented feature "Antenna switch polarity table" in `SPEC_FULL.md`
//! §B).
//!
//! Grounded on `original_source/src/modules/ant_switch.c`: two GPIOs drive a
//! single-pole-double-throw RF switch, one level per chip.

use embassy_stm32::gpio::Output;

use usbrf_core::hal::{AntennaMux, Chip};

pub struct GpioAntennaMux<'a> {
    sw0: Output<'a>,
    sw1: Output<'a>,
}

impl<'a> GpioAntennaMux<'a> {
    pub fn new(sw0: Output<'a>, sw1: Output<'a>) -> Self {
        Self { sw0, sw1 }
    }
}

impl<'a> AntennaMux for GpioAntennaMux<'a> {
    fn select(&mut self, chip: Chip) {
        match chip {
            Chip::Dsss => {
                self.sw0.set_high();
                self.sw1.set_low();
            }
            Chip::Fsk => {
                self.sw0.set_low();
                self.sw1.set_high();
            }
        }
    }
}
