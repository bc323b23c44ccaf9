//! Lets more than one protocol slot share a single physical peripheral
//! (spec §5 "shared state": the same single-writer `RefCell` discipline
//! [`usbrf_core::identity::RcChannelBuffer`] uses, applied here to the radio
//! chips, the tick timer, the antenna mux and the flash config store since
//! `bin/usbrf.rs` only ever has one real instance of each but six protocol
//! slots that each take their collaborators by value).
//!
//! Only one slot is ever `running` at a time (`Dispatcher::exec`), so the
//! borrows below never actually contend; the `RefCell` just lets the type
//! system see that.

use core::cell::RefCell;

use usbrf_core::config::ConfigStore;
use usbrf_core::hal::{AntennaMux, Chip, DsssHopConfig, DsssRadio, FskHopConfig, FskRadio, RadioMode, TickTimer};

pub struct Shared<'a, T>(&'a RefCell<T>);

impl<'a, T> Shared<'a, T> {
    pub fn new(inner: &'a RefCell<T>) -> Self {
        Self(inner)
    }
}

impl<'a, R: DsssRadio> DsssRadio for Shared<'a, R> {
    type Error = R::Error;

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().reset()
    }
    fn set_mode(&mut self, mode: RadioMode) -> Result<(), Self::Error> {
        self.0.borrow_mut().set_mode(mode)
    }
    fn configure_hop(&mut self, cfg: DsssHopConfig) -> Result<(), Self::Error> {
        self.0.borrow_mut().configure_hop(cfg)
    }
    fn start_receive(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().start_receive()
    }
    fn abort_receive(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().abort_receive()
    }
    fn flush(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().flush()
    }
    fn read_payload(&mut self, out: &mut [u8]) -> Result<usize, Self::Error> {
        self.0.borrow_mut().read_payload(out)
    }
    fn crc_ok(&self) -> bool {
        self.0.borrow().crc_ok()
    }
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.0.borrow_mut().send(data)
    }
    fn manufacturer_id(&mut self) -> Result<u32, Self::Error> {
        self.0.borrow_mut().manufacturer_id()
    }
}

impl<'a, R: FskRadio> FskRadio for Shared<'a, R> {
    type Error = R::Error;

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().reset()
    }
    fn set_mode(&mut self, mode: RadioMode) -> Result<(), Self::Error> {
        self.0.borrow_mut().set_mode(mode)
    }
    fn set_fsctrl0(&mut self, trim: i8) -> Result<(), Self::Error> {
        self.0.borrow_mut().set_fsctrl0(trim)
    }
    fn set_address(&mut self, id: [u8; 2]) -> Result<(), Self::Error> {
        self.0.borrow_mut().set_address(id)
    }
    fn calibrate(&mut self, channel: u8) -> Result<u8, Self::Error> {
        self.0.borrow_mut().calibrate(channel)
    }
    fn read_fscal2_fscal3(&mut self) -> Result<(u8, u8), Self::Error> {
        self.0.borrow_mut().read_fscal2_fscal3()
    }
    fn configure_hop(&mut self, cfg: FskHopConfig) -> Result<(), Self::Error> {
        self.0.borrow_mut().configure_hop(cfg)
    }
    fn start_receive(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().start_receive()
    }
    fn abort_receive(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().abort_receive()
    }
    fn flush(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().flush()
    }
    fn read_payload(&mut self, out: &mut [u8]) -> Result<usize, Self::Error> {
        self.0.borrow_mut().read_payload(out)
    }
    fn crc_ok(&self) -> bool {
        self.0.borrow().crc_ok()
    }
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.0.borrow_mut().send(data)
    }
    fn manufacturer_id(&mut self) -> Result<u32, Self::Error> {
        self.0.borrow_mut().manufacturer_id()
    }
}

impl<'a, A: AntennaMux> AntennaMux for Shared<'a, A> {
    fn select(&mut self, chip: Chip) {
        self.0.borrow_mut().select(chip)
    }
}

impl<'a, T: TickTimer> TickTimer for Shared<'a, T> {
    fn set(&mut self, ticks_10us: u32) {
        self.0.borrow_mut().set(ticks_10us)
    }
    fn stop(&mut self) {
        self.0.borrow_mut().stop()
    }
    fn elapsed(&self) -> u32 {
        self.0.borrow().elapsed()
    }
}

impl<'a, S: ConfigStore> ConfigStore for Shared<'a, S> {
    type Error = S::Error;

    fn read(&mut self, out: &mut [u8; usbrf_core::config::ENCODED_LEN]) -> Result<(), Self::Error> {
        self.0.borrow_mut().read(out)
    }
    fn write(&mut self, data: &[u8; usbrf_core::config::ENCODED_LEN]) -> Result<(), Self::Error> {
        self.0.borrow_mut().write(data)
    }
}
