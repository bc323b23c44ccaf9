//! Hardware contracts the protocol state machines are built against (spec §2,
//! "external collaborators"). Concrete implementations live in the firmware
//! crate; everything in [`crate::protocols`] is generic over these traits so
//! it can be driven by a fake radio in host tests.

/// Which of the two chips a call or event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip {
    Dsss,
    Fsk,
}

/// Power-down / receive / transmit mode for a radio chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    Off,
    Rx,
    Tx,
}

/// Per-hop RF-section parameters for the DSSS chip (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DsssHopConfig {
    pub channel: u8,
    pub sop_col: u8,
    pub data_col: u8,
    pub pn_row: u8,
    pub is_dsm2: bool,
    pub crc_seed: u16,
}

/// The DSSS (CYRF6936-compatible) chip driver contract.
pub trait DsssRadio {
    type Error;

    fn reset(&mut self) -> Result<(), Self::Error>;
    fn set_mode(&mut self, mode: RadioMode) -> Result<(), Self::Error>;
    fn configure_hop(&mut self, cfg: DsssHopConfig) -> Result<(), Self::Error>;
    fn start_receive(&mut self) -> Result<(), Self::Error>;
    fn abort_receive(&mut self) -> Result<(), Self::Error>;
    fn flush(&mut self) -> Result<(), Self::Error>;
    fn read_payload(&mut self, out: &mut [u8]) -> Result<usize, Self::Error>;
    fn crc_ok(&self) -> bool;
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;
    fn manufacturer_id(&mut self) -> Result<u32, Self::Error>;
}

/// Per-hop RF-section parameters for the FSK chip (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FskHopConfig {
    pub channel: u8,
    pub fscal1: u8,
    pub fscal2: u8,
    pub fscal3: u8,
}

/// The FSK (CC2500-compatible) chip driver contract.
pub trait FskRadio {
    type Error;

    fn reset(&mut self) -> Result<(), Self::Error>;
    fn set_mode(&mut self, mode: RadioMode) -> Result<(), Self::Error>;
    fn set_fsctrl0(&mut self, trim: i8) -> Result<(), Self::Error>;
    fn set_address(&mut self, id: [u8; 2]) -> Result<(), Self::Error>;
    fn calibrate(&mut self, channel: u8) -> Result<u8, Self::Error>;
    fn read_fscal2_fscal3(&mut self) -> Result<(u8, u8), Self::Error>;
    fn configure_hop(&mut self, cfg: FskHopConfig) -> Result<(), Self::Error>;
    fn start_receive(&mut self) -> Result<(), Self::Error>;
    fn abort_receive(&mut self) -> Result<(), Self::Error>;
    fn flush(&mut self) -> Result<(), Self::Error>;
    fn read_payload(&mut self, out: &mut [u8]) -> Result<usize, Self::Error>;
    fn crc_ok(&self) -> bool;
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;
    fn manufacturer_id(&mut self) -> Result<u32, Self::Error>;
}

/// A one-shot microsecond-scale timer with a single pending deadline (spec §3
/// `TickDeadline`, §5 "cancellation and timeouts").
pub trait TickTimer {
    /// Arm the timer to fire in `ticks_10us` units of 10 microseconds,
    /// cancelling any previously pending deadline.
    fn set(&mut self, ticks_10us: u32);
    /// Disarm the timer.
    fn stop(&mut self);
    /// Elapsed 10-microsecond ticks since the deadline was armed.
    fn elapsed(&self) -> u32;
}

/// Selects which chip is connected to the antenna (spec §2 item 3).
pub trait AntennaMux {
    fn select(&mut self, chip: Chip);
}
