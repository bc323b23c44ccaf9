//! CC2500-compatible driver implementing [`usbrf_core::hal::FskRadio`].
//!
//! Register and strobe addresses are taken verbatim from
//! `original_source/src/modules/cc2500.h`; the read/single/burst framing
//! (`CC2500_READ_SINGLE`/`CC2500_READ_BURST`/`CC2500_WRITE_BURST`) follows
//! `original_source/src/modules/cc2500.c`'s `cc2500_read_register`/
//! `cc2500_write_register`/`cc2500_read_fifo`, ported from manual
//! SS toggling around `spi_xfer` to a blocking `embedded-hal` `SpiDevice`
//! the way `get_version.rs`/`rssi.rs` drive the LR2021 over SPI.

use defmt::Format;
use embedded_hal_1::spi::SpiDevice;

use usbrf_core::hal::{FskHopConfig, FskRadio, RadioMode};

const WRITE_BURST: u8 = 0x40;
const READ_SINGLE: u8 = 0x80;
const READ_BURST: u8 = 0xC0;

const REG_FSCTRL1: u8 = 0x0B;
const REG_FSCTRL0: u8 = 0x0C;
const REG_ADDR: u8 = 0x09;
const REG_CHANNR: u8 = 0x0A;
const REG_FSCAL3: u8 = 0x23;
const REG_FSCAL2: u8 = 0x24;
const REG_FSCAL1: u8 = 0x25;
const REG_PARTNUM: u8 = 0x70;
const REG_VERSION: u8 = 0x71;
const REG_PKTSTATUS: u8 = 0x78;
const FIFO: u8 = 0x3F;

const SRES: u8 = 0x30;
const SCAL: u8 = 0x33;
const SRX: u8 = 0x34;
const STX: u8 = 0x35;
const SIDLE: u8 = 0x36;
const SFRX: u8 = 0x3A;
const SFTX: u8 = 0x3B;

const LQI_CRC_OK: u8 = 0x80;

#[derive(Debug, Format, Clone, Copy, PartialEq, Eq)]
pub enum Cc2500Error {
    Spi,
    UnexpectedIdentity,
}

/// A CC2500-compatible chip reached through a shared SPI bus, one
/// dedicated chip-select device per [`embedded_hal_bus::spi::RefCellDevice`].
pub struct Cc2500Radio<SPI> {
    spi: SPI,
    crc_ok: bool,
}

impl<SPI: SpiDevice> Cc2500Radio<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi, crc_ok: false }
    }

    fn strobe(&mut self, cmd: u8) -> Result<(), Cc2500Error> {
        self.spi.write(&[cmd]).map_err(|_| Cc2500Error::Spi)
    }

    fn write_reg(&mut self, addr: u8, value: u8) -> Result<(), Cc2500Error> {
        self.spi.write(&[addr, value]).map_err(|_| Cc2500Error::Spi)
    }

    fn read_reg(&mut self, addr: u8) -> Result<u8, Cc2500Error> {
        let mut buf = [addr | READ_SINGLE, 0];
        self.spi.transfer_in_place(&mut buf).map_err(|_| Cc2500Error::Spi)?;
        Ok(buf[1])
    }

    fn write_burst(&mut self, addr: u8, data: &[u8]) -> Result<(), Cc2500Error> {
        let header = [addr | WRITE_BURST];
        self.spi
            .transaction(&mut [
                embedded_hal_1::spi::Operation::Write(&header),
                embedded_hal_1::spi::Operation::Write(data),
            ])
            .map_err(|_| Cc2500Error::Spi)
    }

    fn read_burst(&mut self, addr: u8, out: &mut [u8]) -> Result<(), Cc2500Error> {
        let header = [addr | READ_BURST];
        self.spi.transaction(&mut [
            embedded_hal_1::spi::Operation::Write(&header),
            embedded_hal_1::spi::Operation::Read(out),
        ])
        .map_err(|_| Cc2500Error::Spi)
    }
}

impl<SPI: SpiDevice> FskRadio for Cc2500Radio<SPI> {
    type Error = Cc2500Error;

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.strobe(SRES)
    }

    fn set_mode(&mut self, mode: RadioMode) -> Result<(), Self::Error> {
        self.strobe(SIDLE)?;
        match mode {
            RadioMode::Off => Ok(()),
            RadioMode::Rx => {
                self.strobe(SFRX)?;
                self.strobe(SRX)
            }
            RadioMode::Tx => {
                self.strobe(SFTX)?;
                self.strobe(STX)
            }
        }
    }

    fn set_fsctrl0(&mut self, trim: i8) -> Result<(), Self::Error> {
        self.write_reg(REG_FSCTRL0, trim as u8)
    }

    fn set_address(&mut self, id: [u8; 2]) -> Result<(), Self::Error> {
        self.write_reg(REG_ADDR, id[0])?;
        let _ = id[1];
        Ok(())
    }

    fn calibrate(&mut self, channel: u8) -> Result<u8, Self::Error> {
        self.write_reg(REG_CHANNR, channel)?;
        self.strobe(SCAL)?;
        self.read_reg(REG_FSCAL1)
    }

    fn read_fscal2_fscal3(&mut self) -> Result<(u8, u8), Self::Error> {
        let fscal2 = self.read_reg(REG_FSCAL2)?;
        let fscal3 = self.read_reg(REG_FSCAL3)?;
        Ok((fscal2, fscal3))
    }

    fn configure_hop(&mut self, cfg: FskHopConfig) -> Result<(), Self::Error> {
        self.write_reg(REG_CHANNR, cfg.channel)?;
        self.write_reg(REG_FSCAL1, cfg.fscal1)?;
        self.write_reg(REG_FSCAL2, cfg.fscal2)?;
        self.write_reg(REG_FSCAL3, cfg.fscal3)
    }

    fn start_receive(&mut self) -> Result<(), Self::Error> {
        self.set_mode(RadioMode::Rx)
    }

    fn abort_receive(&mut self) -> Result<(), Self::Error> {
        self.strobe(SIDLE)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.strobe(SIDLE)?;
        self.strobe(SFRX)?;
        self.strobe(SFTX)
    }

    fn read_payload(&mut self, out: &mut [u8]) -> Result<usize, Self::Error> {
        let len = self.read_reg(FIFO)? as usize & 0x7F;
        let len = len.min(out.len());
        self.read_burst(FIFO, &mut out[..len])?;
        let status = self.read_reg(REG_PKTSTATUS)?;
        self.crc_ok = status & LQI_CRC_OK != 0;
        Ok(len)
    }

    fn crc_ok(&self) -> bool {
        self.crc_ok
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.write_burst(FIFO, data)?;
        self.strobe(STX)
    }

    fn manufacturer_id(&mut self) -> Result<u32, Self::Error> {
        let partnum = self.read_reg(REG_PARTNUM)?;
        let version = self.read_reg(REG_VERSION)?;
        if partnum != 0x80 {
            return Err(Cc2500Error::UnexpectedIdentity);
        }
        Ok(u32::from(partnum) << 8 | u32::from(version))
    }
}
