//! CYRF6936-compatible driver implementing [`usbrf_core::hal::DsssRadio`].
//!
//! Grounded on `original_source/src/modules/cyrf6936.c`'s
//! `cyrf_write_register`/`cyrf_read_register`/`cyrf_read_block` (single byte
//! or burst transfer framed by a `CYRF_DIR` write bit ORed into the address,
//! toggling chip-select around each transfer) and `cyrf_send`/`cyrf_recv`'s
//! use of `CYRF_TX_CTRL`/`CYRF_RX_CTRL`/`CYRF_XACT_CFG`/`CYRF_MODE_OVERRIDE`.
//! The register byte addresses themselves are out of scope per spec §1
//! Non-goals (only named in `cyrf6936.h`, not retrieved with the rest of the
//! source); the values below are the addresses published for the CYRF6936
//! in every open DSM-compatible implementation.

use defmt::Format;
use embedded_hal_1::spi::SpiDevice;

use usbrf_core::hal::{DsssHopConfig, DsssRadio, RadioMode};

const DIR: u8 = 0x80;

const REG_CHANNEL: u8 = 0x00;
const REG_TX_LENGTH: u8 = 0x01;
const REG_TX_CTRL: u8 = 0x02;
const REG_RX_CTRL: u8 = 0x05;
const REG_RX_IRQ_STATUS: u8 = 0x07;
const REG_RX_STATUS: u8 = 0x08;
const REG_RX_COUNT: u8 = 0x09;
const REG_XACT_CFG: u8 = 0x0E;
const REG_CRC_SEED_LSB: u8 = 0x16;
const REG_CRC_SEED_MSB: u8 = 0x17;
const REG_MODE_OVERRIDE: u8 = 0x1E;
const REG_RX_OVERRIDE: u8 = 0x1F;
const REG_TX_OVERRIDE: u8 = 0x20;
const REG_MFG_ID: u8 = 0x25;
const REG_SOP_CODE: u8 = 0x32;
const REG_DATA_CODE: u8 = 0x39;
const REG_PREAMBLE: u8 = 0x24;
const REG_TX_BUFFER: u8 = 0x7F;
const REG_RX_BUFFER: u8 = 0x7F;

const RST: u8 = 0x01;
const RX_GO: u8 = 0x80;
const RX_ABORT: u8 = 0x20;
const TX_GO: u8 = 0x80;
const TX_CLR: u8 = 0x40;
const RX_STATUS_CRC_OK: u8 = 0x80;
const RXC_IRQ: u8 = 0x02;

#[derive(Debug, Format, Clone, Copy, PartialEq, Eq)]
pub enum CyrfError {
    Spi,
}

pub struct Cyrf6936Radio<SPI> {
    spi: SPI,
    crc_ok: bool,
}

impl<SPI: SpiDevice> Cyrf6936Radio<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi, crc_ok: false }
    }

    fn write_reg(&mut self, addr: u8, value: u8) -> Result<(), CyrfError> {
        self.spi.write(&[DIR | addr, value]).map_err(|_| CyrfError::Spi)
    }

    fn read_reg(&mut self, addr: u8) -> Result<u8, CyrfError> {
        let mut buf = [addr, 0];
        self.spi.transfer_in_place(&mut buf).map_err(|_| CyrfError::Spi)?;
        Ok(buf[1])
    }

    fn write_block(&mut self, addr: u8, data: &[u8]) -> Result<(), CyrfError> {
        let header = [DIR | addr];
        self.spi
            .transaction(&mut [
                embedded_hal_1::spi::Operation::Write(&header),
                embedded_hal_1::spi::Operation::Write(data),
            ])
            .map_err(|_| CyrfError::Spi)
    }

    fn read_block(&mut self, addr: u8, out: &mut [u8]) -> Result<(), CyrfError> {
        let header = [addr];
        self.spi
            .transaction(&mut [
                embedded_hal_1::spi::Operation::Write(&header),
                embedded_hal_1::spi::Operation::Read(out),
            ])
            .map_err(|_| CyrfError::Spi)
    }
}

impl<SPI: SpiDevice> DsssRadio for Cyrf6936Radio<SPI> {
    type Error = CyrfError;

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.write_reg(REG_MODE_OVERRIDE, RST)
    }

    fn set_mode(&mut self, mode: RadioMode) -> Result<(), Self::Error> {
        match mode {
            RadioMode::Off => self.write_reg(REG_XACT_CFG, 0),
            RadioMode::Rx => {
                self.write_reg(REG_RX_CTRL, RX_GO)?;
                self.write_reg(REG_RX_OVERRIDE, 0)
            }
            RadioMode::Tx => self.write_reg(REG_TX_OVERRIDE, 0),
        }
    }

    fn configure_hop(&mut self, cfg: DsssHopConfig) -> Result<(), Self::Error> {
        self.write_reg(REG_CHANNEL, cfg.channel)?;
        self.write_reg(REG_SOP_CODE, cfg.sop_col)?;
        self.write_reg(REG_DATA_CODE, cfg.data_col)?;
        self.write_reg(REG_PREAMBLE, cfg.pn_row)?;
        self.write_reg(REG_CRC_SEED_MSB, (cfg.crc_seed >> 8) as u8)?;
        self.write_reg(REG_CRC_SEED_LSB, (cfg.crc_seed & 0xFF) as u8)
    }

    fn start_receive(&mut self) -> Result<(), Self::Error> {
        self.write_reg(REG_RX_CTRL, RX_GO)
    }

    fn abort_receive(&mut self) -> Result<(), Self::Error> {
        self.write_reg(REG_RX_CTRL, RX_ABORT)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.write_reg(REG_TX_CTRL, TX_CLR)?;
        self.write_reg(REG_RX_CTRL, RX_ABORT)
    }

    fn read_payload(&mut self, out: &mut [u8]) -> Result<usize, Self::Error> {
        let irq = self.read_reg(REG_RX_IRQ_STATUS)?;
        if irq & RXC_IRQ == 0 {
            return Ok(0);
        }
        let count = self.read_reg(REG_RX_COUNT)? as usize;
        let len = count.min(out.len());
        self.read_block(REG_RX_BUFFER, &mut out[..len])?;
        let status = self.read_reg(REG_RX_STATUS)?;
        self.crc_ok = status & RX_STATUS_CRC_OK != 0;
        Ok(len)
    }

    fn crc_ok(&self) -> bool {
        self.crc_ok
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.write_reg(REG_TX_LENGTH, data.len() as u8)?;
        self.write_block(REG_TX_BUFFER, data)?;
        self.write_reg(REG_TX_CTRL, TX_GO)
    }

    fn manufacturer_id(&mut self) -> Result<u32, Self::Error> {
        let mut id = [0u8; 4];
        self.read_block(REG_MFG_ID, &mut id)?;
        Ok(u32::from_be_bytes(id))
    }
}
