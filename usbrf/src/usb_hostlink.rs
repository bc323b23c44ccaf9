//! USB CDC-ACM host-link transport (spec §6 "Host link message set";
//! byte-level framing is explicitly out of scope per spec §1 Non-goals, so
//! the framing here — `STX, id, len:u16, payload, checksum` — is this
//! crate's own choice, not a port of anything in `original_source/`, which
//! talks to the host over a plain UART with no framing of its own).
//!
//! Decoding produces [`usbrf_core::hostlink::HostMessage`]s that
//! `bin/usbrf.rs` hands to [`usbrf_core::hostlink::dispatch_to`]; encoding
//! goes the other way for `INFO`/`RECV_DATA` replies.

use embassy_stm32::peripherals::USB;
use embassy_stm32::usb::Driver;
use embassy_usb::class::cdc_acm::{CdcAcmClass, State};
use embassy_usb::{Builder, Config, UsbDevice};
use heapless::Vec;

use usbrf_core::dispatcher::ExecType;
use usbrf_core::hostlink::{DeviceMessage, HostMessage};

const STX: u8 = 0x7E;
pub const MAX_FRAME: usize = 160;

const MSG_REQ_INFO: u8 = 0x01;
const MSG_INFO: u8 = 0x02;
const MSG_PROT_EXEC: u8 = 0x03;
const MSG_RC_DATA: u8 = 0x04;
const MSG_RECV_DATA: u8 = 0x05;

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Decode one complete frame's payload (header/checksum already stripped)
/// into a [`HostMessage`], or `None` for a malformed frame (spec §7
/// "Argument framing error": silently drop).
///
/// `RC_DATA` carries a `u16` little-endian list; it's decoded into
/// `channels_scratch` (owned by the caller, at least 16 entries) since
/// `HostMessage::RcData` borrows its channel slice rather than owning it.
pub fn decode_frame<'a>(id: u8, payload: &'a [u8], channels_scratch: &'a mut [u16; 16]) -> Option<HostMessage<'a>> {
    match id {
        MSG_REQ_INFO => payload.first().map(|&version| HostMessage::ReqInfo { version }),
        MSG_PROT_EXEC => {
            if payload.len() < 6 {
                return None;
            }
            let slot_id = payload[0] as i8;
            let exec_type = match payload[1] {
                0 => ExecType::Stop,
                1 => ExecType::Start,
                2 => ExecType::Extra,
                _ => return None,
            };
            let arg_offset = u16::from_le_bytes([payload[2], payload[3]]);
            let arg_total_len = u16::from_le_bytes([payload[4], payload[5]]);
            Some(HostMessage::ProtExec {
                id: slot_id,
                exec_type,
                arg_offset,
                arg_total_len,
                arg_data: &payload[6..],
            })
        }
        MSG_RC_DATA => {
            if payload.is_empty() || payload.len() % 2 != 0 || payload.len() > channels_scratch.len() * 2 {
                return None;
            }
            let n = payload.len() / 2;
            for (i, chunk) in payload.chunks_exact(2).enumerate() {
                channels_scratch[i] = u16::from_le_bytes([chunk[0], chunk[1]]);
            }
            Some(HostMessage::RcData { channels: &channels_scratch[..n] })
        }
        _ => None,
    }
}

/// Encode a [`DeviceMessage`] into a framed buffer ready to write to the
/// CDC-ACM endpoint.
pub fn encode_frame(msg: &DeviceMessage<'_>, out: &mut Vec<u8, MAX_FRAME>) -> bool {
    out.clear();
    let mut body: Vec<u8, MAX_FRAME> = Vec::new();
    let id = match msg {
        DeviceMessage::Info(info) => {
            let _ = body.extend_from_slice(&info.board.to_le_bytes());
            let _ = body.extend_from_slice(&info.sw_version.to_le_bytes());
            for word in info.hw_id {
                let _ = body.extend_from_slice(&word.to_le_bytes());
            }
            MSG_INFO
        }
        DeviceMessage::RecvData { chip_id, data } => {
            let _ = body.push(*chip_id);
            let _ = body.extend_from_slice(data);
            MSG_RECV_DATA
        }
    };
    if body.len() > u16::MAX as usize || out.capacity() < body.len() + 5 {
        return false;
    }
    let _ = out.push(STX);
    let _ = out.push(id);
    let _ = out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    let _ = out.extend_from_slice(&body);
    let _ = out.push(checksum(&out[1..]));
    true
}

/// Build the USB device and its single CDC-ACM data class (spec §2 "host
/// link", generic over the config descriptors the teacher's `embassy-usb`
/// dependency already pulls in).
pub fn build_usb<'d>(
    driver: Driver<'d, USB>,
    config_descriptor: &'d mut [u8],
    bos_descriptor: &'d mut [u8],
    control_buf: &'d mut [u8],
    state: &'d mut State<'d>,
) -> (UsbDevice<'d, Driver<'d, USB>>, CdcAcmClass<'d, Driver<'d, USB>>) {
    let mut config = Config::new(0x1209, 0x0001);
    config.manufacturer = Some("usbrf");
    config.product = Some("usbrf dongle");
    config.max_power = 100;
    config.max_packet_size_0 = 64;

    let mut builder = Builder::new(
        driver,
        config,
        config_descriptor,
        bos_descriptor,
        &mut [],
        control_buf,
    );

    let class = CdcAcmClass::new(&mut builder, state, 64);
    (builder.build(), class)
}
