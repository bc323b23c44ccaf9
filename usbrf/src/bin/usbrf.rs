#![no_std]
#![no_main]

//! # usbrf dongle firmware
//!
//! Wires the board's two radio chips, tick timer, antenna mux and flash
//! config store into the six protocol slots (spec §4.2–§4.6) behind one
//! [`Dispatcher`], then drives everything from a single `select`-based main
//! loop: USB bytes in, a periodic radio poll, and the tick-timer deadline.
//!
//! The CDC-ACM endpoint carries two things multiplexed on one stream, since
//! the dongle exposes a single USB serial port to the host: frames starting
//! with `STX` are the binary host-link protocol (spec §6, framed per
//! [`usbrf::usb_hostlink`]); anything else up to the next `\n` is a console
//! command line (spec §6 "Console commands", `SPEC_FULL.md` §B). Neither the
//! spec nor `original_source/` constrains how the two share a transport —
//! this crate's own choice, same as the frame checksum itself.

use core::cell::RefCell;

use defmt::info;
use embassy_executor::Spawner;
use embassy_futures::select::{select4, Either4};
use embassy_sync::signal::Signal;
use embassy_sync::watch::Watch;
use embassy_time::{Duration, Timer};
use embassy_usb::class::cdc_acm::State;
use heapless::Vec as HVec;
use {defmt_rtt as _, panic_probe as _};

use usbrf::board::{blink, user_intf, Board, ButtonPressKind, LedMode, RadioSpiDevice, SignalLedMode, WatchButtonPress};
use usbrf::console;
use usbrf::flash_config::FlashConfigStore;
use usbrf::radio::{cc2500::Cc2500Radio, cyrf6936::Cyrf6936Radio};
use usbrf::shared::Shared;
use usbrf::tick::StmTickTimer;
use usbrf::usb_hostlink::{build_usb, decode_frame, encode_frame, MAX_FRAME};

use usbrf_core::config::{self, Config};
use usbrf_core::dispatcher::{Dispatcher, ExecType, ProtocolSlot};
use usbrf_core::hal::{DsssRadio, FskRadio};
use usbrf_core::hostlink::{dispatch_to, DeviceInfo, DeviceMessage, HostMessage};
use usbrf_core::identity::{RadioEvent, RcChannelBuffer};
use usbrf_core::protocols::dsss_hacker::DsssHacker;
use usbrf_core::protocols::dsss_scanner::DsssScanner;
use usbrf_core::protocols::fsk_hacker::FskHacker;
use usbrf_core::protocols::fsk_receiver::FskReceiver;
use usbrf_core::protocols::fsk_scanner::FskScanner;
use usbrf_core::protocols::fsk_transmitter::FskTransmitter;

/// Board identity reported over `REQ_INFO` (spec §6); this dongle design has
/// no board-revision strapping, so it's a fixed constant.
const BOARD_ID: u32 = 1;
const SW_VERSION: u32 = 1;
const HW_ID: [u32; 3] = [0, 0, 0];

const STX: u8 = 0x7E;
const RADIO_POLL_PERIOD: Duration = Duration::from_millis(2);

static BUTTON_PRESS: WatchButtonPress = Watch::new();
static LED_MODE: SignalLedMode = Signal::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Starting usbrf");

    let board = Board::init(&spawner).await;

    spawner.spawn(blink(board.led, &LED_MODE)).unwrap();
    spawner.spawn(user_intf(board.button, &BUTTON_PRESS)).unwrap();
    LED_MODE.signal(LedMode::BlinkSlow);

    let cyrf_cell = RefCell::new(board.cyrf);
    let cc2500_cell = RefCell::new(board.cc2500);
    let tick_cell = RefCell::new(board.tick);
    let antenna_cell = RefCell::new(board.antenna);
    let store_cell = RefCell::new(board.config_store);
    let rc_channels = RefCell::new(RcChannelBuffer::default());

    let mut config = match config::load(&mut *store_cell.borrow_mut()) {
        Ok(cfg) => cfg,
        Err(_) => Config::default(),
    };

    let mut dsss_scanner = DsssScanner::new(Shared::new(&cyrf_cell), Shared::new(&tick_cell), Shared::new(&antenna_cell));
    let mut dsss_hacker = DsssHacker::new(
        Shared::new(&cyrf_cell),
        Shared::new(&tick_cell),
        Shared::new(&antenna_cell),
        &rc_channels,
    );
    let mut fsk_scanner = FskScanner::new(
        Shared::new(&cc2500_cell),
        Shared::new(&tick_cell),
        Shared::new(&antenna_cell),
        config.cc_fsctrl0,
    );
    let mut fsk_hacker = FskHacker::new(
        Shared::new(&cc2500_cell),
        Shared::new(&tick_cell),
        Shared::new(&antenna_cell),
        &rc_channels,
    );
    let mut fsk_receiver = FskReceiver::new(
        Shared::new(&cc2500_cell),
        Shared::new(&tick_cell),
        Shared::new(&antenna_cell),
        Shared::new(&store_cell),
        config.clone(),
    );
    let mut fsk_transmitter = FskTransmitter::new(
        Shared::new(&cc2500_cell),
        Shared::new(&tick_cell),
        Shared::new(&antenna_cell),
        &rc_channels,
        config.clone(),
    );

    let mut slots: [&mut dyn ProtocolSlot; 6] = [
        &mut dsss_scanner,
        &mut dsss_hacker,
        &mut fsk_scanner,
        &mut fsk_hacker,
        &mut fsk_receiver,
        &mut fsk_transmitter,
    ];
    let mut dispatcher = Dispatcher::new(&mut slots, &rc_channels);
    dispatcher.init();

    let mut config_descriptor = [0u8; 256];
    let mut bos_descriptor = [0u8; 256];
    let mut control_buf = [0u8; 64];
    let mut state = State::new();
    let (mut usb, mut class) = build_usb(
        board.usb_driver,
        &mut config_descriptor,
        &mut bos_descriptor,
        &mut control_buf,
        &mut state,
    );

    let usb_fut = usb.run();

    let mut button_press = BUTTON_PRESS.receiver().unwrap();

    let app_fut = async {
        let mut rx: HVec<u8, 256> = HVec::new();
        let mut chunk = [0u8; 64];
        let mut reply: HVec<u8, 200> = HVec::new();
        let mut channels_scratch = [0u16; 16];
        let mut dsss_buf = [0u8; 32];
        let mut fsk_buf = [0u8; 40];

        loop {
            class.wait_connection().await;
            info!("host connected");
            rx.clear();

            loop {
                let read = class.read_packet(&mut chunk);
                let poll = Timer::after(RADIO_POLL_PERIOD);
                let tick = tick_wait(&tick_cell);
                let button = button_press.changed();

                match select4(read, poll, tick, button).await {
                    Either4::First(Ok(n)) => {
                        for &b in &chunk[..n] {
                            if rx.push(b).is_err() {
                                rx.clear();
                                break;
                            }
                        }
                        while let Some(consumed) = process_one_unit(
                            &rx,
                            &mut dispatcher,
                            &mut config,
                            &store_cell,
                            &mut channels_scratch,
                            &mut reply,
                        ) {
                            let remaining = rx.len() - consumed;
                            rx.copy_within(consumed.., 0);
                            rx.truncate(remaining);
                            if !reply.is_empty() {
                                let _ = class.write_packet(&reply).await;
                                reply.clear();
                            }
                        }
                    }
                    Either4::First(Err(_)) => break,
                    Either4::Second(()) => {
                        poll_dsss(&cyrf_cell, &mut dsss_buf, &mut dispatcher);
                        poll_fsk(&cc2500_cell, &mut fsk_buf, &mut dispatcher);
                    }
                    Either4::Third(()) => {
                        tick_cell.borrow_mut().stop();
                        dispatcher.on_tick_expired();
                    }
                    Either4::Fourth(kind) => on_button_press(kind, &mut dispatcher),
                }
            }
            info!("host disconnected");
        }
    };

    embassy_futures::join::join(usb_fut, app_fut).await;
}

/// Waits for the shared tick timer's armed deadline, or forever if nothing
/// is armed. Reads the deadline and drops the borrow before awaiting, so
/// `set`/`stop` calls made by whichever protocol is current (through
/// [`usbrf::shared::Shared`]) are never blocked by an outstanding borrow.
async fn tick_wait(tick_cell: &RefCell<StmTickTimer>) {
    match tick_cell.borrow().deadline() {
        Some(at) => Timer::at(at).await,
        None => core::future::pending::<()>().await,
    }
}

/// Short press stops whatever protocol is currently running; long press
/// cycles to the next slot and starts it (double press is reserved, not
/// acted on here). Matches the promise made in [`usbrf::board::user_intf`]'s
/// doc comment.
fn on_button_press(kind: ButtonPressKind, dispatcher: &mut Dispatcher<'_>) {
    match kind {
        ButtonPressKind::Short => {
            dispatcher.exec(dispatcher.current(), ExecType::Stop, &[], 0, 0);
        }
        ButtonPressKind::Long => {
            let next = (dispatcher.current() + 1).rem_euclid(dispatcher.slot_count() as i8);
            dispatcher.exec(next, ExecType::Start, &[], 0, 0);
        }
        ButtonPressKind::Double => {}
    }
}

fn poll_dsss(cell: &RefCell<Cyrf6936Radio<RadioSpiDevice>>, buf: &mut [u8], dispatcher: &mut Dispatcher<'_>) {
    match cell.borrow_mut().read_payload(buf) {
        Ok(n) if n > 0 => {
            let error = !cell.borrow().crc_ok();
            dispatcher.on_radio_event(RadioEvent::RecvReady { length: n as u8, error });
        }
        _ => {}
    }
}

fn poll_fsk(cell: &RefCell<Cc2500Radio<RadioSpiDevice>>, buf: &mut [u8], dispatcher: &mut Dispatcher<'_>) {
    match cell.borrow_mut().read_payload(buf) {
        Ok(n) if n > 0 => {
            let error = !cell.borrow().crc_ok();
            dispatcher.on_radio_event(RadioEvent::RecvReady { length: n as u8, error });
        }
        _ => {}
    }
}

/// Tries to pull one complete unit (binary frame or console line) off the
/// front of `rx`, handle it, and write any reply into `reply`. Returns the
/// number of bytes consumed, or `None` if `rx` doesn't yet hold a whole unit.
fn process_one_unit(
    rx: &[u8],
    dispatcher: &mut Dispatcher<'_>,
    config: &mut Config,
    store_cell: &RefCell<FlashConfigStore<'static>>,
    channels_scratch: &mut [u16; 16],
    reply: &mut HVec<u8, 200>,
) -> Option<usize> {
    if rx.is_empty() {
        return None;
    }

    if rx[0] == STX {
        if rx.len() < 4 {
            return None;
        }
        let len = u16::from_le_bytes([rx[2], rx[3]]) as usize;
        let total = 4 + len + 1;
        if rx.len() < total {
            return None;
        }
        let id = rx[1];
        let payload = &rx[4..4 + len];
        let expected = rx[1..total - 1].iter().fold(0u8, |acc, b| acc ^ b);
        if rx[total - 1] == expected {
            if let Some(msg) = decode_frame(id, payload, channels_scratch) {
                handle_host_message(&msg, dispatcher, reply);
            }
        }
        return Some(total);
    }

    let newline = rx.iter().position(|&b| b == b'\n')?;
    let line = core::str::from_utf8(&rx[..newline]).unwrap_or("").trim_end_matches('\r');

    let mut store = Shared::new(store_cell);
    let console_reply = console::run_line(line, dispatcher, &mut store, config);
    let _ = reply.extend_from_slice(console_reply.as_bytes());
    let _ = reply.push(b'\n');

    Some(newline + 1)
}

fn handle_host_message(msg: &HostMessage<'_>, dispatcher: &mut Dispatcher<'_>, reply: &mut HVec<u8, 200>) {
    match msg {
        HostMessage::ReqInfo { .. } => {
            let info = DeviceMessage::Info(DeviceInfo {
                board: BOARD_ID,
                sw_version: SW_VERSION,
                hw_id: HW_ID,
            });
            let mut framed: HVec<u8, MAX_FRAME> = HVec::new();
            if encode_frame(&info, &mut framed) {
                let _ = reply.extend_from_slice(&framed);
            }
        }
        _ => dispatch_to(dispatcher, msg),
    }
}
