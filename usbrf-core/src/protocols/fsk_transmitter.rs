//! FSK transmitter (spec §4.5's forged-frame half, run continuously rather
//! than entered via takeover): acts as a bound FrSky transmitter, always
//! sending and only ever listening for telemetry in between sends.
//!
//! Grounded on `original_source/src/protocol/frsky_transmitter.c`: the fixed
//! `frsky_chanskip = 3` (no channel-skip negotiation, unlike the hacker which
//! learns it from a live transmitter), the `FRSKY_TRX_SEND` timer state
//! that hops, rebuilds and retransmits every `SEND_TIME`, and
//! `protocol_frsky_transmitter_receive`'s telemetry-only receive path.
//! Forged-frame building and telemetry parsing are shared with the hacker
//! through [`crate::protocols::fsk_common`]; as there the servo values come
//! from the live [`crate::identity::RcChannelBuffer`] rather than the
//! original's hardcoded 1500/3900 test constants.

use core::cell::RefCell;

use crate::config::Config;
use crate::dispatcher::{ExecType, ProtocolSlot};
use crate::fsk_protocol::FskProtocol;
use crate::hal::{AntennaMux, Chip, FskHopConfig, FskRadio, RadioMode, TickTimer};
use crate::identity::{RadioEvent, RcChannelBuffer, FRSKY_HOP_TABLE_LENGTH};
use crate::protocols::fsk_common::{advance_telemetry_sequence, build_data_frame, validate_telem_frame, SEND_TIME};

const CHANSKIP: u8 = 3;
const MAX_FRAME: usize = 35;

/// Continuously transmits forged control frames to a previously bound
/// receiver, listening for its telemetry in the gap between sends.
pub struct FskTransmitter<'a, R: FskRadio, T: TickTimer, A: AntennaMux> {
    radio: R,
    timer: T,
    antenna: A,
    rc_channels: &'a RefCell<RcChannelBuffer>,
    config: Config,

    protocol: FskProtocol,
    hop_idx: usize,
    fscal1: [u8; FRSKY_HOP_TABLE_LENGTH],
    fscal2: u8,
    fscal3: u8,
    send_seq: u8,
    recv_seq: u8,
    unk_num: u8,
    rx_num: u8,
}

impl<'a, R: FskRadio, T: TickTimer, A: AntennaMux> FskTransmitter<'a, R, T, A> {
    pub fn new(radio: R, timer: T, antenna: A, rc_channels: &'a RefCell<RcChannelBuffer>, config: Config) -> Self {
        Self {
            radio,
            timer,
            antenna,
            rc_channels,
            config,
            protocol: FskProtocol::FrskyXEu,
            hop_idx: 0,
            fscal1: [0; FRSKY_HOP_TABLE_LENGTH],
            fscal2: 0,
            fscal3: 0,
            send_seq: 0x8,
            recv_seq: 0,
            unk_num: 0x4,
            rx_num: 1,
        }
    }

    fn calibrate_hop_table(&mut self) {
        for i in 0..FRSKY_HOP_TABLE_LENGTH {
            if let Ok(fscal1) = self.radio.calibrate(self.config.frsky_hop_table[i]) {
                self.fscal1[i] = fscal1;
            }
        }
        if let Ok((f2, f3)) = self.radio.read_fscal2_fscal3() {
            self.fscal2 = f2;
            self.fscal3 = f3;
        }
    }

    fn next(&mut self) {
        self.hop_idx = (self.hop_idx + CHANSKIP as usize) % FRSKY_HOP_TABLE_LENGTH;
        let channel = self.config.frsky_hop_table[self.hop_idx];
        let _ = self.radio.configure_hop(FskHopConfig {
            channel,
            fscal1: self.fscal1[self.hop_idx],
            fscal2: self.fscal2,
            fscal3: self.fscal3,
        });
    }

    fn build_packet(&mut self, out: &mut [u8; MAX_FRAME]) {
        if self.send_seq != 0x8 {
            self.send_seq = (self.send_seq + 1) & 0x03;
        }
        let seq = (self.recv_seq << 4) | self.send_seq;
        let rc = self.rc_channels.borrow();
        build_data_frame(
            self.protocol,
            self.config.frsky_bind_id,
            self.unk_num,
            CHANSKIP,
            self.hop_idx as u8,
            self.rx_num,
            seq,
            |ch| rc.get(ch as usize).unwrap_or(1500),
            out,
        );
    }
}

impl<'a, R: FskRadio, T: TickTimer, A: AntennaMux> ProtocolSlot for FskTransmitter<'a, R, T, A> {
    fn name(&self) -> &'static str {
        "fsk_transmitter"
    }

    fn init(&mut self) {
        self.timer.stop();
        self.antenna.select(Chip::Fsk);
        let _ = self.radio.reset();
        let _ = self.radio.set_mode(RadioMode::Tx);
    }

    fn deinit(&mut self) {
        self.timer.stop();
    }

    fn start(&mut self) {
        self.send_seq = 0x8;
        self.recv_seq = 0;
        self.unk_num = 0x4;
        self.rx_num = 1;

        let _ = self.radio.set_fsctrl0(self.config.cc_fsctrl0);
        let _ = self.radio.set_address(self.config.frsky_bind_id);
        self.calibrate_hop_table();

        self.hop_idx = FRSKY_HOP_TABLE_LENGTH - 1;
        self.next();
        self.timer.set(SEND_TIME);
    }

    fn stop(&mut self) {
        self.timer.stop();
        let _ = self.radio.set_mode(RadioMode::Rx);
        let _ = self.radio.abort_receive();
    }

    fn run(&mut self) {}

    fn status(&self) -> &'static str {
        "send"
    }

    fn parse_arg(&mut self, exec_type: ExecType, data: &[u8], offset: u16, total: u16) {
        if exec_type != ExecType::Start {
            return;
        }
        if offset != 0 || data.len() != 1 || total != 1 {
            return;
        }
        self.protocol = FskProtocol::from_id(data[0]).unwrap_or(FskProtocol::FrskyXEu);
    }

    fn on_tick_expired(&mut self) {
        self.timer.set(SEND_TIME);
        let _ = self.radio.set_mode(RadioMode::Tx);
        self.next();
        let mut frame = [0u8; MAX_FRAME];
        self.build_packet(&mut frame);
        let len = self.protocol.payload_length() + 1;
        let _ = self.radio.flush();
        let _ = self.radio.send(&frame[..len]);
    }

    fn on_radio_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::SendDone { .. } => {
                let _ = self.radio.set_mode(RadioMode::Rx);
                let _ = self.radio.start_receive();
            }
            RadioEvent::RecvReady { length, .. } => {
                let mut frame = [0u8; MAX_FRAME];
                let n = self.radio.read_payload(&mut frame).unwrap_or(0).min(length as usize);
                if n > 0 && self.radio.crc_ok() {
                    if let Some(byte5) = validate_telem_frame(self.protocol, self.config.frsky_bind_id, &frame) {
                        let (recv_seq, send_seq) = advance_telemetry_sequence(byte5);
                        self.recv_seq = recv_seq;
                        self.send_seq = send_seq;
                    }
                }
                let _ = self.radio.flush();
                let _ = self.radio.start_receive();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frsky_crc;

    struct FakeTimer {
        deadline: u32,
    }
    impl Default for FakeTimer {
        fn default() -> Self {
            Self { deadline: 0 }
        }
    }
    impl TickTimer for FakeTimer {
        fn set(&mut self, ticks_10us: u32) {
            self.deadline = ticks_10us;
        }
        fn stop(&mut self) {}
        fn elapsed(&self) -> u32 {
            0
        }
    }

    #[derive(Default)]
    struct FakeAntenna {
        selected: Option<Chip>,
    }
    impl AntennaMux for FakeAntenna {
        fn select(&mut self, chip: Chip) {
            self.selected = Some(chip);
        }
    }

    #[derive(Default)]
    struct FakeRadio {
        hops: heapless::Vec<FskHopConfig, 64>,
        sent: heapless::Vec<heapless::Vec<u8, MAX_FRAME>, 8>,
        next_payload: Option<([u8; MAX_FRAME], usize)>,
    }
    impl FakeRadio {
        fn queue_payload(&mut self, frame: [u8; MAX_FRAME], len: usize) {
            self.next_payload = Some((frame, len));
        }
    }
    impl FskRadio for FakeRadio {
        type Error = ();
        fn reset(&mut self) -> Result<(), ()> {
            Ok(())
        }
        fn set_mode(&mut self, _mode: RadioMode) -> Result<(), ()> {
            Ok(())
        }
        fn set_fsctrl0(&mut self, _trim: i8) -> Result<(), ()> {
            Ok(())
        }
        fn set_address(&mut self, _id: [u8; 2]) -> Result<(), ()> {
            Ok(())
        }
        fn calibrate(&mut self, _channel: u8) -> Result<u8, ()> {
            Ok(0)
        }
        fn read_fscal2_fscal3(&mut self) -> Result<(u8, u8), ()> {
            Ok((0, 0))
        }
        fn configure_hop(&mut self, cfg: FskHopConfig) -> Result<(), ()> {
            let _ = self.hops.push(cfg);
            Ok(())
        }
        fn start_receive(&mut self) -> Result<(), ()> {
            Ok(())
        }
        fn abort_receive(&mut self) -> Result<(), ()> {
            Ok(())
        }
        fn flush(&mut self) -> Result<(), ()> {
            Ok(())
        }
        fn read_payload(&mut self, out: &mut [u8]) -> Result<usize, ()> {
            if let Some((frame, len)) = self.next_payload.take() {
                out[..len].copy_from_slice(&frame[..len]);
                Ok(len)
            } else {
                Ok(0)
            }
        }
        fn crc_ok(&self) -> bool {
            true
        }
        fn send(&mut self, data: &[u8]) -> Result<(), ()> {
            let mut buf = heapless::Vec::new();
            let _ = buf.extend_from_slice(data);
            let _ = self.sent.push(buf);
            Ok(())
        }
        fn manufacturer_id(&mut self) -> Result<u32, ()> {
            Ok(0)
        }
    }

    fn make_transmitter<'a>(rc: &'a RefCell<RcChannelBuffer>) -> FskTransmitter<'a, FakeRadio, FakeTimer, FakeAntenna> {
        let mut config = Config::default();
        config.frsky_bind_id = [0xAB, 0xCD];
        config.frsky_hop_table = core::array::from_fn(|i| (i % 47) as u8 + 1);
        FskTransmitter::new(FakeRadio::default(), FakeTimer::default(), FakeAntenna::default(), rc, config)
    }

    #[test]
    fn start_hops_once_and_arms_send_timer() {
        let rc = RefCell::new(RcChannelBuffer::default());
        let mut tx = make_transmitter(&rc);
        tx.init();
        tx.start();
        assert_eq!(tx.radio.hops.len(), 1);
        assert_eq!(tx.status(), "send");
    }

    #[test]
    fn chanskip_is_fixed_at_three() {
        let rc = RefCell::new(RcChannelBuffer::default());
        let mut tx = make_transmitter(&rc);
        tx.hop_idx = 0;
        tx.next();
        assert_eq!(tx.hop_idx, 3);
    }

    #[test]
    fn tick_sends_a_crc_valid_frame() {
        let rc = RefCell::new(RcChannelBuffer::default());
        rc.borrow_mut().set(&[1500; 8]);
        let mut tx = make_transmitter(&rc);
        tx.protocol = FskProtocol::FrskyXEu;
        tx.init();
        tx.start();
        tx.on_tick_expired();

        let sent = tx.radio.sent.last().unwrap();
        let l = tx.protocol.payload_length();
        assert_eq!(sent[1], 0xAB);
        assert_eq!(sent[2], 0xCD);
        let crc = frsky_crc::crc16(&sent[3..l - 1]);
        assert_eq!(sent[l - 1], (crc >> 8) as u8);
        assert_eq!(sent[l], (crc & 0xff) as u8);
    }

    #[test]
    fn telemetry_updates_sequence_counters() {
        let rc = RefCell::new(RcChannelBuffer::default());
        let mut tx = make_transmitter(&rc);
        tx.protocol = FskProtocol::FrskyV;
        tx.send_seq = 0x1;
        tx.recv_seq = 0x2;

        let telem_len = crate::protocols::fsk_common::TELEM_LENGTH;
        let mut frame = [0u8; MAX_FRAME];
        frame[0] = telem_len as u8;
        frame[1] = 0xAB;
        frame[2] = 0xCD;
        frame[5] = 0x81;
        frame[telem_len + 2] = 0x80;
        tx.radio.queue_payload(frame, telem_len + 3);

        tx.on_radio_event(RadioEvent::RecvReady { length: (telem_len + 3) as u8, error: false });
        assert_eq!((tx.recv_seq, tx.send_seq), (0x8, 0x0));
    }
}
