//! FSK receiver (spec §4.6): "identical to the hacker's tune/bind/sync state
//! machine without the takeover transition" — it only ever listens, and
//! persists what it learns (tuning, bind id, hop table) so a later run can
//! skip straight to sync.
//!
//! Grounded on `original_source/src/protocol/frsky_receiver.c`: the
//! `start()` three-way branch on `config.cc_tuned`/`config.frsky_bound`
//! (tune from scratch / resume at bind / resume at sync), and
//! `protocol_frsky_receiver_timer`/`_receive`'s tune/bind/sync/recv state
//! transitions. Frame validation and the tuning walk are shared with the
//! hacker through [`crate::protocols::fsk_common`].

use crate::config::{self, Config, ConfigStore};
use crate::dispatcher::{ExecType, ProtocolSlot};
use crate::fsk_protocol::FskProtocol;
use crate::hal::{AntennaMux, Chip, FskHopConfig, FskRadio, RadioMode, TickTimer};
use crate::identity::{RadioEvent, FRSKY_HOP_TABLE_LENGTH};
use crate::protocols::fsk_common::{validate_data_frame, BindState, TuneOutcome, TuneWalk, BIND_ADDR, BIND_CHAN, RECV_TIME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Tune,
    Bind,
    Sync,
    Recv,
}

const BIND_ADDR_ID: [u8; 2] = [BIND_ADDR, 0];
const MAX_FRAME: usize = 35;

/// The last decoded data packet, handed to the host (spec §6 `RECV_DATA`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceivedPacket {
    pub channel: u8,
    pub fsctrl0: i8,
    pub len: u8,
    pub frame: [u8; MAX_FRAME],
}

/// Tunes to, binds with and then stays synchronized to a FrSky-compatible
/// transmitter, never transmitting anything itself.
pub struct FskReceiver<R: FskRadio, T: TickTimer, A: AntennaMux, C: ConfigStore> {
    radio: R,
    timer: T,
    antenna: A,
    store: C,
    config: Config,

    state: State,
    protocol: FskProtocol,
    hop_idx: usize,
    chanskip: u8,
    fscal1: [u8; FRSKY_HOP_TABLE_LENGTH],
    fscal1_bind: u8,
    fscal2: u8,
    fscal3: u8,
    tune: TuneWalk,
    bind: BindState,
    last_packet: Option<ReceivedPacket>,
}

impl<R: FskRadio, T: TickTimer, A: AntennaMux, C: ConfigStore> FskReceiver<R, T, A, C> {
    pub fn new(radio: R, timer: T, antenna: A, store: C, config: Config) -> Self {
        Self {
            radio,
            timer,
            antenna,
            store,
            config,
            state: State::Tune,
            protocol: FskProtocol::FrskyXEu,
            hop_idx: 0,
            chanskip: 1,
            fscal1: [0; FRSKY_HOP_TABLE_LENGTH],
            fscal1_bind: 0,
            fscal2: 0,
            fscal3: 0,
            tune: TuneWalk::default(),
            bind: BindState::default(),
            last_packet: None,
        }
    }

    pub fn last_packet(&self) -> Option<ReceivedPacket> {
        self.last_packet
    }

    fn persist(&mut self) {
        let _ = config::save(&mut self.store, &self.config);
    }

    fn next(&mut self) {
        self.hop_idx = (self.hop_idx + self.chanskip as usize) % FRSKY_HOP_TABLE_LENGTH;
        let channel = self.config.frsky_hop_table[self.hop_idx];
        let _ = self.radio.configure_hop(FskHopConfig {
            channel,
            fscal1: self.fscal1[self.hop_idx],
            fscal2: self.fscal2,
            fscal3: self.fscal3,
        });
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

    fn start_bind(&mut self) {
        self.bind = BindState::default();
        let _ = self.radio.set_fsctrl0(self.config.cc_fsctrl0);
        let _ = self.radio.set_address(BIND_ADDR_ID);
        let _ = self.radio.configure_hop(FskHopConfig { channel: BIND_CHAN, fscal1: self.fscal1_bind, fscal2: 0, fscal3: 0 });
        let _ = self.radio.start_receive();
        self.state = State::Bind;
        self.timer.set(RECV_TIME);
    }

    fn start_sync(&mut self) {
        let _ = self.radio.set_fsctrl0(self.config.cc_fsctrl0);
        let _ = self.radio.set_address(self.config.frsky_bind_id);
        self.calibrate_hop_table();
        self.hop_idx = FRSKY_HOP_TABLE_LENGTH - 1;
        self.next();
        let _ = self.radio.start_receive();
        self.state = State::Sync;
        self.timer.set(RECV_TIME);
    }
}

impl<R: FskRadio, T: TickTimer, A: AntennaMux, C: ConfigStore> ProtocolSlot for FskReceiver<R, T, A, C> {
    fn name(&self) -> &'static str {
        "fsk_receiver"
    }

    fn init(&mut self) {
        self.timer.stop();
        self.antenna.select(Chip::Fsk);
        let _ = self.radio.reset();
        if let Ok(fscal1) = self.radio.calibrate(BIND_CHAN) {
            self.fscal1_bind = fscal1;
        }
    }

    fn deinit(&mut self) {
        self.timer.stop();
    }

    fn start(&mut self) {
        if self.config.cc_tuned && self.config.frsky_bound {
            self.start_sync();
        } else if self.config.cc_tuned {
            self.start_bind();
        } else {
            self.tune = TuneWalk::default();
            self.bind = BindState::default();
            let _ = self.radio.set_fsctrl0(self.tune.trim);
            let _ = self.radio.set_address(BIND_ADDR_ID);
            let _ = self.radio.configure_hop(FskHopConfig { channel: BIND_CHAN, fscal1: self.fscal1_bind, fscal2: 0, fscal3: 0 });
            self.state = State::Tune;
            let _ = self.radio.start_receive();
            self.timer.set(RECV_TIME);
        }
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
        }
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
        match self.state {
            State::Tune => {
                if let TuneOutcome::Done(trim) = self.tune.advance() {
                    self.config.cc_fsctrl0 = trim;
                    self.config.cc_tuned = true;
                    self.persist();
                    if self.bind.is_complete() {
                        self.config.frsky_bound = true;
                        self.config.frsky_bind_id = self.bind.id;
                        self.config.frsky_hop_table[..FRSKY_HOP_TABLE_LENGTH].copy_from_slice(&self.bind.hop_table);
                        self.persist();
                        self.start_sync();
                    } else {
                        self.start_bind();
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
                self.next();
                let _ = self.radio.flush();
                let _ = self.radio.start_receive();
                self.timer.set(RECV_TIME);
                self.state = State::Recv;
            }
        }
    }

    fn on_radio_event(&mut self, event: RadioEvent) {
        let RadioEvent::RecvReady { length, .. } = event else { return };
        let mut frame = [0u8; MAX_FRAME];
        let n = self.radio.read_payload(&mut frame).unwrap_or(0).min(length as usize);
        if n == 0 || !self.radio.crc_ok() {
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
                    self.config.frsky_bound = true;
                    self.config.frsky_bind_id = self.bind.id;
                    self.config.frsky_hop_table[..FRSKY_HOP_TABLE_LENGTH].copy_from_slice(&self.bind.hop_table);
                    self.persist();
                    self.start_sync();
                    return;
                }
                let _ = self.radio.start_receive();
            }
            State::Sync | State::Recv => {
                if let Some(header) = validate_data_frame(self.protocol, self.config.frsky_bind_id, &frame) {
                    self.chanskip = header.chanskip;
                    self.hop_idx = header.hop_idx as usize;
                    self.last_packet = Some(ReceivedPacket { channel: self.config.frsky_hop_table[self.hop_idx], fsctrl0: self.config.cc_fsctrl0, len: n as u8, frame });
                    self.next();
                    let _ = self.radio.flush();
                    self.timer.set(RECV_TIME);
                    self.state = State::Recv;
                }
                let _ = self.radio.start_receive();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
        fn send(&mut self, _data: &[u8]) -> Result<(), ()> {
            Ok(())
        }
        fn manufacturer_id(&mut self) -> Result<u32, ()> {
            Ok(0)
        }
    }

    struct RamStore {
        data: [u8; config::ENCODED_LEN],
    }
    impl Default for RamStore {
        fn default() -> Self {
            let mut data = [0u8; config::ENCODED_LEN];
            Config::default().encode(&mut data);
            Self { data }
        }
    }
    impl ConfigStore for RamStore {
        type Error = core::convert::Infallible;
        fn read(&mut self, out: &mut [u8; config::ENCODED_LEN]) -> Result<(), Self::Error> {
            out.copy_from_slice(&self.data);
            Ok(())
        }
        fn write(&mut self, data: &[u8; config::ENCODED_LEN]) -> Result<(), Self::Error> {
            self.data.copy_from_slice(data);
            Ok(())
        }
    }

    fn make_receiver() -> FskReceiver<FakeRadio, FakeTimer, FakeAntenna, RamStore> {
        FskReceiver::new(FakeRadio::default(), FakeTimer::default(), FakeAntenna::default(), RamStore::default(), Config::default())
    }

    #[test]
    fn untuned_start_begins_tuning() {
        let mut receiver = make_receiver();
        receiver.init();
        receiver.start();
        assert_eq!(receiver.status(), "tune");
    }

    #[test]
    fn tuned_but_unbound_start_begins_binding() {
        let mut receiver = make_receiver();
        receiver.config.cc_tuned = true;
        receiver.init();
        receiver.start();
        assert_eq!(receiver.status(), "bind");
    }

    #[test]
    fn bound_start_goes_straight_to_sync() {
        let mut receiver = make_receiver();
        receiver.config.cc_tuned = true;
        receiver.config.frsky_bound = true;
        receiver.init();
        receiver.start();
        assert_eq!(receiver.status(), "sync");
        assert_eq!(receiver.radio.hops.len(), 1);
    }

    #[test]
    fn completing_bind_persists_learned_table() {
        let mut receiver = make_receiver();
        receiver.config.cc_tuned = true;
        receiver.protocol = FskProtocol::FrskyV;
        receiver.init();
        receiver.start();
        assert_eq!(receiver.status(), "bind");

        let l = FskProtocol::FrskyV.payload_length();
        for slice in 0..10u8 {
            let idx = slice * 5;
            let mut frame = [0u8; MAX_FRAME];
            frame[0] = l as u8;
            frame[1] = 0x03;
            frame[2] = 0x01;
            frame[3] = 0xAB;
            frame[4] = 0xCD;
            frame[5] = idx;
            for k in 0..5 {
                frame[6 + k] = idx + 1 + k as u8;
            }
            frame[l + 2] = 0x80;
            receiver.radio.queue_payload(frame, l + 3);
            receiver.on_radio_event(RadioEvent::RecvReady { length: (l + 3) as u8, error: false });
        }

        assert_eq!(receiver.status(), "sync");
        let (stored, fell_back) = Config::decode(&receiver.store.data);
        assert!(!fell_back);
        assert!(stored.frsky_bound);
        assert_eq!(stored.frsky_bind_id, [0xAB, 0xCD]);
    }
}
