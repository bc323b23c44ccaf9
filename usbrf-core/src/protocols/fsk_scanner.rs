//! FSK scanner (spec §4.5/§6): brute-forces a host-supplied list of
//! `{channel, trim_byte}` pairs on the FSK chip, one fixed FrSky register
//! profile for the whole scan.
//!
//! Grounded on `original_source/src/protocol/cc_scanner.c`: the first
//! argument byte selects `frsky_protocol`, the remaining bytes are the
//! `{channel, fsctrl0 offset}` scan list, and advancing re-applies
//! `fsctrl0 = base + offset` per entry exactly as that file's
//! `protocol_cc_scanner_next` does.

use crate::dispatcher::{ExecType, ProtocolSlot};
use crate::fsk_protocol::FskProtocol;
use crate::hal::{AntennaMux, Chip, FskHopConfig, FskRadio, RadioMode, TickTimer};
use crate::protocols::ArgAssembler;

const SEND_TIME: u32 = 900;
const USED_CHAN: u32 = 47;
const MAX_PAIRS: usize = 48;
const MAX_ARG_BYTES: usize = 1 + MAX_PAIRS * 2;

pub struct FskScanner<R: FskRadio, T: TickTimer, A: AntennaMux> {
    radio: R,
    timer: T,
    antenna: A,

    args: ArgAssembler<MAX_ARG_BYTES>,
    protocol: FskProtocol,
    base_trim: i8,
    pairs: [(u8, i8); MAX_PAIRS],
    pair_count: usize,
    idx: usize,
}

impl<R: FskRadio, T: TickTimer, A: AntennaMux> FskScanner<R, T, A> {
    pub fn new(radio: R, timer: T, antenna: A, base_trim: i8) -> Self {
        Self {
            radio,
            timer,
            antenna,
            args: ArgAssembler::default(),
            protocol: FskProtocol::FrskyXEu,
            base_trim,
            pairs: [(0, 0); MAX_PAIRS],
            pair_count: 0,
            idx: 0,
        }
    }

    fn configure_current(&mut self) {
        if self.pair_count == 0 {
            return;
        }
        let (channel, trim) = self.pairs[self.idx];
        let _ = self.radio.set_fsctrl0(self.base_trim.wrapping_add(trim));
        let _ = self.radio.configure_hop(FskHopConfig { channel, fscal1: 0, fscal2: 0, fscal3: 0 });
    }

    fn next(&mut self) {
        if self.pair_count == 0 {
            return;
        }
        self.idx = (self.idx + 1) % self.pair_count;
        self.configure_current();
    }
}

impl<R: FskRadio, T: TickTimer, A: AntennaMux> ProtocolSlot for FskScanner<R, T, A> {
    fn name(&self) -> &'static str {
        "fsk_scanner"
    }

    fn init(&mut self) {
        self.timer.stop();
        self.antenna.select(Chip::Fsk);
        let _ = self.radio.reset();
    }

    fn deinit(&mut self) {
        self.timer.stop();
        self.pair_count = 0;
    }

    fn start(&mut self) {
        self.idx = 0;
        if self.pair_count == 0 {
            return;
        }
        self.configure_current();
        let _ = self.radio.start_receive();
        self.timer.set(SEND_TIME * (USED_CHAN + 1));
    }

    fn stop(&mut self) {
        self.timer.stop();
        let _ = self.radio.set_mode(RadioMode::Rx);
        let _ = self.radio.abort_receive();
    }

    fn run(&mut self) {}

    fn status(&self) -> &'static str {
        "scanning"
    }

    fn parse_arg(&mut self, exec_type: ExecType, data: &[u8], offset: u16, total: u16) {
        if exec_type != ExecType::Start {
            return;
        }
        if let Some(arg) = self.args.feed(data, offset, total) {
            if arg.is_empty() {
                return;
            }
            self.protocol = FskProtocol::from_id(arg[0]).unwrap_or(FskProtocol::FrskyXEu);
            let rest = &arg[1..];
            let count = (rest.len() / 2).min(MAX_PAIRS);
            for i in 0..count {
                self.pairs[i] = (rest[i * 2], rest[i * 2 + 1] as i8);
            }
            self.pair_count = count;
        }
    }

    fn on_tick_expired(&mut self) {
        self.next();
        self.timer.set(SEND_TIME * (USED_CHAN + 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

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
        hops: Vec<FskHopConfig, 16>,
        trims: Vec<i8, 16>,
    }
    impl FskRadio for FakeRadio {
        type Error = ();
        fn reset(&mut self) -> Result<(), ()> {
            Ok(())
        }
        fn set_mode(&mut self, _mode: RadioMode) -> Result<(), ()> {
            Ok(())
        }
        fn set_fsctrl0(&mut self, trim: i8) -> Result<(), ()> {
            let _ = self.trims.push(trim);
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
        fn read_payload(&mut self, _out: &mut [u8]) -> Result<usize, ()> {
            Ok(0)
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

    fn make_scanner() -> FskScanner<FakeRadio, FakeTimer, FakeAntenna> {
        FskScanner::new(FakeRadio::default(), FakeTimer::default(), FakeAntenna::default(), 0)
    }

    #[test]
    fn first_byte_selects_protocol_rest_is_pairs() {
        let mut scanner = make_scanner();
        scanner.init();
        scanner.parse_arg(ExecType::Start, &[3, 10, 1, 20, 2], 0, 5);
        scanner.start();
        assert_eq!(scanner.protocol, FskProtocol::FrskyXEu);
        assert_eq!(scanner.pair_count, 2);
        assert_eq!(scanner.radio.hops[0].channel, 10);
        assert_eq!(scanner.radio.trims[0], 1);
    }

    #[test]
    fn tick_advances_and_wraps() {
        let mut scanner = make_scanner();
        scanner.init();
        scanner.parse_arg(ExecType::Start, &[3, 10, 0, 20, 0], 0, 5);
        scanner.start();
        scanner.on_tick_expired();
        assert_eq!(scanner.idx, 1);
        scanner.on_tick_expired();
        assert_eq!(scanner.idx, 0);
    }
}
