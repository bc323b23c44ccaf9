//! DSSS scanner (spec §4.2/§6): brute-forces a host-supplied list of
//! `{channel, row_col}` pairs, hopping to the next pair on every tick and
//! reporting whatever the chip hands back.
//!
//! Grounded on `original_source/src/protocol/cyrf_scanner.c`: the per-pair
//! layout (`channel`, then `pn_row<<4 | sop_col` packed into one byte), the
//! DSM2-vs-DSMX timeout split keyed on `channel % 5 == pn_row`, and the
//! `malloc`'d scan-list reassembly are all taken from that file, generalized
//! over [`DsssRadio`]/[`TickTimer`]/[`AntennaMux`] and backed by a fixed
//! buffer per spec §9's "bounded fixed-size buffer with length" redesign.

use crate::dispatcher::{ExecType, ProtocolSlot};
use crate::hal::{AntennaMux, Chip, DsssHopConfig, DsssRadio, RadioMode, TickTimer};
use crate::protocols::ArgAssembler;

const RECV_TIME_A: u32 = 1950;
const RECV_TIME_A_SHORT: u32 = 850;
const PACKET_LEN: usize = 16;
const MAX_PAIRS: usize = 50;
const MAX_ARG_BYTES: usize = MAX_PAIRS * 2;

/// Scans a fixed list of `(channel, row_col)` pairs for DSSS traffic.
pub struct DsssScanner<R: DsssRadio, T: TickTimer, A: AntennaMux> {
    radio: R,
    timer: T,
    antenna: A,

    args: ArgAssembler<MAX_ARG_BYTES>,
    pairs: [(u8, u8); MAX_PAIRS],
    pair_count: usize,
    idx: usize,
    last_length: u8,
}

impl<R: DsssRadio, T: TickTimer, A: AntennaMux> DsssScanner<R, T, A> {
    pub fn new(radio: R, timer: T, antenna: A) -> Self {
        Self {
            radio,
            timer,
            antenna,
            args: ArgAssembler::default(),
            pairs: [(0, 0); MAX_PAIRS],
            pair_count: 0,
            idx: 0,
            last_length: 0,
        }
    }

    fn configure_current(&mut self) {
        if self.pair_count == 0 {
            return;
        }
        let (channel, row_col) = self.pairs[self.idx];
        let pn_row = row_col >> 4;
        let sop_col = row_col & 0x0f;
        let _ = self.radio.configure_hop(DsssHopConfig {
            channel,
            sop_col,
            data_col: 7 - sop_col,
            pn_row,
            is_dsm2: channel % 5 == pn_row,
            crc_seed: 0,
        });
    }

    fn recv_timeout(&self) -> u32 {
        if self.pair_count == 0 {
            return RECV_TIME_A;
        }
        let (channel, row_col) = self.pairs[self.idx];
        if channel % 5 == row_col >> 4 {
            RECV_TIME_A * 3 / 2
        } else {
            RECV_TIME_A_SHORT * 23
        }
    }

    fn next(&mut self) {
        if self.pair_count == 0 {
            return;
        }
        self.idx = (self.idx + 1) % self.pair_count;
        self.configure_current();
    }
}

impl<R: DsssRadio, T: TickTimer, A: AntennaMux> ProtocolSlot for DsssScanner<R, T, A> {
    fn name(&self) -> &'static str {
        "dsss_scanner"
    }

    fn init(&mut self) {
        self.timer.stop();
        self.antenna.select(Chip::Dsss);
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
        self.timer.set(self.recv_timeout());
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
            let count = (arg.len() / 2).min(MAX_PAIRS);
            for i in 0..count {
                self.pairs[i] = (arg[i * 2], arg[i * 2 + 1]);
            }
            self.pair_count = count;
        }
    }

    fn on_tick_expired(&mut self) {
        let _ = self.radio.abort_receive();
        self.next();
        let _ = self.radio.start_receive();
        self.timer.set(self.recv_timeout());
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
        hops: Vec<DsssHopConfig, 16>,
    }
    impl DsssRadio for FakeRadio {
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
        fn read_payload(&mut self, _out: &mut [u8]) -> Result<usize, ()> {
            Ok(PACKET_LEN)
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

    fn make_scanner() -> DsssScanner<FakeRadio, FakeTimer, FakeAntenna> {
        DsssScanner::new(FakeRadio::default(), FakeTimer::default(), FakeAntenna::default())
    }

    #[test]
    fn start_requires_parsed_pairs() {
        let mut scanner = make_scanner();
        scanner.init();
        scanner.parse_arg(ExecType::Start, &[1, 0x10, 2, 0x21, 3, 0x30], 0, 6);
        scanner.start();
        assert_eq!(scanner.pair_count, 3);
        assert_eq!(scanner.radio.hops.len(), 1);
        assert_eq!(scanner.radio.hops[0].channel, 1);
    }

    #[test]
    fn tick_cycles_through_every_pair() {
        let mut scanner = make_scanner();
        scanner.init();
        scanner.parse_arg(ExecType::Start, &[1, 0x10, 2, 0x21, 3, 0x30], 0, 6);
        scanner.start();

        scanner.on_tick_expired();
        scanner.on_tick_expired();
        assert_eq!(scanner.idx, 0);
        let channels: [u8; 3] = [scanner.radio.hops[0].channel, scanner.radio.hops[1].channel, scanner.radio.hops[2].channel];
        assert_eq!(channels, [1, 2, 3]);
    }
}
