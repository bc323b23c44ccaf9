//! Protocol dispatcher (spec §4.1).
//!
//! The reference firmware keeps a table of `protocol_t` function-pointer
//! vtables (`original_source/src/modules/protocol.c`) and one "current"
//! index. Per §9's redesign note this becomes a tagged collection of trait
//! objects behind [`ProtocolSlot`] plus a small state machine that owns
//! exactly the `{current, running}` pair the spec calls out as the only
//! dispatcher-private state (§5 "shared state").

use core::cell::RefCell;

use crate::identity::{RadioEvent, RcChannelBuffer};

/// Mirrors the host-supplied `type` field of `PROT_EXEC` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecType {
    Stop,
    Start,
    Extra,
}

/// One protocol's entry points (spec §3 `ProtocolSlot`).
///
/// Implementors reassemble chunked `parse_arg` calls themselves, keyed by
/// `offset`/`total`, exactly as the spec requires of "the slot" rather than
/// the dispatcher.
pub trait ProtocolSlot {
    fn name(&self) -> &'static str;
    fn init(&mut self);
    fn deinit(&mut self);
    fn start(&mut self);
    fn stop(&mut self);
    fn run(&mut self);
    fn status(&self) -> &'static str;
    fn parse_arg(&mut self, exec_type: ExecType, data: &[u8], offset: u16, total: u16);

    /// Tick-timer expiry, routed here by the dispatcher (spec §2 item 5).
    fn on_tick_expired(&mut self) {}
    /// A radio event, routed here by the dispatcher (spec §2 item 5).
    fn on_radio_event(&mut self, _event: RadioEvent) {}
}

/// Owns the protocol table and the `{current, running}` pair (spec §4.1).
///
/// `rc_channels` is a reference to the same cell the transmitter protocols
/// were constructed with (spec §3 `RcChannelBuffer`: "single-writer ...
/// single-reader, no locking required" — a `RefCell` models that single-
/// threaded discipline without an extra copy).
pub struct Dispatcher<'a> {
    slots: &'a mut [&'a mut dyn ProtocolSlot],
    current: i8,
    running: bool,
    rc_channels: &'a RefCell<RcChannelBuffer>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(slots: &'a mut [&'a mut dyn ProtocolSlot], rc_channels: &'a RefCell<RcChannelBuffer>) -> Self {
        Self {
            slots,
            current: -1,
            running: false,
            rc_channels,
        }
    }

    /// Bring the dispatcher to its bringup state: no current protocol, nothing running.
    pub fn init(&mut self) {
        self.current = -1;
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn current(&self) -> i8 {
        self.current
    }

    /// Number of registered protocol slots (console `plist`).
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Name of slot `id`, if any (console `plist`/`pset`).
    pub fn slot_name(&self, id: i8) -> Option<&'static str> {
        if id < 0 {
            return None;
        }
        self.slots.get(id as usize).map(|s| s.name())
    }

    /// Status string of the current slot, if one is selected (console `status`).
    pub fn current_status(&self) -> Option<&'static str> {
        if self.current < 0 {
            return None;
        }
        self.slots.get(self.current as usize).map(|s| s.status())
    }

    fn current_slot_mut(&mut self) -> Option<&mut dyn ProtocolSlot> {
        if self.current < 0 {
            return None;
        }
        self.slots.get_mut(self.current as usize).map(|s| &mut **s)
    }

    /// `RC_DATA` host message handler (spec §6).
    pub fn rc_data(&mut self, channels: &[u16]) {
        self.rc_channels.borrow_mut().set(channels);
    }

    /// `PROT_EXEC` host message handler (spec §4.1 algorithm).
    pub fn exec(&mut self, prot_id: i8, exec_type: ExecType, data: &[u8], arg_offset: u16, arg_total_len: u16) {
        if prot_id != self.current {
            if self.running {
                if let Some(slot) = self.current_slot_mut() {
                    slot.stop();
                }
                self.running = false;
            }
            if let Some(slot) = self.current_slot_mut() {
                slot.deinit();
            }
            self.current = prot_id;
            if prot_id < 0 {
                return;
            }
            if let Some(slot) = self.current_slot_mut() {
                slot.init();
            }
            self.running = false;
        }

        if matches!(exec_type, ExecType::Start | ExecType::Stop) && self.running {
            if let Some(slot) = self.current_slot_mut() {
                slot.stop();
            }
            self.running = false;
        }

        if arg_total_len > arg_offset {
            if let Some(slot) = self.current_slot_mut() {
                slot.parse_arg(exec_type, data, arg_offset, arg_total_len);
            }
        }

        let arg_len = data.len() as u16;
        if exec_type == ExecType::Start && arg_offset.saturating_add(arg_len) >= arg_total_len {
            if let Some(slot) = self.current_slot_mut() {
                slot.start();
            }
            self.running = true;
        }
    }

    /// Main-loop poll (spec §4.1: "delegates to the current slot iff running").
    pub fn run(&mut self) {
        if self.running {
            if let Some(slot) = self.current_slot_mut() {
                slot.run();
            }
        }
    }

    /// Tick-timer hardware callback (spec §2 item 5).
    pub fn on_tick_expired(&mut self) {
        if self.running {
            if let Some(slot) = self.current_slot_mut() {
                slot.on_tick_expired();
            }
        }
    }

    /// Radio chip event callback (spec §2 item 5).
    pub fn on_radio_event(&mut self, event: RadioEvent) {
        if self.running {
            if let Some(slot) = self.current_slot_mut() {
                slot.on_radio_event(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct CountingSlot {
        name: &'static str,
        starts: Cell<u32>,
        stops: Cell<u32>,
        inits: Cell<u32>,
        deinits: Cell<u32>,
    }

    impl CountingSlot {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                starts: Cell::new(0),
                stops: Cell::new(0),
                inits: Cell::new(0),
                deinits: Cell::new(0),
            }
        }
    }

    impl ProtocolSlot for CountingSlot {
        fn name(&self) -> &'static str {
            self.name
        }
        fn init(&mut self) {
            self.inits.set(self.inits.get() + 1);
        }
        fn deinit(&mut self) {
            self.deinits.set(self.deinits.get() + 1);
        }
        fn start(&mut self) {
            self.starts.set(self.starts.get() + 1);
        }
        fn stop(&mut self) {
            self.stops.set(self.stops.get() + 1);
        }
        fn run(&mut self) {}
        fn status(&self) -> &'static str {
            "ok"
        }
        fn parse_arg(&mut self, _exec_type: ExecType, _data: &[u8], _offset: u16, _total: u16) {}
    }

    #[test]
    fn invariant_1_start_stop_balance() {
        let mut a = CountingSlot::new("a");
        let mut b = CountingSlot::new("b");
        let mut slots: [&mut dyn ProtocolSlot; 2] = [&mut a, &mut b];
        let rc_channels = RefCell::new(RcChannelBuffer::default());
        let mut dispatcher = Dispatcher::new(&mut slots, &rc_channels);

        dispatcher.exec(0, ExecType::Start, &[], 0, 0);
        dispatcher.exec(0, ExecType::Stop, &[], 0, 0);
        dispatcher.exec(1, ExecType::Start, &[], 0, 0);
        dispatcher.exec(0, ExecType::Start, &[], 0, 0);

        // Switching current to slot 0 stopped slot 1's run.
        assert_eq!(a.starts.get(), a.stops.get() + if dispatcher.current() == 0 && dispatcher.is_running() { 1 } else { 0 });
        assert_eq!(b.starts.get(), b.stops.get() + if dispatcher.current() == 1 && dispatcher.is_running() { 1 } else { 0 });
    }

    #[test]
    fn start_waits_for_full_argument_delivery() {
        let mut a = CountingSlot::new("a");
        let mut slots: [&mut dyn ProtocolSlot; 1] = [&mut a];
        let rc_channels = RefCell::new(RcChannelBuffer::default());
        let mut dispatcher = Dispatcher::new(&mut slots, &rc_channels);

        dispatcher.exec(0, ExecType::Start, &[1, 2, 3], 0, 6);
        assert_eq!(a.starts.get(), 0, "start must wait for all argument bytes");

        dispatcher.exec(0, ExecType::Start, &[4, 5, 6], 3, 6);
        assert_eq!(a.starts.get(), 1);
        assert!(dispatcher.is_running());
    }

    #[test]
    fn only_one_protocol_runs_at_a_time() {
        let mut a = CountingSlot::new("a");
        let mut b = CountingSlot::new("b");
        let mut slots: [&mut dyn ProtocolSlot; 2] = [&mut a, &mut b];
        let rc_channels = RefCell::new(RcChannelBuffer::default());
        let mut dispatcher = Dispatcher::new(&mut slots, &rc_channels);

        dispatcher.exec(0, ExecType::Start, &[], 0, 0);
        assert!(dispatcher.is_running());
        dispatcher.exec(1, ExecType::Start, &[], 0, 0);
        assert_eq!(a.stops.get(), 1, "switching current must stop the old slot");
        assert!(dispatcher.is_running());
        assert_eq!(dispatcher.current(), 1);
    }

    #[test]
    fn rc_data_is_readable_by_current_protocol() {
        let mut a = CountingSlot::new("a");
        let mut slots: [&mut dyn ProtocolSlot; 1] = [&mut a];
        let rc_channels = RefCell::new(RcChannelBuffer::default());
        let mut dispatcher = Dispatcher::new(&mut slots, &rc_channels);
        dispatcher.rc_data(&[1500, 1500, 1000]);
        assert_eq!(rc_channels.borrow().as_slice(), &[1500, 1500, 1000]);
    }
}
