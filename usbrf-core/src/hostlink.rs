//! Host-link message set (spec §6 "Host link message set").
//!
//! Byte-level framing of the serial transport is explicitly out of scope
//! (spec §1 Non-goals); this module only carries the fields each message
//! type moves and the one piece of logic that is in scope — routing a
//! decoded `PROT_EXEC`/`RC_DATA` message into the [`crate::dispatcher`]
//! exactly as spec §2 item 5 requires of the dispatcher's host-message
//! handlers. The concrete framing (COBS/slip/checksum, embassy-usb CDC-ACM
//! endpoint, etc.) lives in the firmware crate.

use core::cell::RefCell;

use crate::dispatcher::{Dispatcher, ExecType};
use crate::identity::RcChannelBuffer;

/// Device identity reported in response to `REQ_INFO` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub board: u32,
    pub sw_version: u32,
    pub hw_id: [u32; 3],
}

/// A message decoded from the host (spec §6, "Incoming messages of interest").
#[derive(Debug, Clone, Copy)]
pub enum HostMessage<'a> {
    ReqInfo { version: u8 },
    ProtExec { id: i8, exec_type: ExecType, arg_offset: u16, arg_total_len: u16, arg_data: &'a [u8] },
    RcData { channels: &'a [u16] },
}

/// A message sent to the host (spec §6, "device→host" rows).
#[derive(Debug, Clone, Copy)]
pub enum DeviceMessage<'a> {
    Info(DeviceInfo),
    RecvData { chip_id: u8, data: &'a [u8] },
}

/// Route a decoded host message to the dispatcher (spec §2 item 5).
///
/// `REQ_INFO` is not dispatcher business; callers handle it separately by
/// replying with a [`DeviceMessage::Info`] built from board-level constants.
pub fn dispatch_to(dispatcher: &mut Dispatcher<'_>, msg: &HostMessage<'_>) {
    match msg {
        HostMessage::ReqInfo { .. } => {}
        HostMessage::ProtExec { id, exec_type, arg_offset, arg_total_len, arg_data } => {
            dispatcher.exec(*id, *exec_type, arg_data, *arg_offset, *arg_total_len);
        }
        HostMessage::RcData { channels } => {
            dispatcher.rc_data(channels);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::ProtocolSlot;

    struct NullSlot;
    impl ProtocolSlot for NullSlot {
        fn name(&self) -> &'static str {
            "null"
        }
        fn init(&mut self) {}
        fn deinit(&mut self) {}
        fn start(&mut self) {}
        fn stop(&mut self) {}
        fn run(&mut self) {}
        fn status(&self) -> &'static str {
            "ok"
        }
        fn parse_arg(&mut self, _exec_type: ExecType, _data: &[u8], _offset: u16, _total: u16) {}
    }

    #[test]
    fn rc_data_reaches_dispatcher_buffer() {
        let mut slot = NullSlot;
        let mut slots: [&mut dyn ProtocolSlot; 1] = [&mut slot];
        let rc_channels = RefCell::new(RcChannelBuffer::default());
        let mut dispatcher = Dispatcher::new(&mut slots, &rc_channels);
        let channels = [1500u16, 1500, 1000];
        dispatch_to(&mut dispatcher, &HostMessage::RcData { channels: &channels });
        assert_eq!(rc_channels.borrow().as_slice(), &channels);
    }

    #[test]
    fn prot_exec_reaches_dispatcher() {
        let mut slot = NullSlot;
        let mut slots: [&mut dyn ProtocolSlot; 1] = [&mut slot];
        let rc_channels = RefCell::new(RcChannelBuffer::default());
        let mut dispatcher = Dispatcher::new(&mut slots, &rc_channels);
        dispatch_to(
            &mut dispatcher,
            &HostMessage::ProtExec { id: 0, exec_type: ExecType::Start, arg_offset: 0, arg_total_len: 0, arg_data: &[] },
        );
        assert!(dispatcher.is_running());
    }
}
