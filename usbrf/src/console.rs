//! Console command table (spec §6 "Console commands", `SPEC_FULL.md` §B
//! "Console command table mechanics").
//!
//! `original_source/src/modules/protocol.c` routes the equivalent console
//! commands through the same `protocol_*` entry points used by a decoded
//! `PROT_EXEC` message; `pset`/`start`/`stop` here go through
//! [`usbrf_core::dispatcher::Dispatcher::exec`] for exactly that reason,
//! `plist`/`status`/`list`/`version` are read-only introspection, and
//! `load`/`save`/`set`/`reset` operate on [`usbrf_core::config::Config`].

use core::fmt::Write as _;

use heapless::String;

use usbrf_core::config::{self, Config, ConfigStore};
use usbrf_core::dispatcher::{Dispatcher, ExecType};

const SW_VERSION: u32 = 1;

/// Console reply, written back over the same transport the command arrived
/// on (the USB CDC-ACM link, same as `RECV_DATA`/`INFO`).
pub type Reply = String<128>;

/// Parse and run one console line against the dispatcher and the persisted
/// configuration. An unrecognized command or a `pset` with an out-of-range
/// index leaves dispatcher state unchanged and returns a message, per
/// `SPEC_FULL.md` §B.
pub fn run_line<S: ConfigStore>(line: &str, dispatcher: &mut Dispatcher<'_>, store: &mut S, config: &mut Config) -> Reply {
    let mut reply = Reply::new();
    let mut words = line.split_whitespace();
    match words.next() {
        Some("plist") => {
            for i in 0..dispatcher.slot_count() {
                if let Some(name) = dispatcher.slot_name(i as i8) {
                    let _ = writeln!(reply, "{}: {}", i, name);
                }
            }
        }
        Some("pset") => match words.next().and_then(|w| w.parse::<i8>().ok()) {
            Some(id) if (id as usize) < dispatcher.slot_count() => {
                dispatcher.exec(id, ExecType::Stop, &[], 0, 0);
                let _ = write!(reply, "current = {}", id);
            }
            _ => {
                let _ = write!(reply, "pset: invalid protocol id");
            }
        },
        Some("start") => {
            dispatcher.exec(dispatcher.current(), ExecType::Start, &[], 0, 0);
            let _ = write!(reply, "started");
        }
        Some("stop") => {
            dispatcher.exec(dispatcher.current(), ExecType::Stop, &[], 0, 0);
            let _ = write!(reply, "stopped");
        }
        Some("status") => match dispatcher.current_status() {
            Some(status) => {
                let _ = write!(reply, "{}", status);
            }
            None => {
                let _ = write!(reply, "no protocol selected");
            }
        },
        Some("version") => {
            let _ = write!(reply, "usbrf {}", SW_VERSION);
        }
        Some("load") => {
            match config::load(store) {
                Ok(loaded) => {
                    *config = loaded;
                    let _ = write!(reply, "loaded");
                }
                Err(_) => {
                    let _ = write!(reply, "load failed");
                }
            }
        }
        Some("save") => match config::save(store, config) {
            Ok(()) => {
                let _ = write!(reply, "saved");
            }
            Err(_) => {
                let _ = write!(reply, "save failed");
            }
        },
        Some("list") => {
            let _ = writeln!(reply, "debug = {}", config.debug);
            let _ = writeln!(reply, "cc_tuned = {}", config.cc_tuned);
            let _ = writeln!(reply, "cc_fsctrl0 = {}", config.cc_fsctrl0);
            let _ = write!(reply, "frsky_bound = {}", config.frsky_bound);
        }
        Some("set") => {
            let name = words.next();
            let value = words.next();
            match (name, value) {
                (Some("debug"), Some(v)) => {
                    config.debug = v == "1" || v == "true";
                    let _ = write!(reply, "debug = {}", config.debug);
                }
                (Some("cc_fsctrl0"), Some(v)) => match v.parse::<i8>() {
                    Ok(trim) => {
                        config.cc_fsctrl0 = trim;
                        let _ = write!(reply, "cc_fsctrl0 = {}", trim);
                    }
                    Err(_) => {
                        let _ = write!(reply, "set: invalid value");
                    }
                },
                _ => {
                    let _ = write!(reply, "set: unknown field");
                }
            }
        }
        Some("reset") => {
            *config = Config::default();
            let _ = write!(reply, "reset to defaults");
        }
        _ => {
            let _ = write!(reply, "unknown command");
        }
    }
    reply
}
