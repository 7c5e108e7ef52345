//! The fixed set of operations the sandboxed UI may invoke.
//!
//! Each entry names the IPC channel (the Tauri command name) that carries it.
//! Nothing outside this table is reachable from the webview; the app checks
//! every incoming invoke against [`is_exposed`].

use crate::error::{BridgeError, Result};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Terminal,
    Filesystem,
    Processes,
    Websites,
    System,
}

impl Area {
    pub const ALL: [Area; 5] = [
        Area::Terminal,
        Area::Filesystem,
        Area::Processes,
        Area::Websites,
        Area::System,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Request/response.
    Call,
    /// Registers a listener; replies with a subscription id and then streams.
    Stream,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Capability {
    pub area: Area,
    pub operation: &'static str,
    pub channel: &'static str,
    pub kind: Kind,
}

const fn call(area: Area, operation: &'static str, channel: &'static str) -> Capability {
    Capability {
        area,
        operation,
        channel,
        kind: Kind::Call,
    }
}

const fn stream(area: Area, operation: &'static str, channel: &'static str) -> Capability {
    Capability {
        area,
        operation,
        channel,
        kind: Kind::Stream,
    }
}

pub const CAPABILITIES: &[Capability] = &[
    call(Area::Terminal, "run", "terminal_run"),
    call(Area::Terminal, "kill", "terminal_kill"),
    call(Area::Terminal, "write", "terminal_write"),
    call(Area::Terminal, "resize", "terminal_resize"),
    stream(Area::Terminal, "onData", "terminal_on_data"),
    stream(Area::Terminal, "onExit", "terminal_on_exit"),
    call(Area::Terminal, "unsubscribe", "terminal_unsubscribe"),
    call(Area::Filesystem, "readFile", "fs_read_file"),
    call(Area::Filesystem, "writeFile", "fs_write_file"),
    call(Area::Filesystem, "listDir", "fs_list_dir"),
    call(Area::Processes, "list", "processes_list"),
    call(Area::Processes, "kill", "processes_kill"),
    call(Area::Websites, "detectURLs", "websites_detect_urls"),
    call(Area::Websites, "open", "websites_open"),
    call(Area::Websites, "close", "websites_close"),
    call(Area::System, "getInfo", "system_get_info"),
    call(Area::System, "exit", "system_exit"),
    call(Area::System, "ping", "system_ping"),
];

/// Global event names for the process-wide website subscriptions.
pub const WEBSITE_OPENED_EVENT: &str = "websites://opened";
pub const WEBSITE_CLOSED_EVENT: &str = "websites://closed";

pub fn lookup(channel: &str) -> Option<&'static Capability> {
    CAPABILITIES.iter().find(|c| c.channel == channel)
}

pub fn is_exposed(channel: &str) -> bool {
    lookup(channel).is_some()
}

pub fn for_area(area: Area) -> impl Iterator<Item = &'static Capability> {
    CAPABILITIES.iter().filter(move |c| c.area == area)
}

/// Check the table is coherent: unique channels, unique operations per area,
/// and every area present. Host startup refuses to continue otherwise.
pub fn verify() -> Result<()> {
    let mut channels = HashSet::new();
    let mut operations = HashSet::new();

    for cap in CAPABILITIES {
        if !channels.insert(cap.channel) {
            return Err(BridgeError::Capability(format!(
                "channel {} registered twice",
                cap.channel
            )));
        }
        if !operations.insert((cap.area, cap.operation)) {
            return Err(BridgeError::Capability(format!(
                "{:?}.{} registered twice",
                cap.area, cap.operation
            )));
        }
    }

    for area in Area::ALL {
        if for_area(area).next().is_none() {
            return Err(BridgeError::Capability(format!("no operations for {area:?}")));
        }
    }

    Ok(())
}
