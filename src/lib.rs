//! Privileged host core for a sandboxed desktop shell.
//!
//! The UI runs in a webview with no OS access. Everything it can do to the
//! outside world goes through the [`Bridge`]: terminal sessions, the
//! process registry, a root-scoped filesystem, website windows and system
//! info. The desktop app (`src-tauri`) maps each capability onto an IPC
//! command; this crate holds the state and the rules.

pub mod bridge;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod events;
pub mod filesystem;
pub mod processes;
pub mod system;
pub mod terminal;
pub mod websites;

pub use bridge::{Bridge, Filesystem, Host, Processes, System, Terminal, Websites};
pub use config::BridgeConfig;
pub use error::{ActionResult, BridgeError, Result};
pub use events::Subscription;
