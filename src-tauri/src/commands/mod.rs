/// Commands module
/// One file per capability area. Each command is a thin adapter from a
/// Tauri invoke onto the bridge; the rules live in the `deskbridge` crate.
/// Command names must match the channels in `deskbridge::capabilities`.

pub mod filesystem;
pub mod processes;
pub mod system;
pub mod terminal;
pub mod websites;
