/// Terminal commands
/// Session lifecycle plus the two per-session streams, which are delivered
/// over IPC channels the webview passes in.

use crate::subscriptions::{Subscriptions, NO_SUBSCRIPTION};
use deskbridge::terminal::{ExitReport, RunOptions, RunResult};
use deskbridge::{ActionResult, Bridge, BridgeError, Subscription};
use std::path::PathBuf;
use tauri::ipc::Channel;
use tauri::State;

#[tauri::command]
pub fn terminal_run(
    bridge: State<'_, Bridge>,
    command: String,
    cwd: Option<String>,
) -> Result<RunResult, BridgeError> {
    bridge.terminal().run(
        &command,
        RunOptions {
            cwd: cwd.map(PathBuf::from),
        },
    )
}

#[tauri::command]
pub fn terminal_kill(bridge: State<'_, Bridge>, id: String) -> ActionResult {
    bridge.terminal().kill(&id)
}

#[tauri::command]
pub fn terminal_write(bridge: State<'_, Bridge>, id: String, data: String) -> Result<(), BridgeError> {
    bridge.terminal().write(&id, &data)
}

#[tauri::command]
pub fn terminal_resize(
    bridge: State<'_, Bridge>,
    id: String,
    cols: u16,
    rows: u16,
) -> Result<(), BridgeError> {
    bridge.terminal().resize(&id, cols, rows)
}

/// Stream output chunks of session `id` to `on_data`, starting with the
/// output it has already produced. Returns the subscription id for
/// `terminal_unsubscribe`, or 0 when the stream is already complete.
#[tauri::command]
pub fn terminal_on_data(
    bridge: State<'_, Bridge>,
    subscriptions: State<'_, Subscriptions>,
    id: String,
    on_data: Channel<String>,
) -> u64 {
    let subscription = bridge.terminal().on_data(
        &id,
        Box::new(move |chunk| {
            if let Err(e) = on_data.send(chunk.to_string()) {
                log::debug!("[Terminal] Dropped output chunk: {e}");
            }
        }),
    );
    track(&bridge, &subscriptions, &id, subscription)
}

#[tauri::command]
pub fn terminal_on_exit(
    bridge: State<'_, Bridge>,
    subscriptions: State<'_, Subscriptions>,
    id: String,
    on_exit: Channel<ExitReport>,
) -> u64 {
    let subscription = bridge.terminal().on_exit(
        &id,
        Box::new(move |report| {
            if let Err(e) = on_exit.send(report.clone()) {
                log::debug!("[Terminal] Dropped exit event: {e}");
            }
        }),
    );
    track(&bridge, &subscriptions, &id, subscription)
}

#[tauri::command]
pub fn terminal_unsubscribe(subscriptions: State<'_, Subscriptions>, subscription: u64) -> bool {
    subscriptions.remove(subscription)
}

/// Keep `subscription` until the webview drops it or session `id` exits.
fn track(
    bridge: &Bridge,
    subscriptions: &Subscriptions,
    id: &str,
    subscription: Subscription,
) -> u64 {
    let handle = subscriptions.insert(id, subscription);
    if handle != NO_SUBSCRIPTION {
        let subscriptions = subscriptions.clone();
        let session = id.to_string();
        let _ = bridge.terminal().on_exit(
            id,
            Box::new(move |_| {
                subscriptions.release_session(&session);
            }),
        );
    }
    handle
}
