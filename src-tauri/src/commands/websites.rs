/// Website window commands
/// Async so window creation never runs on the main thread that also drives
/// the event loop. Open/close notifications go out as global events, see
/// `forward_website_events` in lib.rs.

use deskbridge::websites::OpenResult;
use deskbridge::{ActionResult, Bridge, BridgeError};
use tauri::State;

#[tauri::command]
pub fn websites_detect_urls(bridge: State<'_, Bridge>, text: String) -> Vec<String> {
    bridge.websites().detect_urls(&text)
}

#[tauri::command]
pub async fn websites_open(
    bridge: State<'_, Bridge>,
    url: String,
    title: Option<String>,
) -> Result<OpenResult, BridgeError> {
    Ok(bridge.websites().open(&url, title))
}

#[tauri::command]
pub async fn websites_close(bridge: State<'_, Bridge>, url: String) -> Result<ActionResult, BridgeError> {
    Ok(bridge.websites().close(&url))
}
