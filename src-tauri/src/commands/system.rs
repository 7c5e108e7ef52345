/// System commands

use deskbridge::system::SystemInfo;
use deskbridge::{ActionResult, Bridge};
use tauri::State;

#[tauri::command]
pub fn system_get_info(bridge: State<'_, Bridge>) -> SystemInfo {
    bridge.system().get_info()
}

#[tauri::command]
pub fn system_exit(bridge: State<'_, Bridge>) -> ActionResult {
    bridge.system().exit()
}

#[tauri::command]
pub fn system_ping(bridge: State<'_, Bridge>) -> String {
    bridge.system().ping().to_string()
}
