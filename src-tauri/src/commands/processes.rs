/// Process registry commands

use deskbridge::processes::ProcessEntry;
use deskbridge::{ActionResult, Bridge};
use tauri::State;

#[tauri::command]
pub fn processes_list(bridge: State<'_, Bridge>) -> Vec<ProcessEntry> {
    bridge.processes().list()
}

#[tauri::command]
pub fn processes_kill(bridge: State<'_, Bridge>, id: String) -> ActionResult {
    bridge.processes().kill(&id)
}
