/// Filesystem commands
/// Paths are relative to the configured root; the gateway rejects anything
/// that leaves it.

use deskbridge::filesystem::FilesystemEntry;
use deskbridge::{ActionResult, Bridge, BridgeError};
use tauri::State;

#[tauri::command]
pub async fn fs_read_file(bridge: State<'_, Bridge>, path: String) -> Result<String, BridgeError> {
    bridge.filesystem().read_file(&path)
}

#[tauri::command]
pub async fn fs_write_file(
    bridge: State<'_, Bridge>,
    path: String,
    content: String,
) -> Result<ActionResult, BridgeError> {
    bridge.filesystem().write_file(&path, &content)?;
    Ok(ActionResult::ok())
}

#[tauri::command]
pub async fn fs_list_dir(
    bridge: State<'_, Bridge>,
    path: Option<String>,
) -> Result<Vec<FilesystemEntry>, BridgeError> {
    bridge.filesystem().list_dir(path.as_deref())
}
