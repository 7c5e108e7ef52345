use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::path::PathBuf;

/// Every hard failure a bridge call can reject with.
///
/// Soft, expected failures (killing a dead session, closing an untracked
/// window) are not errors; they come back as [`ActionResult`] with `ok: false`.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("is a directory: {}", .0.display())]
    IsADirectory(PathBuf),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("window host error: {0}")]
    WindowHost(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("capability error: {0}")]
    Capability(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Stable, machine-readable name the UI switches on.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::SpawnError(_) => "SpawnError",
            BridgeError::InvalidArgument(_) => "InvalidArgument",
            BridgeError::NotFound(_) => "NotFound",
            BridgeError::NotADirectory(_) => "NotADirectory",
            BridgeError::IsADirectory(_) => "IsADirectory",
            BridgeError::AccessDenied(_) => "AccessDenied",
            BridgeError::InvalidUrl(_) => "InvalidUrl",
            BridgeError::WindowHost(_) => "WindowHost",
            BridgeError::Config(_) => "Config",
            BridgeError::Capability(_) => "Capability",
            BridgeError::Io(_) => "Io",
        }
    }
}

// Tauri hands command errors to the webview as JSON, so the error has to be
// serializable. `{ kind, message }` is all the UI gets; no paths beyond what
// it asked for, no OS error codes.
impl Serialize for BridgeError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BridgeError", 2)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// `{ ok, message? }` reply for operations whose failure is routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self { ok: true, message: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }
}
