use crate::error::Result;
use serde::Serialize;
use url::Url;

/// Host-owned identity of a native window (the Tauri window label).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WindowHandle(pub String);

impl WindowHandle {
    pub fn label(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct WindowSpec<'a> {
    pub handle: &'a WindowHandle,
    pub url: &'a Url,
    pub title: &'a str,
    pub width: f64,
    pub height: f64,
}

/// The native windowing seam. The desktop app implements it with Tauri
/// webview windows; tests use a recording fake.
///
/// Implementations report windows the user closes by calling
/// [`super::WebsiteManager::window_closed`].
pub trait WindowHost: Send + Sync {
    fn create(&self, spec: &WindowSpec<'_>) -> Result<()>;

    /// Bring an existing window to the front. An error means the window is
    /// gone.
    fn focus(&self, handle: &WindowHandle) -> Result<()>;

    fn close(&self, handle: &WindowHandle) -> Result<()>;
}
