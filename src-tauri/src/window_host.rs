use deskbridge::websites::{WindowHandle, WindowHost, WindowSpec};
use deskbridge::BridgeError;
use std::sync::{Arc, OnceLock};
use tauri::{AppHandle, Manager, WebviewUrl, WebviewWindowBuilder};

/// Filled in during Tauri setup; the host is built before the app exists.
pub type AppSlot = Arc<OnceLock<AppHandle>>;

/// Website windows as top-level Tauri webview windows. They load remote
/// content, so they are deliberately outside every IPC capability.
pub struct TauriWindowHost {
    app: AppSlot,
}

impl TauriWindowHost {
    pub fn new(app: AppSlot) -> Self {
        Self { app }
    }

    fn app(&self) -> deskbridge::Result<&AppHandle> {
        self.app
            .get()
            .ok_or_else(|| BridgeError::WindowHost("application is not running yet".into()))
    }
}

impl WindowHost for TauriWindowHost {
    fn create(&self, spec: &WindowSpec<'_>) -> deskbridge::Result<()> {
        let app = self.app()?;
        let url = spec
            .url
            .as_str()
            .parse()
            .map_err(|e| BridgeError::InvalidUrl(format!("{}: {e}", spec.url)))?;

        WebviewWindowBuilder::new(app, spec.handle.label(), WebviewUrl::External(url))
            .title(spec.title)
            .inner_size(spec.width, spec.height)
            .focused(true)
            .build()
            .map_err(|e| BridgeError::WindowHost(format!("failed to create window: {e}")))?;

        log::info!("[Websites] Created window {} for {}", spec.handle, spec.url);
        Ok(())
    }

    fn focus(&self, handle: &WindowHandle) -> deskbridge::Result<()> {
        let window = self
            .app()?
            .get_webview_window(handle.label())
            .ok_or_else(|| BridgeError::WindowHost(format!("window {handle} not found")))?;
        let _ = window.unminimize();
        window
            .show()
            .and_then(|_| window.set_focus())
            .map_err(|e| BridgeError::WindowHost(format!("failed to focus {handle}: {e}")))
    }

    fn close(&self, handle: &WindowHandle) -> deskbridge::Result<()> {
        if let Some(window) = self.app()?.get_webview_window(handle.label()) {
            window
                .close()
                .map_err(|e| BridgeError::WindowHost(format!("failed to close {handle}: {e}")))?;
        }
        Ok(())
    }
}
