//! Website window manager: one native window per canonical URL.

mod host;
mod links;

pub use self::host::{WindowHandle, WindowHost, WindowSpec};
pub use self::links::{canonicalize, detect_urls};

use crate::config::BridgeConfig;
use crate::error::{ActionResult, BridgeError};
use crate::events::{ListenerSet, Subscription};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebsiteWindow {
    /// Canonical URL, the dedup key.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub handle: WindowHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebsiteOpened {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebsiteClosed {
    pub url: String,
}

/// `{ ok, message?, reused? }` reply to `open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reused: Option<bool>,
}

impl OpenResult {
    fn opened() -> Self {
        Self {
            ok: true,
            message: None,
            reused: None,
        }
    }

    fn reused() -> Self {
        Self {
            ok: true,
            message: None,
            reused: Some(true),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
            reused: None,
        }
    }
}

enum Slot {
    /// Reserved while the host builds the window, so a concurrent `open`
    /// of the same URL does not build a second one. `closed` records a user
    /// close that arrived before creation returned.
    Pending { handle: WindowHandle, closed: bool },
    Open(WebsiteWindow),
}

#[derive(Default)]
struct WindowTable {
    by_url: HashMap<String, Slot>,
    by_handle: HashMap<WindowHandle, String>,
}

enum Reservation {
    Reserved(WindowHandle),
    InFlight,
    Existing(WindowHandle),
}

pub struct WebsiteManager {
    host: Arc<dyn WindowHost>,
    table: Mutex<WindowTable>,
    next_label: AtomicU64,
    opened: ListenerSet<WebsiteOpened>,
    closed: ListenerSet<WebsiteClosed>,
    width: f64,
    height: f64,
}

impl WebsiteManager {
    pub fn new(host: Arc<dyn WindowHost>, config: &BridgeConfig) -> Self {
        Self {
            host,
            table: Mutex::new(WindowTable::default()),
            next_label: AtomicU64::new(1),
            opened: ListenerSet::new(),
            closed: ListenerSet::new(),
            width: config.websites.width,
            height: config.websites.height,
        }
    }

    pub fn detect_urls(&self, text: &str) -> Vec<String> {
        detect_urls(text)
    }

    /// Focus the window already showing `url`, or open a new one.
    ///
    /// The table lock is never held across host calls; window creation can
    /// round-trip through the event loop, which also delivers close events.
    pub fn open(&self, url: &str, title: Option<String>) -> OpenResult {
        let canonical = match canonicalize(url) {
            Ok(u) => u,
            Err(e) => return OpenResult::failed(e.to_string()),
        };
        let key = canonical.to_string();

        let handle = match self.reserve(&key) {
            Reservation::Reserved(handle) => handle,
            Reservation::InFlight => return still_opening(&key),
            Reservation::Existing(handle) => match self.host.focus(&handle) {
                Ok(()) => {
                    log::info!("[Websites] Reusing {handle} for {key}");
                    return OpenResult::reused();
                }
                Err(e) => {
                    log::warn!("[Websites] {handle} for {key} is gone ({e}), reopening");
                    self.window_closed(&handle);
                    match self.reserve(&key) {
                        Reservation::Reserved(handle) => handle,
                        Reservation::InFlight => return still_opening(&key),
                        Reservation::Existing(_) => return OpenResult::reused(),
                    }
                }
            },
        };

        let window_title = title
            .clone()
            .unwrap_or_else(|| canonical.host_str().unwrap_or(&key).to_string());
        let spec = WindowSpec {
            handle: &handle,
            url: &canonical,
            title: &window_title,
            width: self.width,
            height: self.height,
        };

        if let Err(e) = self.host.create(&spec) {
            let mut table = self.table.lock();
            table.by_url.remove(&key);
            table.by_handle.remove(&handle);
            drop(table);
            log::warn!("[Websites] Failed to open {key}: {e}");
            return OpenResult::failed(e.to_string());
        }

        let closed_during_open = {
            let mut table = self.table.lock();
            let still_pending = matches!(
                table.by_url.get(&key),
                Some(Slot::Pending { handle: h, closed: false }) if *h == handle
            );
            if still_pending {
                table.by_url.insert(
                    key.clone(),
                    Slot::Open(WebsiteWindow {
                        url: key.clone(),
                        title: title.clone(),
                        handle: handle.clone(),
                    }),
                );
            } else {
                table.by_url.remove(&key);
                table.by_handle.remove(&handle);
            }
            !still_pending
        };

        log::info!("[Websites] Opened {key} as {handle}");
        self.opened.emit(&WebsiteOpened {
            url: key.clone(),
            title,
        });
        if closed_during_open {
            log::info!("[Websites] {key} closed by user while opening ({handle})");
            self.closed.emit(&WebsiteClosed { url: key });
        }
        OpenResult::opened()
    }

    /// Close and forget the window for `url`.
    pub fn close(&self, url: &str) -> ActionResult {
        let key = match canonicalize(url) {
            Ok(u) => u.to_string(),
            Err(e) => return ActionResult::failed(e.to_string()),
        };

        let window = {
            let mut table = self.table.lock();
            match table.by_url.remove(&key) {
                Some(Slot::Open(window)) => {
                    table.by_handle.remove(&window.handle);
                    window
                }
                Some(pending @ Slot::Pending { .. }) => {
                    table.by_url.insert(key.clone(), pending);
                    return ActionResult::failed(format!("window for {key} is still opening"));
                }
                None => return ActionResult::failed(format!("no window open for {key}")),
            }
        };

        // Already untracked, so the host's own close notification is a no-op.
        if let Err(e) = self.host.close(&window.handle) {
            log::warn!("[Websites] Host failed to close {}: {e}", window.handle);
        }
        log::info!("[Websites] Closed {key}");
        self.closed.emit(&WebsiteClosed { url: key });
        ActionResult::ok()
    }

    /// Called by the host when a window went away on its own (the user
    /// closed it). Unknown handles are ignored, which makes the notification
    /// for a programmatic close harmless.
    pub fn window_closed(&self, handle: &WindowHandle) {
        let removed = {
            let mut table = self.table.lock();
            let Some(key) = table.by_handle.get(handle).cloned() else {
                return;
            };
            // Still being created: `open` reports the close once it returns.
            if let Some(Slot::Pending { handle: h, closed }) = table.by_url.get_mut(&key) {
                if *h == *handle {
                    *closed = true;
                    return;
                }
            }
            table.by_handle.remove(handle);
            match table.by_url.remove(&key) {
                Some(Slot::Open(window)) if window.handle == *handle => Some(window),
                Some(other) => {
                    table.by_url.insert(key, other);
                    None
                }
                None => None,
            }
        };

        if let Some(window) = removed {
            log::info!("[Websites] {} closed by user ({})", window.url, handle);
            self.closed.emit(&WebsiteClosed { url: window.url });
        }
    }

    pub fn on_opened(&self, listener: impl Fn(&WebsiteOpened) + Send + Sync + 'static) -> Subscription {
        self.opened.subscribe(listener)
    }

    pub fn on_closed(&self, listener: impl Fn(&WebsiteClosed) + Send + Sync + 'static) -> Subscription {
        self.closed.subscribe(listener)
    }

    pub fn windows(&self) -> Vec<WebsiteWindow> {
        let table = self.table.lock();
        let mut windows: Vec<WebsiteWindow> = table
            .by_url
            .values()
            .filter_map(|slot| match slot {
                Slot::Open(w) => Some(w.clone()),
                Slot::Pending { .. } => None,
            })
            .collect();
        windows.sort_by(|a, b| a.url.cmp(&b.url));
        windows
    }

    pub fn is_open(&self, url: &str) -> Result<bool, BridgeError> {
        let key = canonicalize(url)?.to_string();
        Ok(matches!(self.table.lock().by_url.get(&key), Some(Slot::Open(_))))
    }

    fn reserve(&self, key: &str) -> Reservation {
        let mut table = self.table.lock();
        match table.by_url.get(key) {
            Some(Slot::Pending { .. }) => Reservation::InFlight,
            Some(Slot::Open(w)) => Reservation::Existing(w.handle.clone()),
            None => {
                let handle = WindowHandle(format!(
                    "website-{}",
                    self.next_label.fetch_add(1, Ordering::SeqCst)
                ));
                table.by_url.insert(
                    key.to_string(),
                    Slot::Pending {
                        handle: handle.clone(),
                        closed: false,
                    },
                );
                table.by_handle.insert(handle.clone(), key.to_string());
                Reservation::Reserved(handle)
            }
        }
    }
}

fn still_opening(key: &str) -> OpenResult {
    OpenResult::failed(format!("window for {key} is still opening"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::collections::HashSet;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeHost {
        created: Mutex<Vec<(String, String)>>,
        focused: Mutex<Vec<String>>,
        closed: Mutex<Vec<String>>,
        gone: Mutex<HashSet<String>>,
        fail_create: Mutex<bool>,
    }

    impl WindowHost for FakeHost {
        fn create(&self, spec: &WindowSpec<'_>) -> Result<()> {
            if *self.fail_create.lock() {
                return Err(BridgeError::WindowHost("display unavailable".into()));
            }
            self.created
                .lock()
                .push((spec.handle.0.clone(), spec.url.to_string()));
            Ok(())
        }

        fn focus(&self, handle: &WindowHandle) -> Result<()> {
            if self.gone.lock().contains(&handle.0) {
                return Err(BridgeError::WindowHost("no such window".into()));
            }
            self.focused.lock().push(handle.0.clone());
            Ok(())
        }

        fn close(&self, handle: &WindowHandle) -> Result<()> {
            self.closed.lock().push(handle.0.clone());
            Ok(())
        }
    }

    struct Fixture {
        host: Arc<FakeHost>,
        manager: WebsiteManager,
        opened: Arc<Mutex<Vec<WebsiteOpened>>>,
        closed: Arc<Mutex<Vec<WebsiteClosed>>>,
    }

    fn fixture() -> Fixture {
        let host = Arc::new(FakeHost::default());
        let manager = WebsiteManager::new(host.clone(), &BridgeConfig::default());
        let opened = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(Vec::new()));
        let sink = opened.clone();
        let _ = manager.on_opened(move |e| sink.lock().push(e.clone()));
        let sink = closed.clone();
        let _ = manager.on_closed(move |e| sink.lock().push(e.clone()));
        Fixture {
            host,
            manager,
            opened,
            closed,
        }
    }

    #[test]
    fn second_open_reuses_and_emits_once() {
        let f = fixture();
        let first = f.manager.open("https://example.com/a", Some("Example".into()));
        assert_eq!(first, OpenResult::opened());
        let second = f.manager.open("https://example.com/a/", None);
        assert_eq!(second.reused, Some(true));
        assert!(second.ok);

        assert_eq!(f.host.created.lock().len(), 1);
        assert_eq!(*f.host.focused.lock(), vec!["website-1".to_string()]);
        assert_eq!(
            *f.opened.lock(),
            vec![WebsiteOpened {
                url: "https://example.com/a".into(),
                title: Some("Example".into()),
            }]
        );
    }

    #[test]
    fn close_untracks_and_emits_once() {
        let f = fixture();
        f.manager.open("https://example.com/a", None);
        assert!(f.manager.close("https://EXAMPLE.com/a#frag").ok);
        assert!(f.manager.windows().is_empty());
        assert_eq!(*f.host.closed.lock(), vec!["website-1".to_string()]);

        // The host echoes the close back; that must not emit again.
        f.manager.window_closed(&WindowHandle("website-1".into()));
        assert_eq!(f.closed.lock().len(), 1);
    }

    #[test]
    fn close_untracked_fails() {
        let f = fixture();
        let result = f.manager.close("https://example.com/never");
        assert!(!result.ok);
        assert!(result.message.is_some());
        assert!(f.closed.lock().is_empty());
    }

    #[test]
    fn user_close_is_reported() {
        let f = fixture();
        f.manager.open("https://example.com/", None);
        f.manager.window_closed(&WindowHandle("website-1".into()));

        assert_eq!(
            *f.closed.lock(),
            vec![WebsiteClosed {
                url: "https://example.com/".into()
            }]
        );
        assert!(!f.manager.is_open("https://example.com").unwrap());
        assert!(!f.manager.close("https://example.com").ok);
    }

    #[test]
    fn reopen_after_close_creates_new_window() {
        let f = fixture();
        f.manager.open("https://example.com/", None);
        f.manager.close("https://example.com/");
        let again = f.manager.open("https://example.com/", None);
        assert_eq!(again, OpenResult::opened());
        assert_eq!(f.opened.lock().len(), 2);
        assert_eq!(f.manager.windows()[0].handle.label(), "website-2");
    }

    #[test]
    fn stale_window_is_replaced() {
        let f = fixture();
        f.manager.open("https://example.com/", None);
        f.host.gone.lock().insert("website-1".into());

        let result = f.manager.open("https://example.com/", None);
        assert_eq!(result, OpenResult::opened());
        assert_eq!(f.closed.lock().len(), 1);
        assert_eq!(f.opened.lock().len(), 2);
        assert_eq!(f.host.created.lock().len(), 2);
    }

    #[test]
    fn host_failure_is_soft_and_leaves_nothing_tracked() {
        let f = fixture();
        *f.host.fail_create.lock() = true;
        let result = f.manager.open("https://example.com/", None);
        assert!(!result.ok);
        assert!(result.message.unwrap().contains("display unavailable"));
        assert!(f.manager.windows().is_empty());
        assert!(f.opened.lock().is_empty());

        *f.host.fail_create.lock() = false;
        assert_eq!(f.manager.open("https://example.com/", None), OpenResult::opened());
    }

    #[test]
    fn invalid_url_is_soft_failure() {
        let f = fixture();
        let result = f.manager.open("file:///etc/passwd", None);
        assert!(!result.ok);
        assert!(f.host.created.lock().is_empty());
    }

    #[test]
    fn distinct_urls_get_distinct_windows() {
        let f = fixture();
        f.manager.open("https://a.com/", None);
        f.manager.open("https://b.com/", None);
        let windows = f.manager.windows();
        assert_eq!(windows.len(), 2);
        assert_ne!(windows[0].handle, windows[1].handle);
    }

    #[test]
    fn default_title_is_host() {
        struct TitleHost(Arc<Mutex<Vec<String>>>);
        impl WindowHost for TitleHost {
            fn create(&self, spec: &WindowSpec<'_>) -> Result<()> {
                self.0.lock().push(spec.title.to_string());
                Ok(())
            }
            fn focus(&self, _: &WindowHandle) -> Result<()> {
                Ok(())
            }
            fn close(&self, _: &WindowHandle) -> Result<()> {
                Ok(())
            }
        }

        let titles = Arc::new(Mutex::new(Vec::new()));
        let manager = WebsiteManager::new(
            Arc::new(TitleHost(titles.clone())),
            &BridgeConfig::default(),
        );
        manager.open("https://docs.rs/serde", None);
        manager.open("https://crates.io/", Some("Crates".into()));
        assert_eq!(*titles.lock(), vec!["docs.rs".to_string(), "Crates".to_string()]);
    }

    /// Blocks in `create` until the test releases it.
    struct GateHost {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl WindowHost for GateHost {
        fn create(&self, _: &WindowSpec<'_>) -> Result<()> {
            let _ = self.entered.lock().send(());
            let _ = self.release.lock().recv_timeout(Duration::from_secs(5));
            Ok(())
        }
        fn focus(&self, _: &WindowHandle) -> Result<()> {
            Ok(())
        }
        fn close(&self, _: &WindowHandle) -> Result<()> {
            Ok(())
        }
    }

    struct Gated {
        manager: Arc<WebsiteManager>,
        entered: mpsc::Receiver<()>,
        release: mpsc::Sender<()>,
        opened: Arc<Mutex<Vec<WebsiteOpened>>>,
        closed: Arc<Mutex<Vec<WebsiteClosed>>>,
    }

    fn gated() -> Gated {
        let (entered_tx, entered) = mpsc::channel();
        let (release, release_rx) = mpsc::channel();
        let host = GateHost {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        let manager = Arc::new(WebsiteManager::new(Arc::new(host), &BridgeConfig::default()));
        let opened = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(Vec::new()));
        let sink = opened.clone();
        let _ = manager.on_opened(move |e| sink.lock().push(e.clone()));
        let sink = closed.clone();
        let _ = manager.on_closed(move |e| sink.lock().push(e.clone()));
        Gated {
            manager,
            entered,
            release,
            opened,
            closed,
        }
    }

    #[test]
    fn open_while_creating_reports_still_opening() {
        let g = gated();
        let manager = g.manager.clone();
        let first = thread::spawn(move || manager.open("https://example.com/", None));
        g.entered.recv_timeout(Duration::from_secs(5)).unwrap();

        let second = g.manager.open("https://example.com", None);
        assert!(!second.ok);
        assert!(second.message.unwrap().contains("still opening"));
        assert!(!g.manager.close("https://example.com/").ok);

        g.release.send(()).unwrap();
        assert_eq!(first.join().unwrap(), OpenResult::opened());
        assert_eq!(g.manager.open("https://example.com/", None), OpenResult::reused());
        assert_eq!(g.opened.lock().len(), 1);
    }

    #[test]
    fn user_close_during_creation_is_reported() {
        let g = gated();
        let manager = g.manager.clone();
        let first = thread::spawn(move || manager.open("https://example.com/", None));
        g.entered.recv_timeout(Duration::from_secs(5)).unwrap();

        g.manager.window_closed(&WindowHandle("website-1".into()));
        assert!(g.closed.lock().is_empty());

        g.release.send(()).unwrap();
        assert!(first.join().unwrap().ok);
        assert!(g.manager.windows().is_empty());
        assert_eq!(g.opened.lock().len(), 1);
        assert_eq!(
            *g.closed.lock(),
            vec![WebsiteClosed {
                url: "https://example.com/".into()
            }]
        );

        // A later close notification for the same handle is ignored.
        g.manager.window_closed(&WindowHandle("website-1".into()));
        assert_eq!(g.closed.lock().len(), 1);
    }
}
