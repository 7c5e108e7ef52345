//! End-to-end scenarios through the bridge, the way the webview sees it.

use deskbridge::error::Result;
use deskbridge::terminal::{ExitReport, RunOptions};
use deskbridge::websites::{WebsiteClosed, WebsiteOpened, WindowHandle, WindowHost, WindowSpec};
use deskbridge::{BridgeConfig, BridgeError, Host};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct RecordingHost {
    created: Mutex<Vec<String>>,
    closed: Mutex<Vec<String>>,
}

impl WindowHost for RecordingHost {
    fn create(&self, spec: &WindowSpec<'_>) -> Result<()> {
        self.created.lock().push(spec.handle.label().to_string());
        Ok(())
    }

    fn focus(&self, _handle: &WindowHandle) -> Result<()> {
        Ok(())
    }

    fn close(&self, handle: &WindowHandle) -> Result<()> {
        self.closed.lock().push(handle.label().to_string());
        Ok(())
    }
}

struct Harness {
    _root: tempfile::TempDir,
    windows: Arc<RecordingHost>,
    exits: Arc<AtomicUsize>,
    host: Host,
}

fn start() -> Harness {
    let root = tempfile::tempdir().unwrap();
    let windows = Arc::new(RecordingHost::default());
    let exits = Arc::new(AtomicUsize::new(0));
    let counter = exits.clone();
    let host = Host::start(
        BridgeConfig::with_root(root.path()),
        windows.clone(),
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .unwrap();
    Harness {
        _root: root,
        windows,
        exits,
        host,
    }
}

#[test]
fn startup_fails_closed_on_bad_root() {
    let root = tempfile::tempdir().unwrap();
    let config = BridgeConfig::with_root(root.path().join("missing"));
    let result = Host::start(config, Arc::new(RecordingHost::default()), Arc::new(|| {}));
    assert!(matches!(result, Err(BridgeError::Config(_))));
}

#[cfg(unix)]
#[test]
fn echo_scenario() {
    let h = start();
    let bridge = h.host.bridge();
    let terminal = bridge.terminal();

    let id = terminal.run("echo hi", RunOptions::default()).unwrap().id;
    assert_eq!(id, "t1");
    // One IPC round-trip between the run reply and the subscription.
    std::thread::sleep(Duration::from_millis(50));

    let (tx, rx) = mpsc::channel();
    let _ = terminal.on_data(
        &id,
        Box::new(move |chunk| {
            let _ = tx.send(chunk.to_string());
        }),
    );
    let mut output = String::new();
    while !output.contains("hi") {
        output.push_str(&rx.recv_timeout(WAIT).unwrap());
    }

    let (tx, rx) = mpsc::channel();
    let _ = terminal.on_exit(
        &id,
        Box::new(move |report| {
            let _ = tx.send(report.clone());
        }),
    );
    assert_eq!(
        rx.recv_timeout(WAIT).unwrap(),
        ExitReport {
            code: 0,
            error: None
        }
    );
}

#[cfg(unix)]
#[test]
fn session_shows_in_process_list_until_killed() {
    let h = start();
    let bridge = h.host.bridge();
    let id = bridge
        .terminal()
        .run("sleep 30", RunOptions::default())
        .unwrap()
        .id;

    let listed: Vec<String> = bridge.processes().list().into_iter().map(|p| p.id).collect();
    assert!(listed.contains(&id));
    assert!(listed.contains(&"host".to_string()));

    let (tx, rx) = mpsc::channel();
    let _ = bridge.terminal().on_exit(
        &id,
        Box::new(move |r| {
            let _ = tx.send(r.clone());
        }),
    );
    assert!(bridge.processes().kill(&id).ok);
    let report = rx.recv_timeout(WAIT).unwrap();
    assert!(report.error.is_some());

    assert!(!bridge.terminal().kill(&id).ok);
    assert!(bridge.processes().list().iter().all(|p| p.id != id));
}

#[test]
fn kill_nonexistent_has_message() {
    let h = start();
    let result = h.host.bridge().terminal().kill("nonexistent");
    assert!(!result.ok);
    assert!(!result.message.unwrap_or_default().is_empty());
}

#[test]
fn filesystem_is_scoped() {
    let h = start();
    let bridge = h.host.bridge();
    let fs = bridge.filesystem();

    fs.write_file("hello.txt", "world").unwrap();
    assert_eq!(fs.read_file("hello.txt").unwrap(), "world");
    assert_eq!(fs.list_dir(None).unwrap().len(), 1);

    assert!(matches!(fs.read_file("../x"), Err(BridgeError::AccessDenied(_))));
    assert!(matches!(fs.write_file("../x", "y"), Err(BridgeError::AccessDenied(_))));
    assert!(matches!(fs.list_dir(Some("..")), Err(BridgeError::AccessDenied(_))));
}

#[test]
fn website_lifecycle() {
    let h = start();
    let bridge = h.host.bridge();
    let sites = bridge.websites();

    let opened: Arc<Mutex<Vec<WebsiteOpened>>> = Arc::default();
    let closed: Arc<Mutex<Vec<WebsiteClosed>>> = Arc::default();
    let sink = opened.clone();
    let opened_sub = sites.on_opened(Box::new(move |e| sink.lock().push(e.clone())));
    let sink = closed.clone();
    let _ = sites.on_closed(Box::new(move |e| sink.lock().push(e.clone())));

    let urls = sites.detect_urls("docs at https://example.com/a and nothing else");
    assert_eq!(urls, vec!["https://example.com/a"]);

    assert!(sites.open(&urls[0], None).ok);
    let again = sites.open("https://example.com/a/", None);
    assert_eq!(again.reused, Some(true));
    assert_eq!(opened.lock().len(), 1);
    assert_eq!(h.windows.created.lock().len(), 1);

    // User closes the window from its title bar.
    let label = h.windows.created.lock()[0].clone();
    h.host.window_closed(&WindowHandle(label));
    assert_eq!(closed.lock().len(), 1);
    assert!(!sites.close("https://example.com/a").ok);

    opened_sub.unsubscribe();
    assert!(sites.open("https://example.com/b", None).ok);
    assert_eq!(opened.lock().len(), 1);
    assert!(sites.close("https://example.com/b").ok);
    assert_eq!(closed.lock().len(), 2);
    assert_eq!(h.windows.closed.lock().len(), 1);
}

#[test]
fn system_surface() {
    let h = start();
    let bridge = h.host.bridge();
    assert_eq!(bridge.system().ping(), "pong");

    let info = bridge.system().get_info();
    assert_eq!(info.project_root, h._root.path().canonicalize().unwrap());

    assert!(bridge.system().exit().ok);
    let deadline = std::time::Instant::now() + WAIT;
    while h.exits.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(h.exits.load(Ordering::SeqCst), 1);
}

#[cfg(unix)]
#[test]
fn shutdown_kills_running_sessions() {
    let h = start();
    let bridge = h.host.bridge();
    let id = bridge
        .terminal()
        .run("sleep 30", RunOptions::default())
        .unwrap()
        .id;
    let (tx, rx) = mpsc::channel();
    let _ = bridge.terminal().on_exit(
        &id,
        Box::new(move |_| {
            let _ = tx.send(());
        }),
    );

    h.host.shutdown();
    rx.recv_timeout(WAIT).unwrap();
}
