//! The boundary handed to the sandboxed side.
//!
//! One trait per capability area. The host builds the concrete managers;
//! command handlers only ever see a [`Bridge`] of trait objects, so nothing
//! beyond these methods is reachable through it.

use crate::capabilities;
use crate::config::BridgeConfig;
use crate::error::{ActionResult, Result};
use crate::events::Subscription;
use crate::filesystem::{FilesystemEntry, FilesystemGateway};
use crate::processes::{ProcessEntry, ProcessRegistry};
use crate::system::{ExitHook, SystemInfo, SystemInfoProvider};
use crate::terminal::{ExitReport, RunOptions, RunResult, TerminalManager};
use crate::websites::{OpenResult, WebsiteClosed, WebsiteManager, WebsiteOpened, WindowHandle, WindowHost};
use std::sync::Arc;

pub type DataListener = Box<dyn Fn(&str) + Send + Sync>;
pub type ExitListener = Box<dyn FnOnce(&ExitReport) + Send>;
pub type OpenedListener = Box<dyn Fn(&WebsiteOpened) + Send + Sync>;
pub type ClosedListener = Box<dyn Fn(&WebsiteClosed) + Send + Sync>;

pub trait Terminal: Send + Sync {
    fn run(&self, command: &str, options: RunOptions) -> Result<RunResult>;
    fn kill(&self, id: &str) -> ActionResult;
    fn write(&self, id: &str, data: &str) -> Result<()>;
    fn resize(&self, id: &str, cols: u16, rows: u16) -> Result<()>;
    fn on_data(&self, id: &str, listener: DataListener) -> Subscription;
    fn on_exit(&self, id: &str, listener: ExitListener) -> Subscription;
}

pub trait Filesystem: Send + Sync {
    fn read_file(&self, path: &str) -> Result<String>;
    fn write_file(&self, path: &str, content: &str) -> Result<()>;
    fn list_dir(&self, path: Option<&str>) -> Result<Vec<FilesystemEntry>>;
}

pub trait Processes: Send + Sync {
    fn list(&self) -> Vec<ProcessEntry>;
    fn kill(&self, id: &str) -> ActionResult;
}

pub trait Websites: Send + Sync {
    fn detect_urls(&self, text: &str) -> Vec<String>;
    fn open(&self, url: &str, title: Option<String>) -> OpenResult;
    fn close(&self, url: &str) -> ActionResult;
    fn on_opened(&self, listener: OpenedListener) -> Subscription;
    fn on_closed(&self, listener: ClosedListener) -> Subscription;
}

pub trait System: Send + Sync {
    fn get_info(&self) -> SystemInfo;
    fn exit(&self) -> ActionResult;
    fn ping(&self) -> &'static str;
}

impl Terminal for TerminalManager {
    fn run(&self, command: &str, options: RunOptions) -> Result<RunResult> {
        TerminalManager::run(self, command, options)
    }

    fn kill(&self, id: &str) -> ActionResult {
        TerminalManager::kill(self, id)
    }

    fn write(&self, id: &str, data: &str) -> Result<()> {
        TerminalManager::write(self, id, data)
    }

    fn resize(&self, id: &str, cols: u16, rows: u16) -> Result<()> {
        TerminalManager::resize(self, id, cols, rows)
    }

    fn on_data(&self, id: &str, listener: DataListener) -> Subscription {
        TerminalManager::on_data(self, id, listener)
    }

    fn on_exit(&self, id: &str, listener: ExitListener) -> Subscription {
        TerminalManager::on_exit(self, id, listener)
    }
}

impl Filesystem for FilesystemGateway {
    fn read_file(&self, path: &str) -> Result<String> {
        FilesystemGateway::read_file(self, path)
    }

    fn write_file(&self, path: &str, content: &str) -> Result<()> {
        FilesystemGateway::write_file(self, path, content)
    }

    fn list_dir(&self, path: Option<&str>) -> Result<Vec<FilesystemEntry>> {
        FilesystemGateway::list_dir(self, path)
    }
}

impl Processes for ProcessRegistry {
    fn list(&self) -> Vec<ProcessEntry> {
        ProcessRegistry::list(self)
    }

    fn kill(&self, id: &str) -> ActionResult {
        ProcessRegistry::kill(self, id)
    }
}

impl Websites for WebsiteManager {
    fn detect_urls(&self, text: &str) -> Vec<String> {
        WebsiteManager::detect_urls(self, text)
    }

    fn open(&self, url: &str, title: Option<String>) -> OpenResult {
        WebsiteManager::open(self, url, title)
    }

    fn close(&self, url: &str) -> ActionResult {
        WebsiteManager::close(self, url)
    }

    fn on_opened(&self, listener: OpenedListener) -> Subscription {
        WebsiteManager::on_opened(self, listener)
    }

    fn on_closed(&self, listener: ClosedListener) -> Subscription {
        WebsiteManager::on_closed(self, listener)
    }
}

impl System for SystemInfoProvider {
    fn get_info(&self) -> SystemInfo {
        self.info()
    }

    fn exit(&self) -> ActionResult {
        SystemInfoProvider::exit(self)
    }

    fn ping(&self) -> &'static str {
        SystemInfoProvider::ping(self)
    }
}

/// The whitelisted capability set. Cheap to clone, immutable once built.
#[derive(Clone)]
pub struct Bridge {
    terminal: Arc<dyn Terminal>,
    filesystem: Arc<dyn Filesystem>,
    processes: Arc<dyn Processes>,
    websites: Arc<dyn Websites>,
    system: Arc<dyn System>,
}

impl Bridge {
    pub fn terminal(&self) -> &dyn Terminal {
        self.terminal.as_ref()
    }

    pub fn filesystem(&self) -> &dyn Filesystem {
        self.filesystem.as_ref()
    }

    pub fn processes(&self) -> &dyn Processes {
        self.processes.as_ref()
    }

    pub fn websites(&self) -> &dyn Websites {
        self.websites.as_ref()
    }

    pub fn system(&self) -> &dyn System {
        self.system.as_ref()
    }
}

/// Privileged-host singleton: owns every registry for the life of the
/// process.
pub struct Host {
    config: BridgeConfig,
    terminal: Arc<TerminalManager>,
    websites: Arc<WebsiteManager>,
    bridge: Bridge,
}

impl Host {
    /// Build every capability or none. Any failure here means the UI must
    /// not be given a bridge at all.
    pub fn start(
        config: BridgeConfig,
        window_host: Arc<dyn WindowHost>,
        exit_hook: ExitHook,
    ) -> Result<Self> {
        capabilities::verify()?;
        config.validate()?;

        let filesystem = Arc::new(FilesystemGateway::new(&config.root)?);
        let terminal = Arc::new(TerminalManager::new(&config));
        let processes = Arc::new(ProcessRegistry::new(terminal.clone()));
        processes.observe_host();
        let websites = Arc::new(WebsiteManager::new(window_host, &config));
        let system = Arc::new(SystemInfoProvider::new(
            filesystem.root().to_path_buf(),
            exit_hook,
        ));

        let bridge = Bridge {
            terminal: terminal.clone(),
            filesystem,
            processes,
            websites: websites.clone(),
            system,
        };

        log::info!(
            "[Bridge] Host started with {} capabilities, root {}",
            capabilities::CAPABILITIES.len(),
            config.root.display()
        );

        Ok(Self {
            config,
            terminal,
            websites,
            bridge,
        })
    }

    pub fn bridge(&self) -> Bridge {
        self.bridge.clone()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Host-side notification that a website window was destroyed outside
    /// of `close` (window chrome, OS shortcut). Not part of the bridge.
    pub fn window_closed(&self, handle: &WindowHandle) {
        self.websites.window_closed(handle);
    }

    /// Kill every running terminal session.
    pub fn shutdown(&self) {
        log::info!("[Bridge] Host shutting down");
        self.terminal.shutdown();
    }
}
