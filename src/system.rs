//! Host metadata, liveness probe and orderly exit.

use crate::error::ActionResult;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

pub const PING_REPLY: &str = "pong";

/// Delay between acknowledging `exit` and running the exit hook, so the
/// reply reaches the webview first.
const EXIT_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub platform: String,
    pub release: String,
    pub arch: String,
    pub cpus: usize,
    pub total_mem: u64,
    pub free_mem: u64,
    pub home_dir: Option<PathBuf>,
    pub project_root: PathBuf,
    pub is_dev: bool,
}

pub type ExitHook = Arc<dyn Fn() + Send + Sync>;

pub struct SystemInfoProvider {
    project_root: PathBuf,
    exit_hook: ExitHook,
    exiting: AtomicBool,
}

impl SystemInfoProvider {
    pub fn new(project_root: PathBuf, exit_hook: ExitHook) -> Self {
        Self {
            project_root,
            exit_hook,
            exiting: AtomicBool::new(false),
        }
    }

    pub fn info(&self) -> SystemInfo {
        let (release, cpus, total_mem, free_mem) = host_metrics();
        SystemInfo {
            platform: std::env::consts::OS.to_string(),
            release,
            arch: std::env::consts::ARCH.to_string(),
            cpus,
            total_mem,
            free_mem,
            home_dir: dirs::home_dir(),
            project_root: self.project_root.clone(),
            is_dev: cfg!(debug_assertions),
        }
    }

    pub fn ping(&self) -> &'static str {
        PING_REPLY
    }

    /// Acknowledge, then run the exit hook shortly after on another thread.
    /// Repeated calls are acknowledged but only the first schedules exit.
    pub fn exit(&self) -> ActionResult {
        if self.exiting.swap(true, Ordering::SeqCst) {
            return ActionResult::ok();
        }
        log::info!("[System] Exit requested");
        let hook = self.exit_hook.clone();
        std::thread::spawn(move || {
            std::thread::sleep(EXIT_DELAY);
            hook();
        });
        ActionResult::ok()
    }
}

/// Kernel release, cpu count and `(total, available)` memory in bytes.
fn host_metrics() -> (String, usize, u64, u64) {
    let sys = System::new_with_specifics(
        RefreshKind::new()
            .with_memory(MemoryRefreshKind::new().with_ram())
            .with_cpu(CpuRefreshKind::new()),
    );
    let release = System::kernel_version()
        .or_else(System::os_version)
        .unwrap_or_else(|| "unknown".to_string());
    let cpus = match sys.cpus().len() {
        0 => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        n => n,
    };
    (release, cpus, sys.total_memory(), sys.available_memory())
}
