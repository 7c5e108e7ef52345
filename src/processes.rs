//! Process registry: terminal sessions plus processes the host observes
//! but does not own.

use crate::error::ActionResult;
use crate::terminal::TerminalManager;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Id under which the host registers its own process.
pub const HOST_PROCESS_ID: &str = "host";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessEntry {
    pub id: String,
    pub pid: u32,
    pub cwd: PathBuf,
    pub command: String,
}

pub struct ProcessRegistry {
    terminal: Arc<TerminalManager>,
    observed: Mutex<BTreeMap<String, ProcessEntry>>,
}

impl ProcessRegistry {
    pub fn new(terminal: Arc<TerminalManager>) -> Self {
        Self {
            terminal,
            observed: Mutex::new(BTreeMap::new()),
        }
    }

    /// Track a process the host knows about but did not spawn as a session.
    /// Ids that collide with a live session are refused.
    pub fn observe(&self, entry: ProcessEntry) -> bool {
        if self.terminal.session(&entry.id).is_some() {
            return false;
        }
        log::debug!("[Processes] Observing {} (pid {})", entry.id, entry.pid);
        self.observed.lock().insert(entry.id.clone(), entry);
        true
    }

    pub fn forget(&self, id: &str) -> Option<ProcessEntry> {
        self.observed.lock().remove(id)
    }

    /// Register the host process itself.
    pub fn observe_host(&self) {
        let cwd = std::env::current_dir().unwrap_or_default();
        let command = std::env::args().collect::<Vec<_>>().join(" ");
        self.observe(ProcessEntry {
            id: HOST_PROCESS_ID.to_string(),
            pid: std::process::id(),
            cwd,
            command,
        });
    }

    /// Terminal sessions first (by id), then observed processes (by id).
    pub fn list(&self) -> Vec<ProcessEntry> {
        let mut entries = self.terminal.running_entries();
        entries.extend(self.observed.lock().values().cloned());
        entries
    }

    /// Kills tracked terminal sessions. Observed processes are not ours to
    /// kill, so that is reported as a soft failure.
    pub fn kill(&self, id: &str) -> ActionResult {
        if self.terminal.session(id).is_some() {
            return self.terminal.kill(id);
        }
        if self.observed.lock().contains_key(id) {
            return ActionResult::failed(format!(
                "process {id} is not owned by a terminal session and cannot be killed from here"
            ));
        }
        ActionResult::failed(format!("no tracked process with id {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;

    fn registry(dir: &std::path::Path) -> (Arc<TerminalManager>, ProcessRegistry) {
        let terminal = Arc::new(TerminalManager::new(&BridgeConfig::with_root(dir)));
        let registry = ProcessRegistry::new(terminal.clone());
        (terminal, registry)
    }

    #[test]
    fn host_process_is_listed_and_not_killable() {
        let dir = tempfile::tempdir().unwrap();
        let (_, registry) = registry(dir.path());
        registry.observe_host();

        let list = registry.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, HOST_PROCESS_ID);
        assert_eq!(list[0].pid, std::process::id());

        let result = registry.kill(HOST_PROCESS_ID);
        assert!(!result.ok);
        assert!(result.message.unwrap().contains("not owned"));
    }

    #[test]
    fn unknown_process_kill_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (_, registry) = registry(dir.path());
        let result = registry.kill("nonexistent");
        assert!(!result.ok);
        assert!(result.message.is_some());
    }

    #[test]
    fn forget_removes_observed_entry() {
        let dir = tempfile::tempdir().unwrap();
        let (_, registry) = registry(dir.path());
        registry.observe(ProcessEntry {
            id: "indexer".into(),
            pid: 4242,
            cwd: dir.path().to_path_buf(),
            command: "indexer --watch".into(),
        });
        assert_eq!(registry.list().len(), 1);
        assert!(registry.forget("indexer").is_some());
        assert!(registry.list().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn terminal_sessions_are_listed_and_killable() {
        use crate::terminal::RunOptions;
        use std::sync::mpsc;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let (terminal, registry) = registry(dir.path());
        let id = terminal.run("sleep 30", RunOptions::default()).unwrap().id;

        let list = registry.list();
        assert!(list.iter().any(|e| e.id == id && e.command == "sleep 30"));

        let (tx, rx) = mpsc::channel();
        let _ = terminal.on_exit(&id, move |_| {
            let _ = tx.send(());
        });
        assert!(registry.kill(&id).ok);
        rx.recv_timeout(Duration::from_secs(10)).unwrap();

        assert!(registry.list().iter().all(|e| e.id != id));
        assert!(!registry.kill(&id).ok);
        assert!(!registry.observe(ProcessEntry {
            id: id.clone(),
            pid: 1,
            cwd: dir.path().to_path_buf(),
            command: "shadow".into(),
        }));
    }
}
