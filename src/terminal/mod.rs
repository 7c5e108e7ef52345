//! Terminal session manager.
//!
//! Every `run` gets its own PTY and a pump thread that reads output until
//! EOF, then reaps the child and publishes the exit report. Sessions stay
//! in the table after exit (bounded by `exit_history`) so late `onExit`
//! subscribers still get the final status.

mod session;
mod spawn;

pub use session::{ExitReport, SessionInfo, SessionState};

use crate::config::BridgeConfig;
use crate::error::{ActionResult, BridgeError, Result};
use crate::events::Subscription;
use crate::processes::ProcessEntry;
use parking_lot::Mutex;
use portable_pty::{Child, ChildKiller, ExitStatus, MasterPty, PtySize};
use serde::{Deserialize, Serialize};
use session::SessionEvents;
use spawn::Utf8Chunker;
use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunOptions {
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub id: String,
}

struct SessionIo {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
}

struct Session {
    command: String,
    cwd: PathBuf,
    pid: Option<u32>,
    state: SessionState,
    exit_code: Option<i32>,
    kill_requested: bool,
    events: Arc<SessionEvents>,
    /// Dropped once the process is gone; writes and resizes need it.
    io: Option<SessionIo>,
}

#[derive(Default)]
struct SessionTable {
    sessions: HashMap<String, Session>,
    /// Exited session ids, oldest first.
    retired: VecDeque<String>,
}

impl SessionTable {
    fn running_mut(&mut self, id: &str) -> Result<&mut Session> {
        match self.sessions.get_mut(id) {
            Some(s) if s.state == SessionState::Running => Ok(s),
            Some(_) => Err(BridgeError::InvalidArgument(format!(
                "terminal session {id} has exited"
            ))),
            None => Err(BridgeError::InvalidArgument(format!(
                "no terminal session with id {id}"
            ))),
        }
    }

    fn retire(&mut self, id: &str, report: &ExitReport, killed: bool, history: usize) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.state = if killed {
                SessionState::Killed
            } else {
                SessionState::Exited
            };
            session.exit_code = Some(report.code);
            session.io = None;
            self.retired.push_back(id.to_string());
        }
        while self.retired.len() > history {
            if let Some(old) = self.retired.pop_front() {
                self.sessions.remove(&old);
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Settings {
    shell: Vec<String>,
    default_cwd: PathBuf,
    cols: u16,
    rows: u16,
    kill_grace: Option<Duration>,
    exit_history: usize,
    backlog_bytes: usize,
}

pub struct TerminalManager {
    table: Arc<Mutex<SessionTable>>,
    next_id: AtomicU64,
    settings: Settings,
}

impl TerminalManager {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            table: Arc::new(Mutex::new(SessionTable::default())),
            next_id: AtomicU64::new(1),
            settings: Settings {
                shell: config.shell.clone().unwrap_or_else(spawn::default_shell),
                default_cwd: config
                    .default_cwd
                    .clone()
                    .unwrap_or_else(|| config.root.clone()),
                cols: config.terminal.cols,
                rows: config.terminal.rows,
                kill_grace: config.terminal.kill_grace_ms.map(Duration::from_millis),
                exit_history: config.terminal.exit_history.max(1),
                backlog_bytes: config.terminal.backlog_bytes,
            },
        }
    }

    /// Start `command` in a new session. Returns as soon as the process
    /// exists; output and exit arrive through `on_data` / `on_exit`.
    pub fn run(&self, command: &str, options: RunOptions) -> Result<RunResult> {
        if command.trim().is_empty() {
            return Err(BridgeError::InvalidArgument(
                "command must not be empty".into(),
            ));
        }

        let cwd = match options.cwd {
            Some(dir) if dir.is_relative() => self.settings.default_cwd.join(dir),
            Some(dir) => dir,
            None => self.settings.default_cwd.clone(),
        };
        if !cwd.is_dir() {
            return Err(BridgeError::SpawnError(format!(
                "working directory {} does not exist",
                cwd.display()
            )));
        }

        let spawned = spawn::spawn_pty(
            &self.settings.shell,
            command,
            &cwd,
            self.settings.cols,
            self.settings.rows,
        )?;

        let id = format!("t{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let pid = spawned.child.process_id();
        let events = SessionEvents::new(self.settings.backlog_bytes);

        self.table.lock().sessions.insert(
            id.clone(),
            Session {
                command: command.to_string(),
                cwd: cwd.clone(),
                pid,
                state: SessionState::Running,
                exit_code: None,
                kill_requested: false,
                events: events.clone(),
                io: Some(SessionIo {
                    master: spawned.master,
                    writer: spawned.writer,
                    killer: spawned.child.clone_killer(),
                }),
            },
        );

        log::info!(
            "[Terminal] Spawned {} (pid {:?}) in {}: {}",
            id,
            pid,
            cwd.display(),
            command
        );

        let table = self.table.clone();
        let history = self.settings.exit_history;
        let session_id = id.clone();
        thread::spawn(move || {
            pump(
                &session_id,
                spawned.reader,
                spawned.child,
                &events,
                &table,
                history,
            )
        });

        Ok(RunResult { id })
    }

    /// Every output chunk of session `id`, in order, starting with the
    /// retained backlog. Unknown ids give a subscription that never fires.
    pub fn on_data(&self, id: &str, listener: impl Fn(&str) + Send + Sync + 'static) -> Subscription {
        match self.events(id) {
            Some(events) => events.on_data(listener),
            None => Subscription::inert(),
        }
    }

    /// Fires once when session `id` ends; replays immediately if it already
    /// has.
    pub fn on_exit(
        &self,
        id: &str,
        listener: impl FnOnce(&ExitReport) + Send + 'static,
    ) -> Subscription {
        match self.events(id) {
            Some(events) => events.on_exit(listener),
            None => Subscription::inert(),
        }
    }

    /// Sends one termination signal. The exit event, not this reply, is the
    /// authority on when the session actually ends.
    pub fn kill(&self, id: &str) -> ActionResult {
        let mut table = self.table.lock();
        let session = match table.sessions.get_mut(id) {
            Some(s) => s,
            None => return ActionResult::failed(format!("no terminal session with id {id}")),
        };
        if session.state != SessionState::Running || session.pid.is_some_and(spawn::has_exited) {
            return ActionResult::failed(format!("terminal session {id} has already exited"));
        }

        if let Err(e) = signal(session) {
            log::warn!("[Terminal] Failed to signal {id}: {e}");
            return ActionResult::failed(format!("failed to signal session {id}: {e}"));
        }
        session.kill_requested = true;
        log::info!("[Terminal] Kill requested for {id}");
        drop(table);

        if let Some(grace) = self.settings.kill_grace {
            self.escalate_after(id.to_string(), grace);
        }
        ActionResult::ok()
    }

    /// Send `data` to the session's stdin.
    pub fn write(&self, id: &str, data: &str) -> Result<()> {
        let mut table = self.table.lock();
        let session = table.running_mut(id)?;
        let io = session
            .io
            .as_mut()
            .ok_or_else(|| BridgeError::InvalidArgument(format!("terminal session {id} is closed")))?;
        io.writer.write_all(data.as_bytes())?;
        io.writer.flush()?;
        Ok(())
    }

    pub fn resize(&self, id: &str, cols: u16, rows: u16) -> Result<()> {
        if cols == 0 || rows == 0 {
            return Err(BridgeError::InvalidArgument(
                "cols and rows must be non-zero".into(),
            ));
        }
        let mut table = self.table.lock();
        let session = table.running_mut(id)?;
        let io = session
            .io
            .as_mut()
            .ok_or_else(|| BridgeError::InvalidArgument(format!("terminal session {id} is closed")))?;
        io.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| BridgeError::InvalidArgument(format!("resize failed: {e}")))
    }

    pub fn session(&self, id: &str) -> Option<SessionInfo> {
        self.table.lock().sessions.get(id).map(|s| info(id, s))
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        let table = self.table.lock();
        let mut all: Vec<SessionInfo> = table.sessions.iter().map(|(id, s)| info(id, s)).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Process-registry projection of the sessions still running.
    pub fn running_entries(&self) -> Vec<ProcessEntry> {
        let table = self.table.lock();
        let mut entries: Vec<ProcessEntry> = table
            .sessions
            .iter()
            .filter(|(_, s)| s.state == SessionState::Running)
            .filter_map(|(id, s)| {
                s.pid.map(|pid| ProcessEntry {
                    id: id.clone(),
                    pid,
                    cwd: s.cwd.clone(),
                    command: s.command.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.table
            .lock()
            .sessions
            .get(id)
            .is_some_and(|s| s.state == SessionState::Running)
    }

    /// Kill every running session. Used at host shutdown.
    pub fn shutdown(&self) {
        let ids: Vec<String> = {
            let table = self.table.lock();
            table
                .sessions
                .iter()
                .filter(|(_, s)| s.state == SessionState::Running)
                .map(|(id, _)| id.clone())
                .collect()
        };
        if !ids.is_empty() {
            log::info!("[Terminal] Shutting down {} session(s)", ids.len());
        }
        for id in ids {
            let _ = self.kill(&id);
        }
    }

    fn events(&self, id: &str) -> Option<Arc<SessionEvents>> {
        self.table.lock().sessions.get(id).map(|s| s.events.clone())
    }

    fn escalate_after(&self, id: String, grace: Duration) {
        let table = self.table.clone();
        thread::spawn(move || {
            thread::sleep(grace);
            let mut table = table.lock();
            if let Some(session) = table.sessions.get_mut(&id) {
                if session.state == SessionState::Running {
                    log::warn!("[Terminal] {id} ignored termination, forcing kill");
                    let _ = force(session);
                }
            }
        });
    }
}

impl Drop for TerminalManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn info(id: &str, s: &Session) -> SessionInfo {
    SessionInfo {
        id: id.to_string(),
        command: s.command.clone(),
        cwd: s.cwd.clone(),
        state: s.state,
        exit_code: s.exit_code,
    }
}

#[cfg(unix)]
fn signal(session: &mut Session) -> std::io::Result<()> {
    match session.pid {
        Some(pid) => spawn::terminate(pid),
        None => kill_via_handle(session),
    }
}

#[cfg(not(unix))]
fn signal(session: &mut Session) -> std::io::Result<()> {
    kill_via_handle(session)
}

#[cfg(unix)]
fn force(session: &mut Session) -> std::io::Result<()> {
    match session.pid {
        Some(pid) => spawn::force_kill(pid),
        None => kill_via_handle(session),
    }
}

#[cfg(not(unix))]
fn force(session: &mut Session) -> std::io::Result<()> {
    kill_via_handle(session)
}

fn kill_via_handle(session: &mut Session) -> std::io::Result<()> {
    match session.io.as_mut() {
        Some(io) => io.killer.kill(),
        None => Ok(()),
    }
}

/// Reader/reaper loop for one session. Runs on its own thread.
fn pump(
    id: &str,
    mut reader: Box<dyn Read + Send>,
    mut child: Box<dyn Child + Send + Sync>,
    events: &SessionEvents,
    table: &Mutex<SessionTable>,
    history: usize,
) {
    let mut chunker = Utf8Chunker::default();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let text = chunker.push(&buf[..n]);
                if !text.is_empty() {
                    events.publish_data(&text);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            // Linux reports EIO once the slave side is gone.
            Err(_) => break,
        }
    }
    let tail = chunker.finish();
    if !tail.is_empty() {
        events.publish_data(&tail);
    }

    let signal = child.process_id().and_then(spawn::wait_exited_unreaped);

    let report = {
        let mut table = table.lock();
        let kill_requested = table.sessions.get(id).is_some_and(|s| s.kill_requested);
        let (report, killed) = match child.wait() {
            Ok(status) => exit_report(&status, signal, kill_requested),
            Err(e) => (
                ExitReport {
                    code: -1,
                    error: Some(format!("failed to wait for process: {e}")),
                },
                kill_requested,
            ),
        };
        table.retire(id, &report, killed, history);
        report
    };

    log::info!("[Terminal] {} exited with code {}", id, report.code);
    events.publish_exit(report);
}

/// Signal deaths report code -1 with the signal name. A kill request only
/// labels the session killed if the process did not exit cleanly.
fn exit_report(
    status: &ExitStatus,
    signal: Option<String>,
    kill_requested: bool,
) -> (ExitReport, bool) {
    if let Some(signal) = signal {
        let error = if kill_requested {
            format!("terminated by kill request ({signal})")
        } else {
            format!("terminated by signal: {signal}")
        };
        return (
            ExitReport {
                code: -1,
                error: Some(error),
            },
            kill_requested,
        );
    }

    let code = status.exit_code() as i32;
    if status.success() {
        return (ExitReport { code, error: None }, false);
    }
    let error = if kill_requested {
        format!("terminated by kill request (exit code {code})")
    } else {
        format!("process exited with code {code}")
    };
    (
        ExitReport {
            code,
            error: Some(error),
        },
        kill_requested,
    )
}
