//! PTY process creation and the low-level signal/wait helpers.

use crate::error::{BridgeError, Result};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::path::Path;

/// Everything the manager keeps from a freshly spawned session.
pub(crate) struct Spawned {
    pub master: Box<dyn MasterPty + Send>,
    pub writer: Box<dyn Write + Send>,
    pub reader: Box<dyn Read + Send>,
    pub child: Box<dyn Child + Send + Sync>,
}

pub(crate) fn default_shell() -> Vec<String> {
    if cfg!(windows) {
        vec!["cmd".to_string(), "/C".to_string()]
    } else {
        vec!["sh".to_string(), "-c".to_string()]
    }
}

pub(crate) fn spawn_pty(
    shell: &[String],
    command: &str,
    cwd: &Path,
    cols: u16,
    rows: u16,
) -> Result<Spawned> {
    let (program, args) = shell
        .split_first()
        .ok_or_else(|| BridgeError::SpawnError("no shell configured".into()))?;

    let pair = native_pty_system()
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| BridgeError::SpawnError(format!("failed to open PTY: {e}")))?;

    let mut cmd = CommandBuilder::new(program);
    cmd.args(args);
    cmd.arg(command);
    cmd.cwd(cwd);
    apply_environment(&mut cmd);

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| BridgeError::SpawnError(format!("{program}: {e}")))?;
    // The master only sees EOF once every slave handle is closed.
    drop(pair.slave);

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| BridgeError::SpawnError(format!("failed to get PTY reader: {e}")))?;
    let writer = pair
        .master
        .take_writer()
        .map_err(|e| BridgeError::SpawnError(format!("failed to get PTY writer: {e}")))?;

    Ok(Spawned {
        master: pair.master,
        writer,
        reader,
        child,
    })
}

/// Terminal-friendly environment. Bundled desktop apps start with a
/// minimal PATH, so the usual user and package-manager bins are prepended.
fn apply_environment(cmd: &mut CommandBuilder) {
    cmd.env("TERM", "xterm-256color");
    cmd.env("COLORTERM", "truecolor");
    if cfg!(unix) {
        cmd.env("PATH", extended_path());
    }
}

pub(crate) fn extended_path() -> String {
    let home = std::env::var("HOME").unwrap_or_default();
    let current = std::env::var("PATH").unwrap_or_default();

    let mut paths = vec![
        "/opt/homebrew/bin".to_string(),
        "/opt/homebrew/sbin".to_string(),
        "/usr/local/bin".to_string(),
        "/usr/local/sbin".to_string(),
    ];
    if !home.is_empty() {
        paths.push(format!("{home}/.local/bin"));
        paths.push(format!("{home}/.cargo/bin"));
    }
    paths.extend(current.split(':').filter(|p| !p.is_empty()).map(String::from));
    for dir in ["/usr/bin", "/bin", "/usr/sbin", "/sbin"] {
        paths.push(dir.to_string());
    }

    let mut seen = std::collections::HashSet::new();
    paths.retain(|p| seen.insert(p.clone()));
    paths.join(":")
}

/// Polite termination of the whole process group (shell plus children).
#[cfg(unix)]
pub(crate) fn terminate(pid: u32) -> std::io::Result<()> {
    signal_group(pid, libc::SIGTERM)
}

#[cfg(unix)]
pub(crate) fn force_kill(pid: u32) -> std::io::Result<()> {
    signal_group(pid, libc::SIGKILL)
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) -> std::io::Result<()> {
    let pid = pid as libc::pid_t;
    // The PTY child is a session leader, so its pid is also its group id.
    if unsafe { libc::kill(-pid, signal) } == 0 {
        return Ok(());
    }
    if unsafe { libc::kill(pid, signal) } == 0 {
        return Ok(());
    }
    Err(std::io::Error::last_os_error())
}

/// Block until `pid` has exited without reaping it. While the zombie exists
/// the pid cannot be recycled, so a racing kill can never hit a stranger.
/// Returns the name of the signal that ended the process, if one did.
#[cfg(any(target_os = "linux", target_os = "macos"))]
pub(crate) fn wait_exited_unreaped(pid: u32) -> Option<String> {
    loop {
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            if info.si_code == libc::CLD_KILLED || info.si_code == libc::CLD_DUMPED {
                return Some(signal_name(unsafe { info.si_status() }));
            }
            return None;
        }
        if std::io::Error::last_os_error().kind() != std::io::ErrorKind::Interrupted {
            return None;
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub(crate) fn wait_exited_unreaped(_pid: u32) -> Option<String> {
    None
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn signal_name(signal: libc::c_int) -> String {
    let name = unsafe { libc::strsignal(signal) };
    if name.is_null() {
        return format!("signal {signal}");
    }
    unsafe { std::ffi::CStr::from_ptr(name) }
        .to_string_lossy()
        .into_owned()
}

/// True once `pid` has exited but before the pump thread reaps it.
#[cfg(any(target_os = "linux", target_os = "macos"))]
pub(crate) fn has_exited(pid: u32) -> bool {
    let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
    let rc = unsafe {
        libc::waitid(
            libc::P_PID,
            pid as libc::id_t,
            &mut info,
            libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
        )
    };
    // WNOHANG leaves the zeroed siginfo untouched while the child still runs.
    rc == 0 && info.si_signo == libc::SIGCHLD
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub(crate) fn has_exited(_pid: u32) -> bool {
    false
}

/// Splits a byte stream into valid UTF-8 chunks, holding back a trailing
/// partial character until the rest of it arrives.
#[derive(Debug, Default)]
pub(crate) struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let cut = incomplete_tail_start(&self.pending);
        let out = String::from_utf8_lossy(&self.pending[..cut]).into_owned();
        self.pending.drain(..cut);
        out
    }

    pub fn finish(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}

fn incomplete_tail_start(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let b = bytes[len - back];
        if b & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let need = match b {
            0xF0..=0xFF => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if need > back { len - back } else { len };
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunker_holds_split_character() {
        let mut chunker = Utf8Chunker::default();
        let bytes = "héllo".as_bytes();
        // 'é' is two bytes at 1..3; split inside it.
        assert_eq!(chunker.push(&bytes[..2]), "h");
        assert_eq!(chunker.push(&bytes[2..]), "éllo");
        assert_eq!(chunker.finish(), "");
    }

    #[test]
    fn chunker_passes_ascii_straight_through() {
        let mut chunker = Utf8Chunker::default();
        assert_eq!(chunker.push(b"hi\r\n"), "hi\r\n");
    }

    #[test]
    fn chunker_replaces_invalid_bytes() {
        let mut chunker = Utf8Chunker::default();
        assert_eq!(chunker.push(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn chunker_flushes_dangling_tail_lossily() {
        let mut chunker = Utf8Chunker::default();
        assert_eq!(chunker.push(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(chunker.finish(), "\u{FFFD}");
    }

    #[test]
    fn extended_path_has_no_duplicates() {
        let path = extended_path();
        let parts: Vec<&str> = path.split(':').collect();
        let unique: std::collections::HashSet<&&str> = parts.iter().collect();
        assert_eq!(parts.len(), unique.len());
        assert!(parts.contains(&"/usr/bin"));
    }

    #[test]
    fn spawn_with_missing_shell_fails() {
        let dir = tempfile::tempdir().unwrap();
        let shell = vec!["/definitely/not/a/shell".to_string(), "-c".to_string()];
        let result = spawn_pty(&shell, "true", dir.path(), 80, 24);
        assert!(matches!(result, Err(BridgeError::SpawnError(_))));
    }
}
