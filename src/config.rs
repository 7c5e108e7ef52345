//! Host configuration, loaded once at startup from TOML.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Env var pointing at an explicit config file.
pub const CONFIG_ENV: &str = "DESKBRIDGE_CONFIG";
/// Env var overriding the filesystem gateway root.
pub const ROOT_ENV: &str = "DESKBRIDGE_ROOT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Directory the filesystem gateway is scoped to. Also the project root
    /// reported by system info.
    pub root: PathBuf,
    /// Working directory for terminal sessions started without one.
    pub default_cwd: Option<PathBuf>,
    /// Interpreter used to run terminal commands, e.g. `["bash", "-lc"]`.
    /// The command string is appended as the final argument.
    pub shell: Option<Vec<String>>,
    pub terminal: TerminalConfig,
    pub websites: WebsitesConfig,
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub log_level: String,
    /// Install the log plugin in release builds too.
    pub log_in_release: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerminalConfig {
    pub cols: u16,
    pub rows: u16,
    /// Escalate to SIGKILL if the session is still alive this long after a
    /// kill request. `None` sends the termination signal once.
    pub kill_grace_ms: Option<u64>,
    /// Exited sessions whose exit record is retained for late `onExit`.
    pub exit_history: usize,
    /// Output bytes kept per session and replayed to each new `onData`
    /// subscriber before live chunks.
    pub backlog_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebsitesConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            default_cwd: None,
            shell: None,
            terminal: TerminalConfig::default(),
            websites: WebsitesConfig::default(),
            log_level: "info".to_string(),
            log_in_release: false,
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            cols: 120,
            rows: 32,
            kill_grace_ms: None,
            exit_history: 256,
            backlog_bytes: 64 * 1024,
        }
    }
}

impl Default for WebsitesConfig {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 768.0,
        }
    }
}

impl BridgeConfig {
    /// Config rooted at `root` with everything else defaulted.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Parse a config file. A missing file is an error here; use
    /// [`BridgeConfig::load`] for the fall-back-to-defaults behavior.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: BridgeConfig = toml::from_str(&content)
            .map_err(|e| BridgeError::Config(format!("failed to parse {}: {e}", path.display())))?;
        log::info!("[Config] Loaded {}", path.display());
        Ok(config)
    }

    /// Load from `$DESKBRIDGE_CONFIG`, else the platform config dir, else
    /// defaults. `$DESKBRIDGE_ROOT` wins over the file's `root`.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(p) => Some(PathBuf::from(p)),
            None => default_config_path().filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(p) => Self::load_from_path(&p)?,
            None => {
                log::info!("[Config] No config file, using defaults");
                Self::default()
            }
        };

        if let Some(root) = std::env::var_os(ROOT_ENV) {
            config.root = PathBuf::from(root);
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.terminal.cols == 0 || self.terminal.rows == 0 {
            return Err(BridgeError::Config(
                "terminal cols and rows must be non-zero".into(),
            ));
        }
        if self.terminal.exit_history == 0 {
            return Err(BridgeError::Config(
                "terminal exit_history must be at least 1".into(),
            ));
        }
        if !self.root.is_dir() {
            return Err(BridgeError::Config(format!(
                "root {} does not exist or is not a directory",
                self.root.display()
            )));
        }
        if let Some(shell) = &self.shell {
            if shell.first().map_or(true, |s| s.trim().is_empty()) {
                return Err(BridgeError::Config("shell must name a program".into()));
            }
        }
        Ok(())
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

/// `~/.config/deskbridge/config.toml` on Linux, the Application Support
/// equivalent on macOS.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("deskbridge").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
root = "/srv/project"

[terminal]
kill_grace_ms = 500
"#,
        )
        .unwrap();

        let config = BridgeConfig::load_from_path(&path).unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/project"));
        assert_eq!(config.terminal.kill_grace_ms, Some(500));
        assert_eq!(config.terminal.cols, 120);
        assert_eq!(config.terminal.exit_history, 256);
        assert_eq!(config.terminal.backlog_bytes, 64 * 1024);
        assert_eq!(config.websites.width, 1024.0);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "root = [").unwrap();

        let err = BridgeConfig::load_from_path(&path).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn validate_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::with_root(dir.path().join("nope"));
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn validate_rejects_zero_pty_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BridgeConfig::with_root(dir.path());
        config.terminal.rows = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_exit_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BridgeConfig::with_root(dir.path());
        config.terminal.exit_history = 0;
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn validate_rejects_empty_shell() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BridgeConfig::with_root(dir.path());
        config.shell = Some(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn log_level_falls_back_to_info() {
        let mut config = BridgeConfig::default();
        config.log_level = "debug".into();
        assert_eq!(config.log_level_filter(), log::LevelFilter::Debug);
        config.log_level = "loud".into();
        assert_eq!(config.log_level_filter(), log::LevelFilter::Info);
    }
}
