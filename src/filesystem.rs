//! Filesystem gateway scoped to one root directory.
//!
//! All path handling goes through [`FilesystemGateway::resolve`]; the public
//! operations never touch a path the resolver has not approved. Errors name
//! the path as the caller gave it, never the host-side absolute path.

use crate::error::{BridgeError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilesystemEntry {
    pub name: String,
    /// Path relative to the gateway root, `/`-separated.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryType,
}

#[derive(Debug, Clone)]
pub struct FilesystemGateway {
    root: PathBuf,
}

impl FilesystemGateway {
    pub fn new(root: &Path) -> Result<Self> {
        let root = root.canonicalize().map_err(|e| {
            BridgeError::Config(format!("cannot resolve root {}: {e}", root.display()))
        })?;
        if !root.is_dir() {
            return Err(BridgeError::Config(format!(
                "root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a caller path onto the host filesystem, or refuse.
    ///
    /// Relative paths are taken from the root. `..` and absolute paths are
    /// folded lexically first and rejected if they leave the root, before
    /// any OS call. Then the deepest existing ancestor is canonicalized so a
    /// symlink pointing outside is caught too.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf> {
        let requested_path = Path::new(requested);
        let joined = if requested_path.is_absolute() {
            requested_path.to_path_buf()
        } else {
            self.root.join(requested_path)
        };

        let mut normalized = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                    normalized.push(component)
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    normalized.pop();
                }
            }
        }

        if !normalized.starts_with(&self.root) {
            log::warn!("[Filesystem] Denied {requested}: outside root");
            return Err(BridgeError::AccessDenied(format!(
                "{requested} is outside the allowed root"
            )));
        }

        let mut existing = normalized.as_path();
        let mut missing = Vec::new();
        while std::fs::symlink_metadata(existing).is_err() {
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                _ => break,
            }
        }

        let mut resolved = existing.canonicalize().map_err(|_| {
            log::warn!("[Filesystem] Denied {requested}: unresolvable link");
            BridgeError::AccessDenied(format!("{requested} cannot be resolved safely"))
        })?;
        if !resolved.starts_with(&self.root) {
            log::warn!("[Filesystem] Denied {requested}: link escapes root");
            return Err(BridgeError::AccessDenied(format!(
                "{requested} resolves outside the allowed root"
            )));
        }
        for name in missing.into_iter().rev() {
            resolved.push(name);
        }
        Ok(resolved)
    }

    pub fn read_file(&self, path: &str) -> Result<String> {
        let resolved = self.resolve(path)?;
        let metadata = std::fs::metadata(&resolved).map_err(|_| BridgeError::NotFound(path.into()))?;
        if metadata.is_dir() {
            return Err(BridgeError::IsADirectory(path.into()));
        }
        Ok(std::fs::read_to_string(&resolved)?)
    }

    /// Create or replace `path`. Content goes to a temp file in the same
    /// directory which is then renamed over the target, so readers see
    /// either the old file or the new one.
    pub fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        if resolved.is_dir() {
            return Err(BridgeError::IsADirectory(path.into()));
        }
        let parent = resolved
            .parent()
            .ok_or_else(|| BridgeError::AccessDenied(format!("{path} has no parent directory")))?;
        match std::fs::metadata(parent) {
            Ok(m) if m.is_dir() => {}
            Ok(_) => return Err(BridgeError::NotADirectory(parent_of(path))),
            Err(_) => return Err(BridgeError::NotFound(parent_of(path))),
        }

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&resolved).map_err(|e| BridgeError::Io(e.error))?;
        log::debug!("[Filesystem] Wrote {} bytes to {path}", content.len());
        Ok(())
    }

    /// Non-recursive listing, sorted by name.
    pub fn list_dir(&self, path: Option<&str>) -> Result<Vec<FilesystemEntry>> {
        let path = path.unwrap_or(".");
        let resolved = self.resolve(path)?;
        let metadata = std::fs::metadata(&resolved).map_err(|_| BridgeError::NotFound(path.into()))?;
        if !metadata.is_dir() {
            return Err(BridgeError::NotADirectory(path.into()));
        }

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&resolved)? {
            let entry = entry?;
            let full = entry.path();
            let kind = match std::fs::metadata(&full) {
                Ok(m) if m.is_dir() => EntryType::Directory,
                _ => EntryType::File,
            };
            entries.push(FilesystemEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: self.relative(&full),
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn relative(&self, full: &Path) -> String {
        let rel = full.strip_prefix(&self.root).unwrap_or(full);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn parent_of(path: &str) -> PathBuf {
    Path::new(path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
