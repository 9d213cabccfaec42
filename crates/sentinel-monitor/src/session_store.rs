//! Durable wallet session
//!
//! The connected wallet lives under a single key of a small JSON file. Reads
//! never fail: an absent, unreadable or malformed file simply means no wallet
//! is connected.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use sentinel_core::{shorten, WalletIdentity};

use crate::config::SessionConfig;
use crate::error::{MonitorError, MonitorResult};

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    key: String,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            path: config.path.clone(),
            key: config.key.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored wallet, if any
    pub fn load(&self) -> Option<WalletIdentity> {
        let entries = match read_entries(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Session file unreadable");
                return None;
            }
        };

        let raw = entries.get(&self.key)?.as_str()?;
        match WalletIdentity::parse(raw) {
            Ok(wallet) => Some(wallet),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Ignoring stored wallet");
                None
            }
        }
    }

    /// Shortened display form of the stored wallet
    pub fn display(&self) -> String {
        shorten(self.load().as_ref())
    }

    /// Persist `wallet`, keeping any other keys in the file
    pub fn save(&self, wallet: &WalletIdentity) -> MonitorResult<()> {
        let mut entries = read_entries(&self.path).unwrap_or_default();
        entries.insert(self.key.clone(), Value::String(wallet.as_str().to_string()));
        self.write_entries(&entries)?;
        tracing::info!(wallet = %shorten(Some(wallet)), "Wallet session saved");
        Ok(())
    }

    /// Forget the stored wallet
    pub fn clear(&self) -> MonitorResult<()> {
        let mut entries = match read_entries(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(_) => Map::new(),
        };
        if entries.remove(&self.key).is_some() {
            self.write_entries(&entries)?;
            tracing::info!("Wallet session cleared");
        }
        Ok(())
    }

    fn write_entries(&self, entries: &Map<String, Value>) -> MonitorResult<()> {
        let parent = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(|e| session_error(parent, e))?;
                parent
            }
            None => Path::new("."),
        };

        let body = serde_json::to_vec_pretty(entries)
            .map_err(|e| MonitorError::Session(e.to_string()))?;

        // uniquely named sibling, synced, then renamed over the session file
        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| session_error(parent, e))?;
        tmp.write_all(&body).map_err(|e| session_error(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| session_error(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| session_error(&self.path, e.error))?;
        Ok(())
    }
}

fn read_entries(path: &Path) -> io::Result<Map<String, Value>> {
    let raw = fs::read(path)?;
    match serde_json::from_slice(&raw)? {
        Value::Object(entries) => Ok(entries),
        _ => Err(io::Error::new(io::ErrorKind::InvalidData, "session file is not a JSON object")),
    }
}

fn session_error(path: &Path, err: io::Error) -> MonitorError {
    MonitorError::Session(format!("{}: {}", path.display(), err))
}
