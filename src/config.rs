//! Engine and session configuration
//!
//! Both structs are serde-derived so they can live in a JSON file next to
//! the application. Timeouts here are pass-through settings for the engine;
//! the binding objects themselves never wait on their own.

use crate::error::Result;
use crate::types::DateFormat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Durability level for table writes
///
/// - Synchronous: every write is fsync'd before the call returns
/// - NoSync: writes go to the OS buffer only (tests, bulk loads)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DurabilityLevel {
    /// fsync after every table file rewrite
    #[default]
    Synchronous,

    /// Leave flushing to the OS
    ///
    /// A crash can lose the most recent writes.
    NoSync,
}

impl DurabilityLevel {
    /// Whether a write must be fsync'd before returning
    pub fn requires_immediate_sync(&self) -> bool {
        matches!(self, Self::Synchronous)
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Synchronous => "synchronous (fsync per write)",
            Self::NoSync => "no sync (OS buffered)",
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Endpoint name clients pass to `Session::logon`
    pub name: String,

    /// Directory used for relative table paths when no session prefix is set
    pub data_dir: PathBuf,

    /// user name -> password; an empty map accepts any credentials
    #[serde(default)]
    pub users: HashMap<String, String>,

    /// Durability for table writes
    #[serde(default)]
    pub durability: DurabilityLevel,

    /// Verify the CRC of table files on open
    #[serde(default = "default_true")]
    pub verify_checksums: bool,
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "FAIRCOMS".to_string(),
            data_dir: PathBuf::from("."),
            users: HashMap::new(),
            durability: DurabilityLevel::default(),
            verify_checksums: true,
        }
    }
}

impl EngineConfig {
    /// Configuration rooted at `data_dir` with default name and durability
    pub fn with_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Fast configuration for tests (no fsync)
    pub fn for_testing<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            durability: DurabilityLevel::NoSync,
            ..Self::with_data_dir(data_dir)
        }
    }

    /// Register a user allowed to log on
    pub fn with_user(mut self, user: &str, password: &str) -> Self {
        self.users.insert(user.to_string(), password.to_string());
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }
}

/// Session flavour
///
/// `Ctdb` sessions use the full database dictionary; `Ctree` sessions are
/// logon-only. The local engine treats both the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SessionMode {
    Ctdb,
    #[default]
    Ctree,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub mode: SessionMode,

    /// Date layout used by string conversions on DATE fields
    #[serde(default)]
    pub default_date_format: DateFormat,

    /// How long `LockMode::ReadBlock`/`WriteBlock` wait before giving up
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::default(),
            default_date_format: DateFormat::default(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl SessionConfig {
    pub fn new(mode: SessionMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
