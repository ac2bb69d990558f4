//! Engine boundary
//!
//! The binding objects never touch storage directly. Every call goes
//! through [`Engine`], which a vendor SDK adapter or the bundled
//! [`LocalEngine`] implements. Handles are opaque tokens minted by the
//! engine; they carry no state on the client side.

mod local;
mod lock_manager;
mod ordering;
mod table_file;

pub use local::LocalEngine;
pub use lock_manager::{LockKind, LockManager, LockManagerStats, LockResource};

use crate::error::Result;
use crate::types::{FieldValue, RowId, TableSchema};
use std::path::PathBuf;
use std::time::Duration;

/// Connection token returned by [`Engine::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(pub u64);

/// Open-table token returned by [`Engine::create_table`] / [`Engine::open_table`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableHandle(pub u64);

/// One row as read from storage
#[derive(Debug, Clone, PartialEq)]
pub struct RowImage {
    pub row_id: RowId,
    pub values: Vec<FieldValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            user: user.to_string(),
            password: password.to_string(),
        }
    }
}

/// Fully resolved storage location of a table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableLocation {
    pub dir: PathBuf,
    pub name: String,
}

impl TableLocation {
    pub fn new<P: Into<PathBuf>>(dir: P, name: &str) -> Self {
        Self {
            dir: dir.into(),
            name: name.to_string(),
        }
    }

    /// `<dir>/<name>.dat`
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(format!("{}.dat", self.name))
    }
}

/// Key comparison used by [`CursorOp::Find`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindMode {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Cursor movement requested from the engine
#[derive(Debug, Clone, PartialEq)]
pub enum CursorOp {
    First,
    Last,
    /// Row after the given one in the active order
    Next(RowId),
    /// Row before the given one in the active order
    Prev(RowId),
    /// Search by key values of the active index
    Find(FindMode, Vec<FieldValue>),
}

/// Session and row lock modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Release
    Free,
    Read,
    /// Read, waiting for conflicting holders
    ReadBlock,
    Write,
    /// Write, waiting for conflicting holders
    WriteBlock,
}

impl LockMode {
    /// Lock strength, `None` for `Free`
    pub fn kind(self) -> Option<LockKind> {
        match self {
            LockMode::Free => None,
            LockMode::Read | LockMode::ReadBlock => Some(LockKind::Shared),
            LockMode::Write | LockMode::WriteBlock => Some(LockKind::Exclusive),
        }
    }

    pub fn is_blocking(self) -> bool {
        matches!(self, LockMode::ReadBlock | LockMode::WriteBlock)
    }

    pub fn name(self) -> &'static str {
        match self {
            LockMode::Free => "FREE",
            LockMode::Read => "READ",
            LockMode::ReadBlock => "READ_BLOCK",
            LockMode::Write => "WRITE",
            LockMode::WriteBlock => "WRITE_BLOCK",
        }
    }
}

/// Table open modes
///
/// `Exclusive`, `ReadOnly` and `Corrupt` change engine behavior; the other
/// modes are accepted and recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OpenMode {
    #[default]
    Normal,
    DataOnly,
    /// No other handle may have the file open
    Exclusive,
    Permanent,
    /// Skip checksum verification
    Corrupt,
    CheckLock,
    CheckRead,
    /// Reject writes
    ReadOnly,
}

/// Table create modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CreateMode {
    #[default]
    Normal,
    /// Force synchronous writes for this table
    WriteThru,
    /// Replace an existing table file
    Overwrite,
}

/// Capabilities the binding layer needs from a storage engine
///
/// Implementations translate their native failures into
/// [`CtdbError`](crate::CtdbError) classes. Operations on unknown handles
/// fail with `NotOpen`.
pub trait Engine: Send + Sync {
    /// Endpoint name accepted by [`Engine::connect`]
    fn name(&self) -> &str;

    fn connect(&self, endpoint: &str, credentials: &Credentials) -> Result<ConnectionHandle>;

    /// Release everything the connection holds; unknown handles are ignored
    fn disconnect(&self, conn: ConnectionHandle) -> Result<()>;

    fn create_table(
        &self,
        conn: ConnectionHandle,
        location: &TableLocation,
        schema: &TableSchema,
        mode: CreateMode,
    ) -> Result<TableHandle>;

    fn open_table(
        &self,
        conn: ConnectionHandle,
        location: &TableLocation,
        mode: OpenMode,
    ) -> Result<TableHandle>;

    /// Idempotent
    fn close_table(&self, table: TableHandle) -> Result<()>;

    fn read_schema(&self, table: TableHandle) -> Result<TableSchema>;

    /// Move a cursor over `index` (physical order when `None`).
    /// `Ok(None)` signals end of set.
    fn position_cursor(
        &self,
        table: TableHandle,
        index: Option<usize>,
        op: &CursorOp,
    ) -> Result<Option<RowImage>>;

    fn read_row(&self, table: TableHandle, row_id: RowId) -> Result<Option<RowImage>>;

    /// Insert when `row_id` is `None`, update otherwise
    fn write_row(
        &self,
        table: TableHandle,
        row_id: Option<RowId>,
        values: &[FieldValue],
    ) -> Result<RowId>;

    fn delete_row(&self, table: TableHandle, row_id: RowId) -> Result<()>;

    /// Session-scoped lock; blocking modes wait up to `wait`
    fn lock(&self, conn: ConnectionHandle, mode: LockMode, wait: Duration) -> Result<()>;

    /// Release every lock held by the connection
    fn unlock(&self, conn: ConnectionHandle) -> Result<()>;

    fn is_locked(&self, conn: ConnectionHandle) -> bool;

    fn lock_row(
        &self,
        table: TableHandle,
        row_id: RowId,
        mode: LockMode,
        wait: Duration,
    ) -> Result<()>;
}
