//! In-process engine backed by one file per table
//!
//! Every open handle of the same file shares one in-memory image, so
//! sessions on one `LocalEngine` see each other's writes immediately.
//! Writes rewrite the file before returning.

use super::lock_manager::{LockKind, LockManager, LockResource};
use super::ordering;
use super::table_file::{self, TableImage};
use super::{
    ConnectionHandle, CreateMode, Credentials, CursorOp, Engine, LockMode, OpenMode, RowImage,
    TableHandle, TableLocation,
};
use crate::config::EngineConfig;
use crate::error::{CtdbError, Result};
use crate::types::{FieldValue, RowId, TableSchema};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

struct Connection {
    user: String,
}

/// One table file, shared by every handle that has it open
struct SharedTable {
    file_id: u64,
    path: PathBuf,
    image: RwLock<TableImage>,
    sync: bool,
}

struct FileEntry {
    table: Arc<SharedTable>,
    handles: HashSet<u64>,
    exclusive: bool,
}

struct OpenTable {
    conn: ConnectionHandle,
    table: Arc<SharedTable>,
    mode: OpenMode,
}

pub struct LocalEngine {
    config: EngineConfig,
    next_id: AtomicU64,
    connections: DashMap<u64, Connection>,
    /// Resolved file path -> shared state
    files: Mutex<HashMap<PathBuf, FileEntry>>,
    handles: DashMap<u64, OpenTable>,
    locks: LockManager,
}

impl LocalEngine {
    pub fn new(config: EngineConfig) -> Self {
        info!(
            name = %config.name,
            data_dir = %config.data_dir.display(),
            durability = config.durability.description(),
            "local engine started"
        );
        Self {
            config,
            next_id: AtomicU64::new(1),
            connections: DashMap::new(),
            files: Mutex::new(HashMap::new()),
            handles: DashMap::new(),
            locks: LockManager::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of open table handles across all connections
    pub fn open_table_count(&self) -> usize {
        self.handles.len()
    }

    /// Relative locations resolve under `data_dir`
    fn raw_path(&self, location: &TableLocation) -> PathBuf {
        self.config.data_dir.join(location.file_path())
    }

    /// Key into `files`: the path with its directory canonicalized, so
    /// `a/../a/t.dat` and `a/t.dat` share one image
    fn resolve(&self, location: &TableLocation) -> Result<PathBuf> {
        let path = self.raw_path(location);
        match (path.parent(), path.file_name()) {
            (Some(dir), Some(file)) if dir.is_dir() => Ok(dir.canonicalize()?.join(file)),
            _ => Ok(path),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn check_connection(&self, conn: ConnectionHandle) -> Result<()> {
        if self.connections.contains_key(&conn.0) {
            Ok(())
        } else {
            Err(CtdbError::NotOpen("session is not active".to_string()))
        }
    }

    /// Shared state and open mode behind a handle
    fn table(&self, table: TableHandle) -> Result<(ConnectionHandle, Arc<SharedTable>, OpenMode)> {
        self.handles
            .get(&table.0)
            .map(|open| (open.conn, open.table.clone(), open.mode))
            .ok_or_else(|| CtdbError::NotOpen(format!("table handle {} is not open", table.0)))
    }

    fn register_handle(
        &self,
        files: &mut HashMap<PathBuf, FileEntry>,
        conn: ConnectionHandle,
        path: PathBuf,
        table: Arc<SharedTable>,
        mode: OpenMode,
    ) -> TableHandle {
        let id = self.allocate_id();
        let entry = files.entry(path).or_insert_with(|| FileEntry {
            table: table.clone(),
            handles: HashSet::new(),
            exclusive: false,
        });
        entry.handles.insert(id);
        entry.exclusive = mode == OpenMode::Exclusive;
        self.handles.insert(id, OpenTable { conn, table, mode });
        TableHandle(id)
    }

    /// Fail when another connection's session lock excludes writers
    fn check_session_lock(&self, conn: ConnectionHandle) -> Result<()> {
        match self
            .locks
            .conflicting_holder(conn.0, LockResource::Session, LockKind::Exclusive)
        {
            Some((holder, kind)) => Err(CtdbError::LockConflict(format!(
                "writes blocked: connection {} holds a {:?} session lock",
                holder, kind
            ))),
            None => Ok(()),
        }
    }

    fn check_row_lock(&self, conn: ConnectionHandle, file_id: u64, row_id: RowId) -> Result<()> {
        let resource = LockResource::Row {
            file: file_id,
            row: row_id,
        };
        match self.locks.conflicting_holder(conn.0, resource, LockKind::Exclusive) {
            Some((holder, kind)) => Err(CtdbError::LockConflict(format!(
                "row {} is locked {:?} by connection {}",
                row_id, kind, holder
            ))),
            None => Ok(()),
        }
    }

    fn check_row_values(schema: &TableSchema, values: &[FieldValue]) -> Result<()> {
        if values.len() != schema.field_count() {
            return Err(CtdbError::SchemaMismatch(format!(
                "row has {} values, table has {} fields",
                values.len(),
                schema.field_count()
            )));
        }
        for (field, value) in schema.fields.iter().zip(values) {
            if value.is_null() && !field.properties.allow_null() {
                return Err(CtdbError::TypeMismatch(format!(
                    "field '{}' does not allow null",
                    field.name
                )));
            }
            field.field_type.check_value(field.length, value)?;
        }
        Ok(())
    }

    fn row_image(image: &TableImage, row_id: RowId) -> Option<RowImage> {
        image.rows.get(&row_id).map(|values| RowImage {
            row_id,
            values: values.clone(),
        })
    }
}

impl Engine for LocalEngine {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn connect(&self, endpoint: &str, credentials: &Credentials) -> Result<ConnectionHandle> {
        if endpoint != self.config.name {
            return Err(CtdbError::Connection(format!(
                "unknown engine '{}' (this engine is '{}')",
                endpoint, self.config.name
            )));
        }
        if !self.config.users.is_empty()
            && self.config.users.get(&credentials.user) != Some(&credentials.password)
        {
            return Err(CtdbError::Connection(format!(
                "authentication failed for user '{}'",
                credentials.user
            )));
        }

        let id = self.allocate_id();
        self.connections.insert(
            id,
            Connection {
                user: credentials.user.clone(),
            },
        );
        info!(conn = id, user = %credentials.user, "connected");
        Ok(ConnectionHandle(id))
    }

    fn disconnect(&self, conn: ConnectionHandle) -> Result<()> {
        let Some((_, connection)) = self.connections.remove(&conn.0) else {
            return Ok(());
        };

        let owned: Vec<u64> = self
            .handles
            .iter()
            .filter(|h| h.conn == conn)
            .map(|h| *h.key())
            .collect();
        for id in owned {
            self.close_table(TableHandle(id))?;
        }

        self.locks.release_all(conn.0);
        info!(conn = conn.0, user = %connection.user, "disconnected");
        Ok(())
    }

    fn create_table(
        &self,
        conn: ConnectionHandle,
        location: &TableLocation,
        schema: &TableSchema,
        mode: CreateMode,
    ) -> Result<TableHandle> {
        self.check_connection(conn)?;

        let mut schema = schema.clone();
        schema.rebuild_field_map();
        schema.validate()?;

        if let Some(dir) = self.raw_path(location).parent() {
            std::fs::create_dir_all(dir)?;
        }
        let path = self.resolve(location)?;
        let mut files = self.files.lock();
        if files.contains_key(&path) {
            return Err(CtdbError::LockConflict(format!(
                "table '{}' is open and cannot be recreated",
                location.name
            )));
        }
        if path.exists() && mode != CreateMode::Overwrite {
            return Err(CtdbError::AlreadyExists(format!(
                "table '{}' already exists at {}",
                location.name,
                path.display()
            )));
        }

        let sync = self.config.durability.requires_immediate_sync() || mode == CreateMode::WriteThru;
        let image = TableImage::new(schema);
        table_file::write_file(&path, &image, sync)?;

        let table = Arc::new(SharedTable {
            file_id: self.allocate_id(),
            path: path.clone(),
            image: RwLock::new(image),
            sync,
        });
        info!(conn = conn.0, path = %path.display(), ?mode, "table created");
        Ok(self.register_handle(&mut files, conn, path, table, OpenMode::Normal))
    }

    fn open_table(
        &self,
        conn: ConnectionHandle,
        location: &TableLocation,
        mode: OpenMode,
    ) -> Result<TableHandle> {
        self.check_connection(conn)?;

        let path = self.resolve(location)?;
        let mut files = self.files.lock();

        let table = match files.get(&path) {
            Some(entry) => {
                if entry.exclusive {
                    return Err(CtdbError::LockConflict(format!(
                        "table '{}' is opened exclusively",
                        location.name
                    )));
                }
                if mode == OpenMode::Exclusive && !entry.handles.is_empty() {
                    return Err(CtdbError::LockConflict(format!(
                        "table '{}' is already open, exclusive open denied",
                        location.name
                    )));
                }
                entry.table.clone()
            }
            None => {
                if !path.exists() {
                    return Err(CtdbError::NotFound(format!(
                        "table '{}' not found at {}",
                        location.name,
                        path.display()
                    )));
                }
                let verify = self.config.verify_checksums && mode != OpenMode::Corrupt;
                let image = table_file::read_file(&path, verify)?;
                Arc::new(SharedTable {
                    file_id: self.allocate_id(),
                    path: path.clone(),
                    image: RwLock::new(image),
                    sync: self.config.durability.requires_immediate_sync(),
                })
            }
        };

        debug!(conn = conn.0, path = %path.display(), ?mode, "table opened");
        Ok(self.register_handle(&mut files, conn, path, table, mode))
    }

    fn close_table(&self, table: TableHandle) -> Result<()> {
        let Some((_, open)) = self.handles.remove(&table.0) else {
            return Ok(());
        };

        let mut files = self.files.lock();
        if let Some(entry) = files.get_mut(&open.table.path) {
            entry.handles.remove(&table.0);
            if entry.handles.is_empty() {
                files.remove(&open.table.path);
            } else if open.mode == OpenMode::Exclusive {
                entry.exclusive = false;
            }
        }

        let still_open = self
            .handles
            .iter()
            .any(|h| h.conn == open.conn && h.table.file_id == open.table.file_id);
        if !still_open {
            self.locks.release_file_rows(open.conn.0, open.table.file_id);
        }

        debug!(handle = table.0, path = %open.table.path.display(), "table closed");
        Ok(())
    }

    fn read_schema(&self, table: TableHandle) -> Result<TableSchema> {
        let (_, shared, _) = self.table(table)?;
        let schema = shared.image.read().schema.clone();
        Ok(schema)
    }

    fn position_cursor(
        &self,
        table: TableHandle,
        index: Option<usize>,
        op: &CursorOp,
    ) -> Result<Option<RowImage>> {
        let (_, shared, _) = self.table(table)?;
        let image = shared.image.read();
        let row = ordering::position(&image, index, op)?;
        Ok(row.and_then(|id| Self::row_image(&image, id)))
    }

    fn read_row(&self, table: TableHandle, row_id: RowId) -> Result<Option<RowImage>> {
        let (_, shared, _) = self.table(table)?;
        let image = shared.image.read();
        Ok(Self::row_image(&image, row_id))
    }

    fn write_row(
        &self,
        table: TableHandle,
        row_id: Option<RowId>,
        values: &[FieldValue],
    ) -> Result<RowId> {
        let (conn, shared, mode) = self.table(table)?;
        if mode == OpenMode::ReadOnly {
            return Err(CtdbError::ReadOnly(format!(
                "{} was opened read-only",
                shared.path.display()
            )));
        }
        self.check_session_lock(conn)?;

        let mut image = shared.image.write();
        Self::check_row_values(&image.schema, values)?;

        if let Some(id) = row_id {
            if !image.rows.contains_key(&id) {
                return Err(CtdbError::NotFound(format!("row {} no longer exists", id)));
            }
            self.check_row_lock(conn, shared.file_id, id)?;
        }

        if let Some((index, clash)) = ordering::find_duplicate(&image, values, row_id) {
            return Err(CtdbError::ConstraintViolation(format!(
                "duplicate key on unique index '{}' (row {})",
                index, clash
            )));
        }

        let previous_next = image.next_row_id;
        let id = match row_id {
            Some(id) => id,
            None => image.allocate_row_id(),
        };
        let previous = image.rows.insert(id, values.to_vec());

        if let Err(err) = table_file::write_file(&shared.path, &image, shared.sync) {
            match previous {
                Some(old) => image.rows.insert(id, old),
                None => image.rows.remove(&id),
            };
            image.next_row_id = previous_next;
            return Err(err);
        }

        debug!(handle = table.0, row = id, update = row_id.is_some(), "row written");
        Ok(id)
    }

    fn delete_row(&self, table: TableHandle, row_id: RowId) -> Result<()> {
        let (conn, shared, mode) = self.table(table)?;
        if mode == OpenMode::ReadOnly {
            return Err(CtdbError::ReadOnly(format!(
                "{} was opened read-only",
                shared.path.display()
            )));
        }
        self.check_session_lock(conn)?;
        self.check_row_lock(conn, shared.file_id, row_id)?;

        let mut image = shared.image.write();
        let Some(old) = image.rows.remove(&row_id) else {
            return Err(CtdbError::NotFound(format!("row {} no longer exists", row_id)));
        };

        if let Err(err) = table_file::write_file(&shared.path, &image, shared.sync) {
            image.rows.insert(row_id, old);
            return Err(err);
        }

        debug!(handle = table.0, row = row_id, "row deleted");
        Ok(())
    }

    fn lock(&self, conn: ConnectionHandle, mode: LockMode, wait: Duration) -> Result<()> {
        self.check_connection(conn)?;

        let Some(kind) = mode.kind() else {
            return self.unlock(conn);
        };

        let result = if mode.is_blocking() {
            self.locks
                .acquire_blocking(conn.0, LockResource::Session, kind, wait)
        } else {
            self.locks.try_acquire(conn.0, LockResource::Session, kind)
        };

        match &result {
            Ok(()) => debug!(conn = conn.0, mode = mode.name(), "session lock acquired"),
            Err(err) => warn!(conn = conn.0, mode = mode.name(), %err, "session lock denied"),
        }
        result
    }

    fn unlock(&self, conn: ConnectionHandle) -> Result<()> {
        self.locks.release_all(conn.0);
        Ok(())
    }

    fn is_locked(&self, conn: ConnectionHandle) -> bool {
        self.locks.holds(conn.0, LockResource::Session).is_some()
    }

    fn lock_row(
        &self,
        table: TableHandle,
        row_id: RowId,
        mode: LockMode,
        wait: Duration,
    ) -> Result<()> {
        let (conn, shared, _) = self.table(table)?;
        let resource = LockResource::Row {
            file: shared.file_id,
            row: row_id,
        };

        let Some(kind) = mode.kind() else {
            self.locks.release(conn.0, resource);
            return Ok(());
        };

        if !shared.image.read().rows.contains_key(&row_id) {
            return Err(CtdbError::NotFound(format!("row {} no longer exists", row_id)));
        }

        if mode.is_blocking() {
            self.locks.acquire_blocking(conn.0, resource, kind, wait)
        } else {
            self.locks.try_acquire(conn.0, resource, kind)
        }
    }
}

impl Drop for LocalEngine {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            warn!(open = self.handles.len(), "local engine dropped with open tables");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldDef, FieldType, IndexDef, IndexKind, SegmentMode};

    fn schema() -> TableSchema {
        TableSchema::new(
            vec![
                FieldDef::new("id", FieldType::UInteger, 4, 0),
                FieldDef::new("name", FieldType::VarChar, 16, 1),
            ],
            vec![IndexDef::new("by_id", IndexKind::Fixed).with_segment("id", SegmentMode::ASCENDING)],
        )
    }

    fn row(id: u64, name: &str) -> Vec<FieldValue> {
        vec![FieldValue::Unsigned(id), FieldValue::Text(name.into())]
    }

    fn setup() -> (tempfile::TempDir, LocalEngine, ConnectionHandle, TableLocation) {
        let dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::new(EngineConfig::for_testing(dir.path()));
        let conn = engine.connect("FAIRCOMS", &Credentials::default()).unwrap();
        let location = TableLocation::new(dir.path(), "people");
        (dir, engine, conn, location)
    }

    #[test]
    fn test_connect_checks_endpoint_and_users() {
        let dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::new(EngineConfig::for_testing(dir.path()).with_user("admin", "pw"));

        assert!(matches!(
            engine.connect("OTHER", &Credentials::new("admin", "pw")),
            Err(CtdbError::Connection(_))
        ));
        assert!(matches!(
            engine.connect("FAIRCOMS", &Credentials::new("admin", "wrong")),
            Err(CtdbError::Connection(_))
        ));
        let conn = engine.connect("FAIRCOMS", &Credentials::new("admin", "pw")).unwrap();
        assert_eq!(engine.connection_count(), 1);

        engine.disconnect(conn).unwrap();
        engine.disconnect(conn).unwrap();
        assert_eq!(engine.connection_count(), 0);
    }

    #[test]
    fn test_create_write_reopen() {
        let (_dir, engine, conn, location) = setup();
        let table = engine
            .create_table(conn, &location, &schema(), CreateMode::Normal)
            .unwrap();
        engine.write_row(table, None, &row(2, "two")).unwrap();
        engine.write_row(table, None, &row(1, "one")).unwrap();
        engine.close_table(table).unwrap();
        engine.close_table(table).unwrap();
        assert_eq!(engine.open_table_count(), 0);

        let table = engine.open_table(conn, &location, OpenMode::Normal).unwrap();
        assert_eq!(engine.read_schema(table).unwrap().field_count(), 2);

        let first = engine
            .position_cursor(table, Some(0), &CursorOp::First)
            .unwrap()
            .unwrap();
        assert_eq!(first.values, row(1, "one"));
        let next = engine
            .position_cursor(table, Some(0), &CursorOp::Next(first.row_id))
            .unwrap()
            .unwrap();
        assert_eq!(next.values, row(2, "two"));
        assert!(engine
            .position_cursor(table, Some(0), &CursorOp::Next(next.row_id))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_create_existing_and_open_missing() {
        let (_dir, engine, conn, location) = setup();
        assert!(engine
            .open_table(conn, &location, OpenMode::Normal)
            .unwrap_err()
            .is_not_found());

        let table = engine
            .create_table(conn, &location, &schema(), CreateMode::Normal)
            .unwrap();
        engine.close_table(table).unwrap();

        assert!(matches!(
            engine.create_table(conn, &location, &schema(), CreateMode::Normal),
            Err(CtdbError::AlreadyExists(_))
        ));
        assert!(engine
            .create_table(conn, &location, &schema(), CreateMode::Overwrite)
            .is_ok());
    }

    #[test]
    fn test_unique_index_violation_leaves_rows() {
        let (_dir, engine, conn, location) = setup();
        let table = engine
            .create_table(conn, &location, &schema(), CreateMode::Normal)
            .unwrap();
        let id = engine.write_row(table, None, &row(1, "one")).unwrap();

        assert!(matches!(
            engine.write_row(table, None, &row(1, "again")),
            Err(CtdbError::ConstraintViolation(_))
        ));
        // updating a row onto its own key is fine
        engine.write_row(table, Some(id), &row(1, "uno")).unwrap();
        assert_eq!(engine.read_row(table, id).unwrap().unwrap().values, row(1, "uno"));
        assert!(engine.position_cursor(table, None, &CursorOp::Next(id)).unwrap().is_none());
    }

    #[test]
    fn test_write_validates_values() {
        let (_dir, engine, conn, location) = setup();
        let table = engine
            .create_table(conn, &location, &schema(), CreateMode::Normal)
            .unwrap();

        assert!(matches!(
            engine.write_row(table, None, &[FieldValue::Unsigned(1)]),
            Err(CtdbError::SchemaMismatch(_))
        ));
        assert!(matches!(
            engine.write_row(table, None, &row(u64::MAX, "x")),
            Err(CtdbError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_session_write_lock_blocks_other_writers() {
        let (_dir, engine, a, location) = setup();
        let b = engine.connect("FAIRCOMS", &Credentials::default()).unwrap();
        let ta = engine
            .create_table(a, &location, &schema(), CreateMode::Normal)
            .unwrap();
        let tb = engine.open_table(b, &location, OpenMode::Normal).unwrap();

        engine.lock(a, LockMode::Write, Duration::ZERO).unwrap();
        assert!(engine.is_locked(a));
        assert!(!engine.is_locked(b));
        assert!(matches!(
            engine.lock(b, LockMode::Write, Duration::ZERO),
            Err(CtdbError::LockConflict(_))
        ));
        assert!(matches!(
            engine.write_row(tb, None, &row(1, "b")),
            Err(CtdbError::LockConflict(_))
        ));
        engine.write_row(ta, None, &row(1, "a")).unwrap();

        // readers are not blocked
        assert!(engine.position_cursor(tb, None, &CursorOp::First).unwrap().is_some());

        engine.lock(a, LockMode::Free, Duration::ZERO).unwrap();
        assert!(!engine.is_locked(a));
        engine.write_row(tb, None, &row(2, "b")).unwrap();
    }

    #[test]
    fn test_row_locks() {
        let (_dir, engine, a, location) = setup();
        let b = engine.connect("FAIRCOMS", &Credentials::default()).unwrap();
        let ta = engine
            .create_table(a, &location, &schema(), CreateMode::Normal)
            .unwrap();
        let tb = engine.open_table(b, &location, OpenMode::Normal).unwrap();
        let id = engine.write_row(ta, None, &row(1, "a")).unwrap();

        engine.lock_row(ta, id, LockMode::Write, Duration::ZERO).unwrap();
        assert!(matches!(
            engine.write_row(tb, Some(id), &row(1, "b")),
            Err(CtdbError::LockConflict(_))
        ));
        assert!(engine.delete_row(tb, id).is_err());
        assert!(engine.lock_row(tb, id, LockMode::Read, Duration::ZERO).is_err());

        engine.close_table(ta).unwrap();
        engine.write_row(tb, Some(id), &row(1, "b")).unwrap();
        assert!(engine.lock_row(tb, 999, LockMode::Write, Duration::ZERO).unwrap_err().is_not_found());
    }

    #[test]
    fn test_exclusive_and_read_only_opens() {
        let (_dir, engine, conn, location) = setup();
        let table = engine
            .create_table(conn, &location, &schema(), CreateMode::Normal)
            .unwrap();

        assert!(matches!(
            engine.open_table(conn, &location, OpenMode::Exclusive),
            Err(CtdbError::LockConflict(_))
        ));
        engine.close_table(table).unwrap();

        let exclusive = engine.open_table(conn, &location, OpenMode::Exclusive).unwrap();
        assert!(engine.open_table(conn, &location, OpenMode::Normal).is_err());
        engine.close_table(exclusive).unwrap();

        let read_only = engine.open_table(conn, &location, OpenMode::ReadOnly).unwrap();
        assert!(matches!(
            engine.write_row(read_only, None, &row(1, "x")),
            Err(CtdbError::ReadOnly(_))
        ));
    }

    #[test]
    fn test_corrupt_file_detection() {
        let (_dir, engine, conn, location) = setup();
        let table = engine
            .create_table(conn, &location, &schema(), CreateMode::Normal)
            .unwrap();
        engine.write_row(table, None, &row(1, "one")).unwrap();
        engine.close_table(table).unwrap();

        let path = location.file_path();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[8] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            engine.open_table(conn, &location, OpenMode::Normal),
            Err(CtdbError::Corruption(_))
        ));
        let table = engine.open_table(conn, &location, OpenMode::Corrupt).unwrap();
        assert!(engine.read_row(table, 1).unwrap().is_some());
    }

    #[test]
    fn test_path_aliases_share_one_image() {
        let (dir, engine, a, _) = setup();
        let b = engine.connect("FAIRCOMS", &Credentials::default()).unwrap();
        let plain = TableLocation::new(dir.path().join("sub"), "people");
        let alias = TableLocation::new(dir.path().join("sub").join("..").join("sub"), "people");

        let ta = engine
            .create_table(a, &plain, &schema(), CreateMode::Normal)
            .unwrap();
        let tb = engine.open_table(b, &alias, OpenMode::Normal).unwrap();

        let id = engine.write_row(ta, None, &row(1, "shared")).unwrap();
        assert_eq!(engine.read_row(tb, id).unwrap().unwrap().values, row(1, "shared"));
        assert!(matches!(
            engine.create_table(b, &alias, &schema(), CreateMode::Overwrite),
            Err(CtdbError::LockConflict(_))
        ));

        engine.lock_row(ta, id, LockMode::Write, Duration::ZERO).unwrap();
        assert!(matches!(
            engine.write_row(tb, Some(id), &row(1, "lost")),
            Err(CtdbError::LockConflict(_))
        ));
    }

    #[test]
    fn test_disconnect_releases_everything() {
        let (_dir, engine, a, location) = setup();
        let b = engine.connect("FAIRCOMS", &Credentials::default()).unwrap();
        engine
            .create_table(a, &location, &schema(), CreateMode::Normal)
            .unwrap();
        engine.lock(a, LockMode::Write, Duration::ZERO).unwrap();

        engine.disconnect(a).unwrap();
        assert_eq!(engine.open_table_count(), 0);
        engine.lock(b, LockMode::Write, Duration::ZERO).unwrap();
        assert!(matches!(
            engine.lock(a, LockMode::Read, Duration::ZERO),
            Err(CtdbError::NotOpen(_))
        ));
    }
}
