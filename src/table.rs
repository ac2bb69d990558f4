//! Table: schema definition and storage binding
//!
//! A table is built in two phases. Before `create` it collects field and
//! index definitions; `create` or `open` binds it to storage, after which
//! the schema is fixed and records can be attached.

use crate::engine::{ConnectionHandle, CreateMode, OpenMode, TableHandle};
use crate::error::{CtdbError, Result};
use crate::field::Field;
use crate::index::Index;
use crate::session::Session;
use crate::types::{FieldDef, FieldProperties, FieldType, IndexKind, SegmentMode, TableSchema};
use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    conn: ConnectionHandle,
    handle: TableHandle,
    mode: OpenMode,
}

pub struct Table<'s> {
    session: &'s Session,
    id: u64,
    path: Option<String>,
    name: Option<String>,
    fields: Vec<Field>,
    /// Field name -> number
    field_map: AHashMap<String, usize>,
    indexes: Vec<Index>,
    binding: RwLock<Option<Binding>>,
}

impl<'s> Table<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self {
            session,
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            path: None,
            name: None,
            fields: Vec::new(),
            field_map: AHashMap::new(),
            indexes: Vec::new(),
            binding: RwLock::new(None),
        }
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }

    /// Directory the table lives in, relative to the session prefix
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Set the table directory; an empty string unsets it
    pub fn set_path(&mut self, path: &str) {
        self.path = if path.is_empty() {
            None
        } else {
            Some(path.to_string())
        };
    }

    /// Name given to `create`/`open`; `None` before either
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Binding made on the session's current connection
    ///
    /// A binding from before a logout is dead: the engine dropped its
    /// handle when the connection closed.
    fn live_binding(&self) -> Option<Binding> {
        let binding = (*self.binding.read())?;
        let conn = self.session.connection().ok()?;
        (binding.conn == conn).then_some(binding)
    }

    pub fn is_open(&self) -> bool {
        self.live_binding().is_some()
    }

    /// Mode of the current binding (`Normal` for a freshly created table)
    pub fn open_mode(&self) -> Option<OpenMode> {
        self.live_binding().map(|b| b.mode)
    }

    fn ensure_unbound(&self, what: &str) -> Result<()> {
        if self.is_open() {
            return Err(CtdbError::InvalidArgument(format!(
                "cannot {} while the table is open",
                what
            )));
        }
        Ok(())
    }

    /// Append a field with default properties
    pub fn add_field(&mut self, name: &str, field_type: FieldType, length: u32) -> Result<&Field> {
        self.add_field_with(name, field_type, length, FieldProperties::default())
    }

    /// Append a field; numbers are assigned in call order
    pub fn add_field_with(
        &mut self,
        name: &str,
        field_type: FieldType,
        length: u32,
        properties: FieldProperties,
    ) -> Result<&Field> {
        self.ensure_unbound("add fields")?;
        if name.is_empty() {
            return Err(CtdbError::InvalidArgument(
                "field name is required".to_string(),
            ));
        }
        if self.field_map.contains_key(name) {
            return Err(CtdbError::InvalidArgument(format!(
                "field '{}' already exists",
                name
            )));
        }
        field_type.validate_length(length)?;
        if let Some(default) = properties.default_value() {
            field_type
                .check_value(length, default)
                .map_err(|e| CtdbError::InvalidArgument(format!("default for '{}': {}", name, e)))?;
        }

        let number = self.fields.len();
        let def = FieldDef::new(name, field_type, length, number).with_properties(properties);
        self.fields.push(Field::from_def(self.id, &def));
        self.field_map.insert(name.to_string(), number);
        Ok(&self.fields[number])
    }

    /// Append an empty index to be filled with segments
    pub fn add_index(&mut self, name: &str, kind: IndexKind) -> Result<&mut Index> {
        self.ensure_unbound("add indexes")?;
        if name.is_empty() {
            return Err(CtdbError::InvalidArgument(
                "index name is required".to_string(),
            ));
        }
        if self.indexes.iter().any(|i| i.name() == name) {
            return Err(CtdbError::InvalidArgument(format!(
                "index '{}' already exists",
                name
            )));
        }

        let number = self.indexes.len();
        self.indexes.push(Index::new(self.id, number, name, kind));
        Ok(&mut self.indexes[number])
    }

    /// Append a segment over `field_name` to the index `index_name`
    pub fn add_segment(&mut self, index_name: &str, field_name: &str, mode: SegmentMode) -> Result<()> {
        let field = self.get_field_by_name(field_name)?.clone();
        let index = self
            .indexes
            .iter_mut()
            .find(|i| i.name() == index_name)
            .ok_or_else(|| CtdbError::NotFound(format!("index '{}'", index_name)))?;
        index.add_segment(&field, mode)
    }

    fn schema(&self) -> TableSchema {
        TableSchema::new(
            self.fields.iter().map(Field::to_def).collect(),
            self.indexes.iter().map(Index::to_def).collect(),
        )
    }

    /// Create storage at `path/name` from the accumulated definitions and bind to it
    pub fn create(&mut self, name: &str, mode: CreateMode) -> Result<()> {
        self.ensure_unbound("create")?;
        if name.is_empty() {
            return Err(CtdbError::InvalidArgument(
                "table name is required".to_string(),
            ));
        }
        if let Some(index) = self.indexes.iter().find(|i| i.segments().is_empty()) {
            return Err(CtdbError::InvalidArgument(format!(
                "index '{}' has no segments",
                index.name()
            )));
        }

        let session = self.session;
        let conn = session.connection()?;
        let location = session.resolve_location(self.path(), name);
        let handle = session
            .engine()
            .create_table(conn, &location, &self.schema(), mode)?;

        for index in &mut self.indexes {
            index.freeze();
        }
        self.name = Some(name.to_string());
        *self.binding.write() = Some(Binding {
            conn,
            handle,
            mode: OpenMode::Normal,
        });

        info!(table = name, dir = %location.dir.display(), fields = self.fields.len(), "table created");
        Ok(())
    }

    /// Bind to existing storage at `path/name`
    ///
    /// Field and index definitions are replaced by the stored schema.
    pub fn open(&mut self, name: &str, mode: OpenMode) -> Result<()> {
        self.ensure_unbound("open")?;
        if name.is_empty() {
            return Err(CtdbError::InvalidArgument(
                "table name is required".to_string(),
            ));
        }

        let session = self.session;
        let conn = session.connection()?;
        let location = session.resolve_location(self.path(), name);
        let engine = session.engine();
        let handle = engine.open_table(conn, &location, mode)?;

        let loaded = engine
            .read_schema(handle)
            .and_then(|schema| self.load_schema(&schema));
        if let Err(err) = loaded {
            engine.close_table(handle)?;
            return Err(err);
        }

        self.name = Some(name.to_string());
        *self.binding.write() = Some(Binding { conn, handle, mode });

        info!(table = name, ?mode, fields = self.fields.len(), "table opened");
        Ok(())
    }

    fn load_schema(&mut self, schema: &TableSchema) -> Result<()> {
        let fields: Vec<Field> = schema
            .fields
            .iter()
            .map(|def| Field::from_def(self.id, def))
            .collect();
        let indexes = schema
            .indexes
            .iter()
            .enumerate()
            .map(|(n, def)| Index::from_def(self.id, n, def, &fields))
            .collect::<Result<Vec<_>>>()?;

        self.field_map = fields.iter().map(|f| (f.name().to_string(), f.number())).collect();
        self.fields = fields;
        self.indexes = indexes;
        Ok(())
    }

    /// Release the storage binding; a no-op when not open
    pub fn close(&self) -> Result<()> {
        let Some(binding) = self.binding.write().take() else {
            warn!(table = ?self.name, "close on a table that is not open");
            return Ok(());
        };

        self.session.engine().close_table(binding.handle)?;
        info!(table = ?self.name, "table closed");
        Ok(())
    }

    pub(crate) fn handle(&self) -> Result<TableHandle> {
        self.live_binding()
            .map(|b| b.handle)
            .ok_or_else(|| CtdbError::NotOpen(format!("table {:?} is not open", self.name)))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Field names in field-number order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(Field::name).collect()
    }

    /// Fields in field-number order
    pub fn get_fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get_field(&self, number: usize) -> Result<&Field> {
        self.fields.get(number).ok_or_else(|| {
            CtdbError::NotFound(format!(
                "field number {} (table has {})",
                number,
                self.fields.len()
            ))
        })
    }

    pub fn get_field_by_name(&self, name: &str) -> Result<&Field> {
        self.field_map
            .get(name)
            .and_then(|n| self.fields.get(*n))
            .ok_or_else(|| CtdbError::NotFound(format!("field '{}'", name)))
    }

    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }

    pub fn get_index(&self, name: &str) -> Result<&Index> {
        self.indexes
            .iter()
            .find(|i| i.name() == name)
            .ok_or_else(|| CtdbError::NotFound(format!("index '{}'", name)))
    }
}

impl Drop for Table<'_> {
    fn drop(&mut self) {
        if (*self.binding.read()).is_none() {
            return;
        }
        if let Err(err) = self.close() {
            warn!(table = ?self.name, %err, "close on drop failed");
        }
    }
}

impl std::fmt::Debug for Table<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("fields", &self.field_names())
            .field("open", &self.is_open())
            .finish()
    }
}
