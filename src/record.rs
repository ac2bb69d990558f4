//! Record: a row buffer with a cursor over an open table
//!
//! A record captures the table's storage binding when it is created. If
//! the table is closed afterwards, every operation on the record fails with
//! `NotOpen`.

use crate::engine::{CursorOp, FindMode, LockMode, RowImage, TableHandle};
use crate::error::{CtdbError, Result};
use crate::field::Field;
use crate::index::Index;
use crate::table::Table;
use crate::types::{CtDate, CtTime, CtTimestamp, FieldType, FieldValue, RowId};
use tracing::debug;

/// Field selector: by number, by name, or by a `Field` of the same table
#[derive(Debug, Clone, Copy)]
pub enum FieldRef<'a> {
    Number(usize),
    Name(&'a str),
}

impl From<usize> for FieldRef<'_> {
    fn from(n: usize) -> Self {
        FieldRef::Number(n)
    }
}

impl<'a> From<&'a str> for FieldRef<'a> {
    fn from(name: &'a str) -> Self {
        FieldRef::Name(name)
    }
}

impl<'a> From<&'a String> for FieldRef<'a> {
    fn from(name: &'a String) -> Self {
        FieldRef::Name(name)
    }
}

impl<'a> From<&'a Field> for FieldRef<'a> {
    fn from(field: &'a Field) -> Self {
        FieldRef::Name(field.name())
    }
}

/// Index selector for [`Record::set_default_index`]
#[derive(Debug, Clone, Copy)]
pub enum IndexRef<'a> {
    Number(usize),
    Name(&'a str),
}

impl From<usize> for IndexRef<'_> {
    fn from(n: usize) -> Self {
        IndexRef::Number(n)
    }
}

impl<'a> From<&'a str> for IndexRef<'a> {
    fn from(name: &'a str) -> Self {
        IndexRef::Name(name)
    }
}

impl<'a> From<&'a Index> for IndexRef<'a> {
    fn from(index: &'a Index) -> Self {
        IndexRef::Number(index.number())
    }
}

/// Cursor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No row loaded yet
    Unpositioned,
    /// Buffer holds this row
    Positioned(RowId),
    /// Moved past the last (or before the first) row
    End,
}

pub struct Record<'t> {
    table: &'t Table<'t>,
    handle: TableHandle,
    values: Vec<FieldValue>,
    cursor: CursorState,
    /// Next write inserts even when positioned
    pending_insert: bool,
    /// Active index; physical order when `None`
    index: Option<usize>,
}

impl<'t> Record<'t> {
    /// Attach a record to an open table
    ///
    /// The buffer starts cleared and the cursor unpositioned. The first
    /// index, if any, is the default traversal order.
    pub fn new(table: &'t Table<'t>) -> Result<Self> {
        let handle = table.handle()?;
        let values = table.get_fields().iter().map(Field::initial_value).collect();
        Ok(Self {
            table,
            handle,
            values,
            cursor: CursorState::Unpositioned,
            pending_insert: false,
            index: if table.index_count() > 0 { Some(0) } else { None },
        })
    }

    pub fn table(&self) -> &'t Table<'t> {
        self.table
    }

    fn bound(&self) -> Result<TableHandle> {
        match self.table.handle() {
            Ok(handle) if handle == self.handle => Ok(handle),
            _ => Err(CtdbError::NotOpen(
                "record belongs to a table binding that has been closed".to_string(),
            )),
        }
    }

    pub fn cursor(&self) -> CursorState {
        self.cursor
    }

    /// Row id of the loaded row
    pub fn row_id(&self) -> Option<RowId> {
        match self.cursor {
            CursorState::Positioned(id) => Some(id),
            _ => None,
        }
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    fn load(&mut self, row: Option<RowImage>) -> Option<RowId> {
        match row {
            Some(row) => {
                self.values = row.values;
                self.cursor = CursorState::Positioned(row.row_id);
                self.pending_insert = false;
                Some(row.row_id)
            }
            None => {
                self.cursor = CursorState::End;
                None
            }
        }
    }

    fn move_cursor(&mut self, op: CursorOp) -> Result<Option<RowId>> {
        let handle = self.bound()?;
        let row = self
            .table
            .session()
            .engine()
            .position_cursor(handle, self.index, &op)?;
        Ok(self.load(row))
    }

    /// Load the first row; `None` (cursor at End) for an empty table
    pub fn first(&mut self) -> Result<Option<RowId>> {
        self.move_cursor(CursorOp::First)
    }

    /// Like [`Record::first`], but an empty table is a `NotFound` error
    pub fn first_or_err(&mut self) -> Result<RowId> {
        self.first()?
            .ok_or_else(|| CtdbError::NotFound("table is empty".to_string()))
    }

    pub fn last(&mut self) -> Result<Option<RowId>> {
        self.move_cursor(CursorOp::Last)
    }

    pub fn last_or_err(&mut self) -> Result<RowId> {
        self.last()?
            .ok_or_else(|| CtdbError::NotFound("table is empty".to_string()))
    }

    /// Advance; `None` once past the last row
    ///
    /// From End or Unpositioned the cursor stays put and `None` is returned.
    pub fn next(&mut self) -> Result<Option<RowId>> {
        self.bound()?;
        match self.cursor {
            CursorState::Positioned(id) => self.move_cursor(CursorOp::Next(id)),
            _ => Ok(None),
        }
    }

    pub fn prev(&mut self) -> Result<Option<RowId>> {
        self.bound()?;
        match self.cursor {
            CursorState::Positioned(id) => self.move_cursor(CursorOp::Prev(id)),
            _ => Ok(None),
        }
    }

    /// Search the active index using the buffer's key fields
    pub fn find(&mut self, mode: FindMode) -> Result<Option<RowId>> {
        self.bound()?;
        let index = self.default_index().ok_or_else(|| {
            CtdbError::InvalidArgument("find needs an active index".to_string())
        })?;
        let key = index
            .segments()
            .iter()
            .map(|s| self.values[s.field_number()].clone())
            .collect();
        self.move_cursor(CursorOp::Find(mode, key))
    }

    /// Reset the buffer to defaults; the next `write` inserts
    ///
    /// Each field gets its default value, or null when nullable, or the
    /// blank value of its type. The cursor is left alone.
    pub fn clear(&mut self) -> Result<()> {
        self.bound()?;
        self.values = self
            .table
            .get_fields()
            .iter()
            .map(Field::initial_value)
            .collect();
        self.pending_insert = true;
        Ok(())
    }

    /// Persist the buffer
    ///
    /// Inserts after `clear` or when unpositioned, otherwise updates the
    /// loaded row. Returns the row id and leaves the cursor on it.
    pub fn write(&mut self) -> Result<RowId> {
        let handle = self.bound()?;
        let target = match self.cursor {
            CursorState::Positioned(id) if !self.pending_insert => Some(id),
            _ => None,
        };

        let id = self
            .table
            .session()
            .engine()
            .write_row(handle, target, &self.values)?;

        debug!(row = id, insert = target.is_none(), "record written");
        self.cursor = CursorState::Positioned(id);
        self.pending_insert = false;
        Ok(id)
    }

    /// Delete the loaded row; the record becomes unpositioned
    pub fn delete(&mut self) -> Result<()> {
        let handle = self.bound()?;
        let id = self.positioned_row()?;
        self.table.session().engine().delete_row(handle, id)?;
        self.cursor = CursorState::Unpositioned;
        self.pending_insert = true;
        Ok(())
    }

    fn positioned_row(&self) -> Result<RowId> {
        self.row_id().ok_or_else(|| {
            CtdbError::InvalidArgument("record is not positioned on a row".to_string())
        })
    }

    /// Lock the loaded row; `false` when the engine refuses
    pub fn lock(&self, mode: LockMode) -> bool {
        match self.lock_or_err(mode) {
            Ok(()) => true,
            Err(err) => {
                debug!(mode = mode.name(), %err, "row lock failed");
                false
            }
        }
    }

    /// Lock the loaded row, failing with `LockConflict` when refused
    pub fn lock_or_err(&self, mode: LockMode) -> Result<()> {
        let handle = self.bound()?;
        let id = self.positioned_row()?;
        let session = self.table.session();
        session
            .engine()
            .lock_row(handle, id, mode, session.lock_timeout())
    }

    pub fn default_index(&self) -> Option<&'t Index> {
        self.index.and_then(|n| self.table.indexes().get(n))
    }

    /// Traverse by `index` from now on; the cursor resets
    pub fn set_default_index<'a>(&mut self, index: impl Into<IndexRef<'a>>) -> Result<()> {
        self.bound()?;
        let number = match index.into() {
            IndexRef::Number(n) if n < self.table.index_count() => n,
            IndexRef::Number(n) => {
                return Err(CtdbError::NotFound(format!("index number {}", n)));
            }
            IndexRef::Name(name) => self.table.get_index(name)?.number(),
        };
        self.index = Some(number);
        self.cursor = CursorState::Unpositioned;
        Ok(())
    }

    /// Traverse in insertion order; the cursor resets
    pub fn use_physical_order(&mut self) -> Result<()> {
        self.bound()?;
        self.index = None;
        self.cursor = CursorState::Unpositioned;
        Ok(())
    }

    fn field<'a>(&self, field: impl Into<FieldRef<'a>>) -> Result<&'t Field> {
        match field.into() {
            FieldRef::Number(n) => self.table.get_field(n),
            FieldRef::Name(name) => self.table.get_field_by_name(name),
        }
    }

    fn mismatch(field: &Field, wanted: &str) -> CtdbError {
        CtdbError::TypeMismatch(format!(
            "field '{}' is {}, not {}",
            field.name(),
            field.human_type(),
            wanted
        ))
    }

    pub fn get_field<'a>(&self, field: impl Into<FieldRef<'a>>) -> Result<FieldValue> {
        self.bound()?;
        let field = self.field(field)?;
        Ok(self.values[field.number()].clone())
    }

    pub fn is_null<'a>(&self, field: impl Into<FieldRef<'a>>) -> Result<bool> {
        self.bound()?;
        let field = self.field(field)?;
        Ok(self.values[field.number()].is_null())
    }

    /// Store a value in the buffer after type, range and nullability checks
    ///
    /// On failure the buffer is unchanged.
    pub fn set_field<'a>(&mut self, field: impl Into<FieldRef<'a>>, value: impl Into<FieldValue>) -> Result<()> {
        self.bound()?;
        let field = self.field(field)?;
        let value = field.field_type().coerce_value(value.into());

        if value.is_null() && !field.allow_nil() {
            return Err(CtdbError::TypeMismatch(format!(
                "field '{}' does not allow null",
                field.name()
            )));
        }
        field.field_type().check_value(field.length(), &value)?;

        self.values[field.number()] = value;
        Ok(())
    }

    pub fn set_null<'a>(&mut self, field: impl Into<FieldRef<'a>>) -> Result<()> {
        self.set_field(field, FieldValue::Null)
    }

    pub fn get_field_as_bool<'a>(&self, field: impl Into<FieldRef<'a>>) -> Result<Option<bool>> {
        self.bound()?;
        let field = self.field(field)?;
        match &self.values[field.number()] {
            FieldValue::Null if field.field_type() == FieldType::Bool => Ok(None),
            FieldValue::Bool(b) => Ok(Some(*b)),
            _ => Err(Self::mismatch(field, "BOOL")),
        }
    }

    pub fn get_field_as_signed<'a>(&self, field: impl Into<FieldRef<'a>>) -> Result<Option<i64>> {
        self.bound()?;
        let field = self.field(field)?;
        if !field.field_type().is_signed() {
            return Err(Self::mismatch(field, "a signed integer"));
        }
        match &self.values[field.number()] {
            FieldValue::Signed(v) => Ok(Some(*v)),
            FieldValue::Null => Ok(None),
            _ => Err(Self::mismatch(field, "a signed integer")),
        }
    }

    pub fn get_field_as_unsigned<'a>(&self, field: impl Into<FieldRef<'a>>) -> Result<Option<u64>> {
        self.bound()?;
        let field = self.field(field)?;
        if !field.field_type().is_unsigned() {
            return Err(Self::mismatch(field, "an unsigned integer"));
        }
        match &self.values[field.number()] {
            FieldValue::Unsigned(v) => Ok(Some(*v)),
            FieldValue::Null => Ok(None),
            _ => Err(Self::mismatch(field, "an unsigned integer")),
        }
    }

    pub fn get_field_as_float<'a>(&self, field: impl Into<FieldRef<'a>>) -> Result<Option<f64>> {
        self.bound()?;
        let field = self.field(field)?;
        if !field.field_type().is_float() {
            return Err(Self::mismatch(field, "a float"));
        }
        match &self.values[field.number()] {
            FieldValue::Float(v) => Ok(Some(*v)),
            FieldValue::Null => Ok(None),
            _ => Err(Self::mismatch(field, "a float")),
        }
    }

    /// Text of a string field, or a DATE rendered in the session date format
    pub fn get_field_as_string<'a>(&self, field: impl Into<FieldRef<'a>>) -> Result<Option<String>> {
        self.bound()?;
        let field = self.field(field)?;
        if !field.is_string() && !field.is_date() {
            return Err(Self::mismatch(field, "a string"));
        }
        match &self.values[field.number()] {
            FieldValue::Null => Ok(None),
            FieldValue::Text(s) => Ok(Some(s.clone())),
            FieldValue::Date(d) => Ok(Some(d.format(self.table.session().default_date_format()))),
            FieldValue::Binary(bytes) => String::from_utf8(bytes.clone())
                .map(Some)
                .map_err(|_| Self::mismatch(field, "valid UTF-8 text")),
            _ => Err(Self::mismatch(field, "a string")),
        }
    }

    pub fn get_field_as_binary<'a>(&self, field: impl Into<FieldRef<'a>>) -> Result<Option<Vec<u8>>> {
        self.bound()?;
        let field = self.field(field)?;
        if !field.field_type().is_binary() && field.field_type() != FieldType::Lvb {
            return Err(Self::mismatch(field, "binary"));
        }
        match &self.values[field.number()] {
            FieldValue::Null => Ok(None),
            FieldValue::Binary(bytes) => Ok(Some(bytes.clone())),
            FieldValue::Text(s) => Ok(Some(s.clone().into_bytes())),
            _ => Err(Self::mismatch(field, "binary")),
        }
    }

    pub fn get_field_as_date<'a>(&self, field: impl Into<FieldRef<'a>>) -> Result<Option<CtDate>> {
        self.bound()?;
        let field = self.field(field)?;
        match &self.values[field.number()] {
            FieldValue::Null if field.is_date() => Ok(None),
            FieldValue::Date(d) => Ok(Some(*d)),
            _ => Err(Self::mismatch(field, "DATE")),
        }
    }

    pub fn get_field_as_time<'a>(&self, field: impl Into<FieldRef<'a>>) -> Result<Option<CtTime>> {
        self.bound()?;
        let field = self.field(field)?;
        match &self.values[field.number()] {
            FieldValue::Null if field.field_type() == FieldType::Time => Ok(None),
            FieldValue::Time(t) => Ok(Some(*t)),
            _ => Err(Self::mismatch(field, "TIME")),
        }
    }

    pub fn get_field_as_timestamp<'a>(&self, field: impl Into<FieldRef<'a>>) -> Result<Option<CtTimestamp>> {
        self.bound()?;
        let field = self.field(field)?;
        match &self.values[field.number()] {
            FieldValue::Null if field.field_type() == FieldType::Timestamp => Ok(None),
            FieldValue::Timestamp(ts) => Ok(Some(*ts)),
            _ => Err(Self::mismatch(field, "TIMESTAMP")),
        }
    }

    pub fn set_field_as_bool<'a>(&mut self, field: impl Into<FieldRef<'a>>, value: bool) -> Result<()> {
        self.set_field(field, FieldValue::Bool(value))
    }

    pub fn set_field_as_signed<'a>(&mut self, field: impl Into<FieldRef<'a>>, value: i64) -> Result<()> {
        self.set_field(field, FieldValue::Signed(value))
    }

    pub fn set_field_as_unsigned<'a>(&mut self, field: impl Into<FieldRef<'a>>, value: u64) -> Result<()> {
        self.set_field(field, FieldValue::Unsigned(value))
    }

    pub fn set_field_as_float<'a>(&mut self, field: impl Into<FieldRef<'a>>, value: f64) -> Result<()> {
        self.set_field(field, FieldValue::Float(value))
    }

    /// Store text in a string field, or parse it into a DATE field using
    /// the session date format
    pub fn set_field_as_string<'a>(&mut self, field: impl Into<FieldRef<'a>>, value: &str) -> Result<()> {
        let field_ref = field.into();
        let target = self.field(field_ref)?;
        if target.is_date() {
            let format = self.table.session().default_date_format();
            let date = CtDate::parse(value, format)
                .map_err(|e| CtdbError::TypeMismatch(e.to_string()))?;
            return self.set_field(field_ref, FieldValue::Date(date));
        }
        self.set_field(field_ref, FieldValue::Text(value.to_string()))
    }

    pub fn set_field_as_binary<'a>(&mut self, field: impl Into<FieldRef<'a>>, value: &[u8]) -> Result<()> {
        self.set_field(field, FieldValue::Binary(value.to_vec()))
    }

    pub fn set_field_as_date<'a>(&mut self, field: impl Into<FieldRef<'a>>, value: CtDate) -> Result<()> {
        self.set_field(field, FieldValue::Date(value))
    }

    pub fn set_field_as_time<'a>(&mut self, field: impl Into<FieldRef<'a>>, value: CtTime) -> Result<()> {
        self.set_field(field, FieldValue::Time(value))
    }

    pub fn set_field_as_timestamp<'a>(&mut self, field: impl Into<FieldRef<'a>>, value: CtTimestamp) -> Result<()> {
        self.set_field(field, FieldValue::Timestamp(value))
    }
}

impl std::fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("table", &self.table.name())
            .field("cursor", &self.cursor)
            .field("index", &self.default_index().map(Index::name))
            .field("values", &self.values)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, SessionMode};
    use crate::engine::{CreateMode, LocalEngine, OpenMode};
    use crate::session::Session;
    use crate::types::{DateFormat, FieldProperties, IndexKind, SegmentMode};
    use std::sync::Arc;

    fn logged_on() -> (tempfile::TempDir, Arc<LocalEngine>, Session) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(LocalEngine::new(EngineConfig::for_testing(dir.path())));
        let session = Session::new(engine.clone(), SessionMode::Ctdb);
        session.logon("FAIRCOMS", "", "").unwrap();
        (dir, engine, session)
    }

    fn people(session: &Session) -> Table<'_> {
        let mut table = Table::new(session);
        table.add_field("id", FieldType::UInteger, 4).unwrap();
        table.add_field("name", FieldType::VarChar, 16).unwrap();
        table.add_field("born", FieldType::Date, 4).unwrap();
        table.add_index("by_id", IndexKind::Fixed).unwrap();
        table.add_segment("by_id", "id", SegmentMode::ASCENDING).unwrap();
        table.create("people", CreateMode::Normal).unwrap();
        table
    }

    fn insert(record: &mut Record<'_>, id: u64, name: &str) -> RowId {
        record.clear().unwrap();
        record.set_field_as_unsigned("id", id).unwrap();
        record.set_field_as_string("name", name).unwrap();
        record.write().unwrap()
    }

    #[test]
    fn test_navigation_reaches_end_and_stays() {
        let (_dir, _engine, session) = logged_on();
        let table = people(&session);
        let mut record = Record::new(&table).unwrap();
        for (id, name) in [(4, "d"), (2, "b"), (1, "a"), (3, "c")] {
            insert(&mut record, id, name);
        }

        let mut seen = Vec::new();
        assert!(record.first().unwrap().is_some());
        seen.push(record.get_field_as_unsigned("id").unwrap().unwrap());
        for _ in 0..3 {
            assert!(record.next().unwrap().is_some());
            seen.push(record.get_field_as_unsigned("id").unwrap().unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3, 4]);

        assert_eq!(record.next().unwrap(), None);
        assert_eq!(record.cursor(), CursorState::End);
        assert_eq!(record.next().unwrap(), None);
        assert_eq!(record.cursor(), CursorState::End);
    }

    #[test]
    fn test_next_when_unpositioned_or_empty() {
        let (_dir, _engine, session) = logged_on();
        let table = people(&session);
        let mut record = Record::new(&table).unwrap();

        assert_eq!(record.next().unwrap(), None);
        assert_eq!(record.cursor(), CursorState::Unpositioned);
        assert_eq!(record.first().unwrap(), None);
        assert_eq!(record.cursor(), CursorState::End);
        assert!(record.first_or_err().unwrap_err().is_not_found());
        assert!(record.last_or_err().is_err());
    }

    #[test]
    fn test_last_prev_and_physical_order() {
        let (_dir, _engine, session) = logged_on();
        let table = people(&session);
        let mut record = Record::new(&table).unwrap();
        for (id, name) in [(30, "x"), (10, "y"), (20, "z")] {
            insert(&mut record, id, name);
        }

        assert_eq!(record.default_index().map(Index::name), Some("by_id"));
        record.last().unwrap();
        assert_eq!(record.get_field_as_unsigned("id").unwrap(), Some(30));
        record.prev().unwrap();
        assert_eq!(record.get_field_as_unsigned("id").unwrap(), Some(20));

        record.use_physical_order().unwrap();
        assert_eq!(record.cursor(), CursorState::Unpositioned);
        record.first().unwrap();
        assert_eq!(record.get_field_as_unsigned("id").unwrap(), Some(30));
        assert_eq!(record.prev().unwrap(), None);

        record.set_default_index("by_id").unwrap();
        record.first_or_err().unwrap();
        assert_eq!(record.get_field("id").unwrap(), FieldValue::Unsigned(10));
        assert!(record.set_default_index(3usize).unwrap_err().is_not_found());
    }

    #[test]
    fn test_set_get_round_trip() {
        let (_dir, _engine, session) = logged_on();
        let mut table = Table::new(&session);
        table.add_field("flag", FieldType::Bool, 1).unwrap();
        table.add_field("small", FieldType::SmallInt, 2).unwrap();
        table.add_field("count", FieldType::UInteger, 4).unwrap();
        table.add_field("ratio", FieldType::Double, 8).unwrap();
        table.add_field("label", FieldType::Chars, 8).unwrap();
        table.add_field("blob", FieldType::VarBinary, 2).unwrap();
        table.add_field("at", FieldType::Time, 4).unwrap();
        table.add_field("stamp", FieldType::Timestamp, 8).unwrap();
        table.create("values", CreateMode::Normal).unwrap();

        let mut record = Record::new(&table).unwrap();
        let cases = [
            ("flag", FieldValue::Bool(true)),
            ("small", FieldValue::Signed(-32768)),
            ("count", FieldValue::Unsigned(u32::MAX as u64)),
            ("ratio", FieldValue::Float(0.25)),
            ("label", FieldValue::from("12345678")),
            ("blob", FieldValue::Binary(vec![0, 1, 2])),
            ("at", FieldValue::Time(CtTime::new(23, 59, 59).unwrap())),
            ("stamp", FieldValue::Timestamp(CtTimestamp::from_unix_secs(1_000_000).unwrap())),
        ];
        for (name, value) in &cases {
            record.set_field(*name, value.clone()).unwrap();
            assert_eq!(&record.get_field(*name).unwrap(), value);
        }

        let id = record.write().unwrap();
        record.clear().unwrap();
        assert!(record.is_null("count").unwrap());
        record.first().unwrap();
        assert_eq!(record.row_id(), Some(id));
        for (name, value) in &cases {
            assert_eq!(&record.get_field(*name).unwrap(), value);
        }
    }

    #[test]
    fn test_integer_literals_match_field_signedness() {
        let (_dir, _engine, session) = logged_on();
        let mut table = Table::new(&session);
        table.add_field("count", FieldType::UInteger, 4).unwrap();
        table.add_field("delta", FieldType::BigInt, 8).unwrap();
        table.create("counters", CreateMode::Normal).unwrap();
        let mut record = Record::new(&table).unwrap();

        record.set_field("count", 5).unwrap();
        assert_eq!(record.get_field("count").unwrap(), FieldValue::Unsigned(5));
        assert_eq!(record.get_field_as_unsigned("count").unwrap(), Some(5));

        record.set_field("delta", 9u64).unwrap();
        assert_eq!(record.get_field_as_signed("delta").unwrap(), Some(9));

        assert!(matches!(record.set_field("count", -5), Err(CtdbError::TypeMismatch(_))));
        assert!(matches!(record.set_field("delta", u64::MAX), Err(CtdbError::TypeMismatch(_))));
        assert_eq!(record.get_field_as_unsigned("count").unwrap(), Some(5));
        assert_eq!(record.get_field_as_signed("delta").unwrap(), Some(9));

        record.write().unwrap();
        record.first().unwrap();
        assert_eq!(record.values(), &[FieldValue::Unsigned(5), FieldValue::Signed(9)]);
    }

    #[test]
    fn test_out_of_range_leaves_buffer_unchanged() {
        let (_dir, _engine, session) = logged_on();
        let table = people(&session);
        let mut record = Record::new(&table).unwrap();

        record.set_field_as_unsigned("id", 7).unwrap();
        let err = record
            .set_field_as_unsigned("id", u32::MAX as u64 + 1)
            .unwrap_err();
        assert!(matches!(err, CtdbError::TypeMismatch(_)));
        assert_eq!(record.get_field_as_unsigned("id").unwrap(), Some(7));

        assert!(record.set_field("name", "x".repeat(17)).is_err());
        assert!(record.is_null("name").unwrap());
    }

    #[test]
    fn test_typed_accessors_reject_wrong_types() {
        let (_dir, _engine, session) = logged_on();
        let table = people(&session);
        let mut record = Record::new(&table).unwrap();

        assert!(matches!(
            record.set_field_as_signed("id", -1),
            Err(CtdbError::TypeMismatch(_))
        ));
        assert!(matches!(
            record.set_field_as_float("id", 1.0),
            Err(CtdbError::TypeMismatch(_))
        ));
        assert!(record.set_field_as_bool("name", true).is_err());
        assert!(record.get_field_as_signed("id").is_err());
        assert!(record.get_field_as_bool("id").is_err());
        assert!(record.get_field_as_float("name").is_err());
        assert!(record.get_field_as_string("id").is_err());
        assert!(record.get_field("missing").unwrap_err().is_not_found());
        assert!(record.get_field(9usize).unwrap_err().is_not_found());
    }

    #[test]
    fn test_date_strings_follow_session_format() {
        let (_dir, _engine, session) = logged_on();
        let table = people(&session);
        let mut record = Record::new(&table).unwrap();

        record.set_field_as_string("born", "10/01/1984").unwrap();
        assert_eq!(
            record.get_field_as_date("born").unwrap(),
            Some(CtDate::new(1984, 10, 1).unwrap())
        );

        session.set_default_date_format(DateFormat::Cymd);
        assert_eq!(record.get_field_as_string("born").unwrap().as_deref(), Some("19841001"));
        assert!(matches!(
            record.set_field_as_string("born", "10/01/1984"),
            Err(CtdbError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_field_refs() {
        let (_dir, _engine, session) = logged_on();
        let table = people(&session);
        let mut record = Record::new(&table).unwrap();
        let name_field = table.get_field_by_name("name").unwrap();

        record.set_field(name_field, "by field").unwrap();
        assert_eq!(record.get_field(1usize).unwrap(), FieldValue::from("by field"));
        let owned = String::from("name");
        assert_eq!(record.get_field_as_string(&owned).unwrap().as_deref(), Some("by field"));
    }

    #[test]
    fn test_write_updates_positioned_row() {
        let (_dir, _engine, session) = logged_on();
        let table = people(&session);
        let mut record = Record::new(&table).unwrap();
        let id = insert(&mut record, 1, "before");

        record.first().unwrap();
        record.set_field_as_string("name", "after").unwrap();
        assert_eq!(record.write().unwrap(), id);

        let mut reader = Record::new(&table).unwrap();
        reader.first().unwrap();
        assert_eq!(reader.get_field_as_string("name").unwrap().as_deref(), Some("after"));
        assert_eq!(reader.next().unwrap(), None);
    }

    #[test]
    fn test_unique_violation_on_write() {
        let (_dir, _engine, session) = logged_on();
        let table = people(&session);
        let mut record = Record::new(&table).unwrap();
        insert(&mut record, 1, "one");

        record.clear().unwrap();
        record.set_field_as_unsigned("id", 1).unwrap();
        assert!(matches!(record.write(), Err(CtdbError::ConstraintViolation(_))));

        let mut reader = Record::new(&table).unwrap();
        reader.first().unwrap();
        assert_eq!(reader.get_field_as_string("name").unwrap().as_deref(), Some("one"));
        assert_eq!(reader.next().unwrap(), None);
    }

    #[test]
    fn test_find_modes() {
        let (_dir, _engine, session) = logged_on();
        let table = people(&session);
        let mut record = Record::new(&table).unwrap();
        for (id, name) in [(10, "ten"), (20, "twenty"), (30, "thirty")] {
            insert(&mut record, id, name);
        }

        record.clear().unwrap();
        record.set_field_as_unsigned("id", 20).unwrap();
        assert!(record.find(FindMode::Eq).unwrap().is_some());
        assert_eq!(record.get_field_as_string("name").unwrap().as_deref(), Some("twenty"));

        record.set_field_as_unsigned("id", 25).unwrap();
        assert!(record.find(FindMode::Eq).unwrap().is_none());
        assert_eq!(record.cursor(), CursorState::End);

        record.set_field_as_unsigned("id", 25).unwrap();
        record.find(FindMode::Lt).unwrap();
        assert_eq!(record.get_field_as_unsigned("id").unwrap(), Some(20));

        record.use_physical_order().unwrap();
        assert!(matches!(record.find(FindMode::Ge), Err(CtdbError::InvalidArgument(_))));
    }

    #[test]
    fn test_clear_uses_field_defaults() {
        let (_dir, _engine, session) = logged_on();
        let mut table = Table::new(&session);
        table
            .add_field_with(
                "status",
                FieldType::Chars,
                8,
                FieldProperties::new().with_default(FieldValue::from("new")),
            )
            .unwrap();
        table
            .add_field_with("qty", FieldType::Integer, 4, FieldProperties::new().with_allow_null(false))
            .unwrap();
        table.create("orders", CreateMode::Normal).unwrap();

        let mut record = Record::new(&table).unwrap();
        record.clear().unwrap();
        assert_eq!(record.values(), &[FieldValue::from("new"), FieldValue::Signed(0)]);
        assert!(matches!(record.set_null("qty"), Err(CtdbError::TypeMismatch(_))));
    }

    #[test]
    fn test_delete() {
        let (_dir, _engine, session) = logged_on();
        let table = people(&session);
        let mut record = Record::new(&table).unwrap();
        insert(&mut record, 1, "a");
        insert(&mut record, 2, "b");

        record.first().unwrap();
        record.delete().unwrap();
        assert_eq!(record.cursor(), CursorState::Unpositioned);
        assert!(record.delete().is_err());

        record.first().unwrap();
        assert_eq!(record.get_field_as_unsigned("id").unwrap(), Some(2));
        assert_eq!(record.next().unwrap(), None);
    }

    #[test]
    fn test_record_after_close_is_not_open() {
        let (_dir, _engine, session) = logged_on();
        let table = people(&session);
        let mut record = Record::new(&table).unwrap();
        insert(&mut record, 1, "a");

        table.close().unwrap();
        assert!(matches!(record.first(), Err(CtdbError::NotOpen(_))));
        assert!(matches!(record.get_field("id"), Err(CtdbError::NotOpen(_))));
        assert!(matches!(record.write(), Err(CtdbError::NotOpen(_))));
        assert!(matches!(Record::new(&table), Err(CtdbError::NotOpen(_))));
    }

    #[test]
    fn test_row_locks_between_sessions() {
        let (_dir, engine, session) = logged_on();
        let table = people(&session);
        let mut record = Record::new(&table).unwrap();
        insert(&mut record, 1, "a");
        record.first().unwrap();
        assert!(record.lock(LockMode::Write));

        let other = Session::new(engine, SessionMode::Ctdb);
        other.logon("FAIRCOMS", "", "").unwrap();
        let mut other_table = Table::new(&other);
        other_table.open("people", OpenMode::Normal).unwrap();
        let mut theirs = Record::new(&other_table).unwrap();
        theirs.first().unwrap();

        assert!(!theirs.lock(LockMode::Read));
        theirs.set_field_as_string("name", "theirs").unwrap();
        assert!(matches!(theirs.write(), Err(CtdbError::LockConflict(_))));

        record.lock_or_err(LockMode::Free).unwrap();
        theirs.write().unwrap();
    }

    #[test]
    fn test_session_write_lock_blocks_other_session_writes() {
        let (_dir, engine, session) = logged_on();
        let table = people(&session);

        let other = Session::new(engine, SessionMode::Ctdb);
        other.logon("FAIRCOMS", "", "").unwrap();
        let mut other_table = Table::new(&other);
        other_table.open("people", OpenMode::Normal).unwrap();

        assert!(session.lock(LockMode::Write));
        let mut theirs = Record::new(&other_table).unwrap();
        theirs.clear().unwrap();
        theirs.set_field_as_unsigned("id", 5).unwrap();
        assert!(matches!(theirs.write(), Err(CtdbError::LockConflict(_))));

        let mut mine = Record::new(&table).unwrap();
        insert(&mut mine, 6, "mine");

        assert!(session.unlock());
        theirs.write().unwrap();
    }
}
