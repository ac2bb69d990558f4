//! Field: a typed column of a table

use crate::types::{FieldDef, FieldProperties, FieldType, FieldValue};
use std::fmt;

/// Read-only view of one column definition
///
/// Fields are produced by [`Table::add_field`](crate::Table::add_field)
/// or loaded from the stored schema on open. They remember which table
/// they came from so indexes can reject foreign fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    table_id: u64,
    number: usize,
    name: String,
    field_type: FieldType,
    length: u32,
    properties: FieldProperties,
}

impl Field {
    pub(crate) fn from_def(table_id: u64, def: &FieldDef) -> Self {
        Self {
            table_id,
            number: def.number,
            name: def.name.clone(),
            field_type: def.field_type,
            length: def.length,
            properties: def.properties.clone(),
        }
    }

    pub(crate) fn to_def(&self) -> FieldDef {
        FieldDef::new(&self.name, self.field_type, self.length, self.number)
            .with_properties(self.properties.clone())
    }

    pub(crate) fn table_id(&self) -> u64 {
        self.table_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in the row (0-indexed)
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Declared byte length
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Uppercase type name, `"UNKNOWN"` for unrecognized types
    pub fn human_type(&self) -> &'static str {
        self.field_type.human_type()
    }

    pub fn is_string(&self) -> bool {
        self.field_type.is_string()
    }

    pub fn is_integer(&self) -> bool {
        self.field_type.is_integer()
    }

    pub fn is_date(&self) -> bool {
        self.field_type.is_date()
    }

    pub fn properties(&self) -> &FieldProperties {
        &self.properties
    }

    pub fn allow_nil(&self) -> bool {
        self.properties.allow_null()
    }

    pub fn default_value(&self) -> Option<&FieldValue> {
        self.properties.default_value()
    }

    pub fn precision(&self) -> Option<i64> {
        self.properties.precision()
    }

    pub fn scale(&self) -> Option<i64> {
        self.properties.scale()
    }

    /// Value a cleared record starts with
    pub(crate) fn initial_value(&self) -> FieldValue {
        match self.default_value() {
            Some(value) => value.clone(),
            None if self.allow_nil() => FieldValue::Null,
            None => self.field_type.blank_value(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Field name=\"{}\" type=\"{}\">", self.name, self.human_type())
    }
}
