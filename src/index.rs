//! Index: an ordered key over fields of one table

use crate::error::{CtdbError, Result};
use crate::field::Field;
use crate::types::{IndexDef, IndexKind, SegmentDef, SegmentMode};
use std::fmt;

/// One key component
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    field_name: String,
    field_number: usize,
    length: u32,
    mode: SegmentMode,
}

impl Segment {
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn field_number(&self) -> usize {
        self.field_number
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn mode(&self) -> SegmentMode {
        self.mode
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    table_id: u64,
    number: usize,
    name: String,
    kind: IndexKind,
    allow_duplicates: bool,
    allow_null_keys: bool,
    segments: Vec<Segment>,
    /// Set once the table is created or opened
    frozen: bool,
}

impl Index {
    pub(crate) fn new(table_id: u64, number: usize, name: &str, kind: IndexKind) -> Self {
        Self {
            table_id,
            number,
            name: name.to_string(),
            kind,
            allow_duplicates: false,
            allow_null_keys: true,
            segments: Vec::new(),
            frozen: false,
        }
    }

    /// Rebuild from a stored definition; `fields` is the owning table's field list
    pub(crate) fn from_def(table_id: u64, number: usize, def: &IndexDef, fields: &[Field]) -> Result<Self> {
        let mut index = Self::new(table_id, number, &def.name, def.kind);
        index.allow_duplicates = def.allow_duplicates;
        index.allow_null_keys = def.allow_null_keys;
        for segment in &def.segments {
            let field = fields
                .iter()
                .find(|f| f.name() == segment.field_name)
                .ok_or_else(|| {
                    CtdbError::SchemaMismatch(format!(
                        "index '{}' refers to unknown field '{}'",
                        def.name, segment.field_name
                    ))
                })?;
            index.add_segment(field, segment.mode)?;
        }
        index.frozen = true;
        Ok(index)
    }

    pub(crate) fn to_def(&self) -> IndexDef {
        IndexDef {
            name: self.name.clone(),
            kind: self.kind,
            allow_duplicates: self.allow_duplicates,
            allow_null_keys: self.allow_null_keys,
            segments: self
                .segments
                .iter()
                .map(|s| SegmentDef {
                    field_name: s.field_name.clone(),
                    mode: s.mode,
                })
                .collect(),
        }
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.frozen {
            return Err(CtdbError::InvalidArgument(format!(
                "index '{}' can only change before the table is created",
                self.name
            )));
        }
        Ok(())
    }

    /// Append a key segment over `field`, which must belong to this index's table
    pub fn add_segment(&mut self, field: &Field, mode: SegmentMode) -> Result<()> {
        self.ensure_mutable()?;
        if field.table_id() != self.table_id {
            return Err(CtdbError::NotFound(format!(
                "field '{}' does not belong to the table of index '{}'",
                field.name(),
                self.name
            )));
        }

        self.segments.push(Segment {
            field_name: field.name().to_string(),
            field_number: field.number(),
            length: field.length(),
            mode,
        });
        Ok(())
    }

    pub fn set_allow_duplicates(&mut self, allow: bool) -> Result<()> {
        self.ensure_mutable()?;
        self.allow_duplicates = allow;
        Ok(())
    }

    pub fn set_allow_null_keys(&mut self, allow: bool) -> Result<()> {
        self.ensure_mutable()?;
        self.allow_null_keys = allow;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position among the table's indexes
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment field names in key order
    pub fn field_names(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.field_name.as_str()).collect()
    }

    pub fn is_unique(&self) -> bool {
        !self.allow_duplicates
    }

    pub fn allow_null_keys(&self) -> bool {
        self.allow_null_keys
    }

    /// Sum of the segment field lengths
    pub fn key_length(&self) -> u32 {
        self.segments.iter().map(|s| s.length).sum()
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Index name=\"{}\" field_names={:?}>", self.name, self.field_names())
    }
}
