//! Table schema definitions as stored by the engine

use super::{FieldProperties, FieldType};
use crate::error::{CtdbError, Result};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    /// Declared byte length
    pub length: u32,
    /// Position in the row (0-indexed)
    pub number: usize,
    #[serde(default)]
    pub properties: FieldProperties,
}

impl FieldDef {
    pub fn new(name: &str, field_type: FieldType, length: u32, number: usize) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            length,
            number,
            properties: FieldProperties::default(),
        }
    }

    pub fn with_properties(mut self, properties: FieldProperties) -> Self {
        self.properties = properties;
        self
    }
}

/// Per-segment ordering flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SegmentMode {
    pub descending: bool,
    pub ignore_case: bool,
}

impl SegmentMode {
    pub const ASCENDING: SegmentMode = SegmentMode {
        descending: false,
        ignore_case: false,
    };

    pub const DESCENDING: SegmentMode = SegmentMode {
        descending: true,
        ignore_case: false,
    };

    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}

/// One key component of an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDef {
    pub field_name: String,
    pub mode: SegmentMode,
}

/// Key compression layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IndexKind {
    #[default]
    Fixed,
    Leading,
    Padding,
    LeadPad,
    Error,
}

/// Index definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub kind: IndexKind,
    #[serde(default)]
    pub allow_duplicates: bool,
    #[serde(default = "default_allow_null_keys")]
    pub allow_null_keys: bool,
    pub segments: Vec<SegmentDef>,
}

fn default_allow_null_keys() -> bool {
    true
}

impl IndexDef {
    pub fn new(name: &str, kind: IndexKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            allow_duplicates: false,
            allow_null_keys: true,
            segments: Vec::new(),
        }
    }

    pub fn with_segment(mut self, field_name: &str, mode: SegmentMode) -> Self {
        self.segments.push(SegmentDef {
            field_name: field_name.to_string(),
            mode,
        });
        self
    }
}

/// Table schema definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSchema {
    /// Field definitions (ordered)
    pub fields: Vec<FieldDef>,
    pub indexes: Vec<IndexDef>,
    /// Field name -> position
    #[serde(skip)]
    field_map: AHashMap<String, usize>,
}

impl TableSchema {
    pub fn new(fields: Vec<FieldDef>, indexes: Vec<IndexDef>) -> Self {
        let mut schema = Self {
            fields,
            indexes,
            field_map: AHashMap::new(),
        };
        schema.rebuild_field_map();
        schema
    }

    /// Rebuild field map (call after deserialization)
    pub fn rebuild_field_map(&mut self) {
        self.field_map.clear();
        for field in &self.fields {
            self.field_map.insert(field.name.clone(), field.number);
        }
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.field_position(name).and_then(|p| self.fields.get(p))
    }

    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.field_map.get(name).copied()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn get_index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Structural checks run before create and after load
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(CtdbError::InvalidArgument(
                "a table needs at least one field".to_string(),
            ));
        }

        for (i, field) in self.fields.iter().enumerate() {
            if field.number != i {
                return Err(CtdbError::SchemaMismatch(format!(
                    "field '{}' numbered {} at position {}",
                    field.name, field.number, i
                )));
            }
            if field.name.is_empty() {
                return Err(CtdbError::InvalidArgument(format!(
                    "field {} has an empty name",
                    i
                )));
            }
            if self.field_position(&field.name) != Some(i) {
                return Err(CtdbError::InvalidArgument(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
        }

        for (i, index) in self.indexes.iter().enumerate() {
            if self.indexes[..i].iter().any(|other| other.name == index.name) {
                return Err(CtdbError::InvalidArgument(format!(
                    "duplicate index name '{}'",
                    index.name
                )));
            }
            if index.segments.is_empty() {
                return Err(CtdbError::InvalidArgument(format!(
                    "index '{}' has no segments",
                    index.name
                )));
            }
            for segment in &index.segments {
                if self.field_position(&segment.field_name).is_none() {
                    return Err(CtdbError::NotFound(format!(
                        "index '{}' refers to unknown field '{}'",
                        index.name, segment.field_name
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> TableSchema {
        TableSchema::new(
            vec![
                FieldDef::new("id", FieldType::UInteger, 4, 0),
                FieldDef::new("name", FieldType::Chars, 32, 1),
            ],
            vec![IndexDef::new("by_id", IndexKind::Fixed).with_segment("id", SegmentMode::ASCENDING)],
        )
    }

    #[test]
    fn test_lookup() {
        let schema = sample_schema();
        assert_eq!(schema.field_count(), 2);
        assert_eq!(schema.field_position("name"), Some(1));
        assert_eq!(schema.get_field("id").map(|f| f.field_type), Some(FieldType::UInteger));
        assert!(schema.get_field("missing").is_none());
        assert!(schema.get_index("by_id").is_some());
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_field_map_survives_serialization() {
        let schema = sample_schema();
        let bytes = bincode::serialize(&schema).unwrap();
        let mut loaded: TableSchema = bincode::deserialize(&bytes).unwrap();
        assert_eq!(loaded.field_position("name"), None);

        loaded.rebuild_field_map();
        assert_eq!(loaded.field_position("name"), Some(1));
    }

    #[test]
    fn test_validate_rejects_bad_schemas() {
        assert!(TableSchema::new(Vec::new(), Vec::new()).validate().is_err());

        let dup = TableSchema::new(
            vec![
                FieldDef::new("a", FieldType::Bool, 1, 0),
                FieldDef::new("a", FieldType::Bool, 1, 1),
            ],
            Vec::new(),
        );
        assert!(dup.validate().is_err());

        let mut bad_index = sample_schema();
        bad_index
            .indexes
            .push(IndexDef::new("by_ghost", IndexKind::Fixed).with_segment("ghost", SegmentMode::ASCENDING));
        assert!(bad_index.validate().unwrap_err().is_not_found());

        let mut empty_index = sample_schema();
        empty_index.indexes.push(IndexDef::new("empty", IndexKind::Fixed));
        assert!(empty_index.validate().is_err());
    }
}
