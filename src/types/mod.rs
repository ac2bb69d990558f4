//! Value and schema types shared by the binding objects and engines

mod date;
mod field_type;
mod properties;
mod table;
mod timestamp;
mod value;

pub use date::{CtDate, CtTime, DateFormat};
pub use field_type::FieldType;
pub use properties::{FieldProperties, PropertyKey, PropertyValue};
pub use table::{FieldDef, IndexDef, IndexKind, SegmentDef, SegmentMode, TableSchema};
pub use timestamp::CtTimestamp;
pub use value::FieldValue;

/// Row identifier (unique within a table, never reused)
pub type RowId = u64;
