//! CTDB client SDK
//!
//! Record-oriented access to ISAM tables through a session.
//!
//! ## Object model
//! - `Session`: logon/logout, session-wide locks, path prefix, date format
//! - `Table`: field and index definitions, create/open/close
//! - `Record`: a row buffer with a cursor (first/next/find/write/delete)
//!
//! ## Engine
//! Storage sits behind the [`Engine`] trait. [`LocalEngine`] is the bundled
//! file-backed implementation: one checksummed data file per table, with
//! session and row locks held in memory.
//!
//! ```no_run
//! use ctdb::{CreateMode, EngineConfig, FieldType, LocalEngine, Record, Session, SessionMode, Table};
//! use std::sync::Arc;
//!
//! # fn main() -> ctdb::Result<()> {
//! let engine = Arc::new(LocalEngine::new(EngineConfig::with_data_dir("./data")));
//! let session = Session::new(engine, SessionMode::Ctdb);
//! session.logon("FAIRCOMS", "ADMIN", "ADMIN")?;
//!
//! let mut table = Table::new(&session);
//! table.add_field("name", FieldType::VarChar, 32)?;
//! table.create("people", CreateMode::Normal)?;
//!
//! let mut record = Record::new(&table)?;
//! record.clear()?;
//! record.set_field_as_string("name", "Ada")?;
//! record.write()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod types;

mod error;
mod field;
mod index;
mod record;
mod session;
mod table;

pub use config::{DurabilityLevel, EngineConfig, SessionConfig, SessionMode};
pub use error::{CtdbError, Result};

pub use engine::{
    CreateMode, Credentials, CursorOp, Engine, FindMode, LocalEngine, LockMode, OpenMode, RowImage,
    TableLocation,
};
pub use field::Field;
pub use index::{Index, Segment};
pub use record::{CursorState, FieldRef, IndexRef, Record};
pub use session::Session;
pub use table::Table;
pub use types::{
    CtDate, CtTime, CtTimestamp, DateFormat, FieldProperties, FieldType, FieldValue, IndexKind,
    RowId, SegmentMode,
};
