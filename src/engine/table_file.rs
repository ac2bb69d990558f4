//! On-disk table image
//!
//! File format: [magic: 4][version: u16][reserved: u16][crc32: u32][len: u64][payload]
//!
//! The payload is the bincode-encoded [`TableImage`]. Files are rewritten
//! whole through a temporary file and a rename, so a crash leaves either
//! the old or the new image.

use crate::error::{CtdbError, Result};
use crate::types::{FieldValue, RowId, TableSchema};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

const MAGIC: &[u8; 4] = b"CTDB";
const FORMAT_VERSION: u16 = 1;
const HEADER_SIZE: usize = 20;

/// Schema plus rows of one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableImage {
    pub schema: TableSchema,
    pub rows: BTreeMap<RowId, Vec<FieldValue>>,
    pub next_row_id: RowId,
}

impl TableImage {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 1,
        }
    }

    pub fn allocate_row_id(&mut self) -> RowId {
        let id = self.next_row_id;
        self.next_row_id += 1;
        id
    }
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

pub fn encode(image: &TableImage) -> Result<Vec<u8>> {
    let payload = bincode::serialize(image)?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&checksum(&payload).to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode a table file; `verify_checksum = false` loads damaged payloads
pub fn decode(bytes: &[u8], verify_checksum: bool) -> Result<TableImage> {
    if bytes.len() < HEADER_SIZE || &bytes[0..4] != MAGIC {
        return Err(CtdbError::SchemaMismatch(
            "not a ctdb table file".to_string(),
        ));
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(CtdbError::SchemaMismatch(format!(
            "unsupported table format version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }

    let expected = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[12..20]);
    let len = u64::from_le_bytes(len_bytes) as usize;

    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != len {
        return Err(CtdbError::Corruption(format!(
            "payload is {} bytes, header says {}",
            payload.len(),
            len
        )));
    }

    if verify_checksum {
        let actual = checksum(payload);
        if actual != expected {
            return Err(CtdbError::Corruption(format!(
                "checksum mismatch: expected {:08x}, got {:08x}",
                expected, actual
            )));
        }
    }

    let mut image: TableImage = bincode::deserialize(payload)
        .map_err(|e| CtdbError::Corruption(format!("unreadable table payload: {}", e)))?;
    image.schema.rebuild_field_map();
    image.schema.validate()?;
    Ok(image)
}

pub fn read_file(path: &Path, verify_checksum: bool) -> Result<TableImage> {
    let bytes = fs::read(path)?;
    decode(&bytes, verify_checksum)
}

/// Atomically replace the file at `path`
pub fn write_file(path: &Path, image: &TableImage, sync: bool) -> Result<()> {
    let bytes = encode(image)?;
    let tmp_path = path.with_extension("dat.tmp");

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        if sync {
            file.sync_all()?;
        }
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}
