//! Row ordering and key search over a table image

use super::table_file::TableImage;
use super::{CursorOp, FindMode};
use crate::error::{CtdbError, Result};
use crate::types::{FieldValue, IndexDef, RowId, TableSchema};
use std::cmp::Ordering;

/// Key values of `index` taken from a full row
pub fn key_of(schema: &TableSchema, index: &IndexDef, values: &[FieldValue]) -> Vec<FieldValue> {
    index
        .segments
        .iter()
        .map(|segment| {
            schema
                .field_position(&segment.field_name)
                .and_then(|p| values.get(p))
                .cloned()
                .unwrap_or(FieldValue::Null)
        })
        .collect()
}

/// Compare two keys segment by segment
///
/// A shorter key compares as a prefix: only the common segments count.
pub fn compare_keys(index: &IndexDef, a: &[FieldValue], b: &[FieldValue]) -> Ordering {
    for ((segment, x), y) in index.segments.iter().zip(a).zip(b) {
        let ord = x.cmp_key(y, segment.mode.ignore_case);
        let ord = if segment.mode.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn index_def(image: &TableImage, index: usize) -> Result<&IndexDef> {
    image.schema.indexes.get(index).ok_or_else(|| {
        CtdbError::NotFound(format!(
            "index number {} (table has {})",
            index,
            image.schema.indexes.len()
        ))
    })
}

/// Row ids with their keys, sorted by key then row id
fn keyed_rows(image: &TableImage, index: &IndexDef) -> Vec<(Vec<FieldValue>, RowId)> {
    let mut rows: Vec<_> = image
        .rows
        .iter()
        .map(|(id, values)| (key_of(&image.schema, index, values), *id))
        .collect();
    rows.sort_by(|(ka, ia), (kb, ib)| compare_keys(index, ka, kb).then(ia.cmp(ib)));
    rows
}

/// Row ids in traversal order; physical (insertion) order when `index` is `None`
pub fn ordered_rows(image: &TableImage, index: Option<usize>) -> Result<Vec<RowId>> {
    match index {
        None => Ok(image.rows.keys().copied().collect()),
        Some(n) => {
            let def = index_def(image, n)?;
            Ok(keyed_rows(image, def).into_iter().map(|(_, id)| id).collect())
        }
    }
}

/// Resolve a cursor operation to a row id (`None` = end of set)
pub fn position(image: &TableImage, index: Option<usize>, op: &CursorOp) -> Result<Option<RowId>> {
    match op {
        CursorOp::First => Ok(ordered_rows(image, index)?.first().copied()),
        CursorOp::Last => Ok(ordered_rows(image, index)?.last().copied()),
        CursorOp::Next(current) | CursorOp::Prev(current) => {
            let order = ordered_rows(image, index)?;
            let at = order.iter().position(|id| id == current).ok_or_else(|| {
                CtdbError::NotFound(format!("row {} no longer exists", current))
            })?;
            Ok(match op {
                CursorOp::Next(_) => order.get(at + 1).copied(),
                _ => at.checked_sub(1).and_then(|p| order.get(p)).copied(),
            })
        }
        CursorOp::Find(mode, target) => {
            let n = index.ok_or_else(|| {
                CtdbError::InvalidArgument("find needs an index, not physical order".to_string())
            })?;
            let def = index_def(image, n)?;
            let rows = keyed_rows(image, def);
            let cmp = |key: &Vec<FieldValue>| compare_keys(def, key, target);

            let found = match mode {
                FindMode::Eq => rows.iter().find(|(k, _)| cmp(k) == Ordering::Equal),
                FindMode::Ge => rows.iter().find(|(k, _)| cmp(k) != Ordering::Less),
                FindMode::Gt => rows.iter().find(|(k, _)| cmp(k) == Ordering::Greater),
                FindMode::Le => rows.iter().rev().find(|(k, _)| cmp(k) != Ordering::Greater),
                FindMode::Lt => rows.iter().rev().find(|(k, _)| cmp(k) == Ordering::Less),
            };
            Ok(found.map(|(_, id)| *id))
        }
    }
}

/// First unique index on which `values` collides with another row
///
/// Keys whose segments are all null are skipped when the index allows
/// null keys.
pub fn find_duplicate(
    image: &TableImage,
    values: &[FieldValue],
    exclude: Option<RowId>,
) -> Option<(String, RowId)> {
    for index in image.schema.indexes.iter().filter(|i| !i.allow_duplicates) {
        let key = key_of(&image.schema, index, values);
        if index.allow_null_keys && key.iter().all(FieldValue::is_null) {
            continue;
        }

        let clash = image.rows.iter().find(|(id, row)| {
            Some(**id) != exclude
                && compare_keys(index, &key_of(&image.schema, index, row), &key) == Ordering::Equal
        });
        if let Some((id, _)) = clash {
            return Some((index.name.clone(), *id));
        }
    }
    None
}
