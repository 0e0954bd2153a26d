//! Purpose: Bidirectional mapping between typed records and raw ordered rows.
//! Exports: `Codec`, `ColumnRole`.
//! Role: Pure translation layer used by `table`; performs no store I/O.
//! Invariants: Column roles are resolved once per header set, not re-dispatched per cell.
//! Invariants: Omitted record fields carry the existing row's value forward (merge-on-partial-update).

use crate::core::error::{Error, ErrorKind};
use crate::core::record::Record;
use crate::core::value::Value;
use crate::core::version;
use time::OffsetDateTime;

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const LOCK_VERSION: &str = "lock_version";

/// Encode/decode strategy for one column, fixed at codec construction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnRole {
    /// Set once at first insert, carried verbatim on every later write.
    CreatedAt,
    /// Rewritten to the current time on every write.
    UpdatedAt,
    /// Derived content stamp; never caller-supplied.
    LockVersion,
    /// Plain user data with merge-on-partial-update semantics.
    Data,
}

fn role_for(name: &str) -> ColumnRole {
    match name {
        CREATED_AT => ColumnRole::CreatedAt,
        UPDATED_AT => ColumnRole::UpdatedAt,
        LOCK_VERSION => ColumnRole::LockVersion,
        _ => ColumnRole::Data,
    }
}

/// Per-table codec bound to an ordered header set. Position in the header set
/// is the column's storage offset.
#[derive(Clone, Debug)]
pub struct Codec {
    columns: Vec<(String, ColumnRole)>,
}

impl Codec {
    pub fn new(headers: Vec<String>) -> Self {
        let columns = headers
            .into_iter()
            .map(|name| {
                let role = role_for(&name);
                (name, role)
            })
            .collect();
        Self { columns }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Produce the row to persist for `record` at a position whose prior state
    /// is `existing` (`None` when appending). The version stamp is computed
    /// over the incoming record as received, before any merge.
    pub fn record_to_row(
        &self,
        record: &Record,
        existing: Option<&[Value]>,
        now: OffsetDateTime,
    ) -> Result<Vec<Value>, Error> {
        if self.columns.is_empty() {
            return Err(Error::new(ErrorKind::Schema).with_message("header is not defined"));
        }

        let now_cell = Value::Timestamp(now).encode_cell()?;
        let mut stamp = None;
        let mut row = Vec::with_capacity(self.columns.len());

        for (offset, (name, role)) in self.columns.iter().enumerate() {
            let prior = existing_value(existing, offset);
            let cell = match role {
                ColumnRole::CreatedAt => match prior {
                    Some(value) => value.clone(),
                    // Fresh position: honor a record-carried creation time
                    // (bulk loads and table copies), otherwise stamp now.
                    None => match record.get(name) {
                        Some(value) => value.encode_cell().map_err(|err| err.with_column(name))?,
                        None => now_cell.clone(),
                    },
                },
                ColumnRole::UpdatedAt => now_cell.clone(),
                ColumnRole::LockVersion => {
                    let stamp = stamp.get_or_insert_with(|| version::stamp(record));
                    Value::Text(stamp.clone())
                }
                ColumnRole::Data => match record.get(name) {
                    Some(value) => value.encode_cell().map_err(|err| err.with_column(name))?,
                    None => prior.cloned().unwrap_or(Value::Null),
                },
            };
            row.push(cell);
        }

        Ok(row)
    }

    /// Decode a raw row into a record at logical position `index`. Short rows
    /// pad with `Null`; timestamp-shaped text decodes back to timestamps.
    pub fn row_to_record(&self, row: &[Value], index: usize) -> Record {
        let mut record = Record::new().with_index(index);
        for (offset, (name, _)) in self.columns.iter().enumerate() {
            let cell = row.get(offset).cloned().unwrap_or(Value::Null);
            record.set(name.clone(), cell.decode_cell());
        }
        record
    }
}

/// A cell counts as "having a value" only when it is neither null nor blank
/// text, matching spreadsheet empty-cell behavior.
fn existing_value(existing: Option<&[Value]>, offset: usize) -> Option<&Value> {
    let cell = existing?.get(offset)?;
    match cell {
        Value::Null => None,
        Value::Text(text) if text.is_empty() => None,
        other => Some(other),
    }
}
