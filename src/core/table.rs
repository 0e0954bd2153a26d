//! Purpose: Record-level CRUD engine over one sheet of a tabular store.
//! Exports: `Table`, `copy_all_to`.
//! Role: Resolves logical indices to physical rows and routes rows through the codec.
//! Invariants: Logical index `i` maps to physical row `i + 2` (row 1 is the header).
//! Invariants: The header set is read once at connect time; migrations reconnect.

use crate::core::codec::Codec;
use crate::core::error::{Error, ErrorKind};
use crate::core::record::Record;
use crate::core::store::TabularStore;
use crate::core::value::{Value, now_ms};
use tracing::debug;

/// Physical row = logical index + this offset (header row + 1-based rows).
pub const ROW_OFFSET: usize = 2;

/// A table bound to one sheet. The header set is cached at construction and
/// never refreshed in place; `core::migrate` yields a fresh instance instead.
#[derive(Debug)]
pub struct Table<S: TabularStore> {
    sheet: S,
    codec: Codec,
}

impl<S: TabularStore> Table<S> {
    /// Bind to an existing sheet, reading the header row once. Any failure to
    /// reach the sheet here is a `Connect` error.
    pub fn connect(sheet: S) -> Result<Self, Error> {
        let header = sheet.header_row().map_err(|err| {
            Error::new(ErrorKind::Connect)
                .with_message(format!("can not connect sheet #{}", sheet.id()))
                .with_sheet(sheet.name())
                .with_source(err)
        })?;
        let headers = header.iter().map(Value::display_string).collect();
        Ok(Self {
            sheet,
            codec: Codec::new(headers),
        })
    }

    pub fn name(&self) -> &str {
        self.sheet.name()
    }

    pub fn id(&self) -> u64 {
        self.sheet.id()
    }

    pub fn headers(&self) -> Vec<String> {
        self.codec.column_names()
    }

    pub fn sheet(&self) -> &S {
        &self.sheet
    }

    /// Release the underlying sheet (used by migration to reconnect).
    pub fn into_sheet(self) -> S {
        self.sheet
    }

    fn read_row(&self, row: usize) -> Result<Vec<Value>, Error> {
        let mut rows = self.sheet.read_range(row, 1)?;
        Ok(rows.pop().unwrap_or_default())
    }

    fn require_schema(&self) -> Result<(), Error> {
        if self.codec.is_empty() {
            return Err(Error::new(ErrorKind::Schema)
                .with_message("header is not defined")
                .with_sheet(self.sheet.name()));
        }
        Ok(())
    }

    /// Read and decode the record at logical `index`.
    pub fn get(&self, index: usize) -> Result<Record, Error> {
        self.require_schema()?;
        let row = self.read_row(index + ROW_OFFSET)?;
        Ok(self.codec.row_to_record(&row, index))
    }

    /// Raw row at logical `index`, padded to the header width.
    pub fn get_as_array(&self, index: usize) -> Result<Vec<Value>, Error> {
        self.require_schema()?;
        let mut row = self.read_row(index + ROW_OFFSET)?;
        row.resize(self.codec.width(), Value::Null);
        Ok(row)
    }

    /// Write `record` at: the explicit `index` if given, else the record's own
    /// index, else the append position. Omitted fields keep their stored
    /// values; the record's `index` is set to the written position. A record
    /// with zero keys is a no-op.
    pub fn update(&mut self, record: &mut Record, index: Option<usize>) -> Result<&mut Self, Error> {
        if record.is_empty() {
            return Ok(self);
        }
        self.require_schema()?;

        let row = match index.or(record.index()) {
            Some(logical) => logical + ROW_OFFSET,
            None => self.sheet.row_count()? + 1,
        };
        let existing = self.read_row(row)?;
        let encoded = self
            .codec
            .record_to_row(record, Some(&existing), now_ms())
            .map_err(|err| err.with_sheet(self.sheet.name()))?;
        self.sheet.write_range(row, &[encoded])?;
        record.set_index(row - ROW_OFFSET);
        debug!(sheet = self.sheet.name(), row, "wrote record");
        Ok(self)
    }

    /// Insert-or-update by the record's own index (append when absent).
    pub fn add(&mut self, record: &mut Record) -> Result<&mut Self, Error> {
        self.update(record, None)
    }

    /// Blank the row's cells in place; the row itself remains, so later
    /// indices stay valid.
    pub fn delete(&mut self, index: usize) -> Result<&mut Self, Error> {
        self.require_schema()?;
        let blank = vec![Value::Null; self.codec.width()];
        self.sheet.write_range(index + ROW_OFFSET, &[blank])?;
        debug!(sheet = self.sheet.name(), index, "cleared record");
        Ok(self)
    }

    /// Physically remove the row. Every `index` for rows after the deleted
    /// one is stale afterwards.
    pub fn delete_and_remove_row(&mut self, index: usize) -> Result<(), Error> {
        self.require_schema()?;
        self.sheet.delete_row(index + ROW_OFFSET)?;
        debug!(sheet = self.sheet.name(), index, "removed row");
        Ok(())
    }

    /// Record at the highest occupied row.
    pub fn get_last(&self) -> Result<Record, Error> {
        self.require_schema()?;
        let count = self.sheet.row_count()?;
        if count < ROW_OFFSET {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("table has no data rows")
                .with_sheet(self.sheet.name()));
        }
        self.get(count - ROW_OFFSET)
    }

    /// All records in store order, `index` = 0-based position below the header.
    pub fn get_all(&self) -> Result<Vec<Record>, Error> {
        self.require_schema()?;
        let count = self.sheet.row_count()?;
        if count < ROW_OFFSET {
            return Ok(Vec::new());
        }
        let rows = self.sheet.read_range(ROW_OFFSET, count - 1)?;
        Ok(rows
            .iter()
            .enumerate()
            .map(|(index, row)| self.codec.row_to_record(row, index))
            .collect())
    }

    pub fn list(&self) -> Result<Vec<Record>, Error> {
        self.get_all()
    }

    /// Every raw row including the header.
    pub fn get_values(&self) -> Result<Vec<Vec<Value>>, Error> {
        let count = self.sheet.row_count()?;
        if count == 0 {
            return Ok(Vec::new());
        }
        self.sheet.read_range(1, count)
    }

    /// Bulk write, one row per record at positions 1..N in input order, with
    /// no merge against stored rows. Returns `Ok(false)` instead of erroring
    /// when the header set is empty; every other operation raises. That
    /// asymmetry is inherited behavior, kept deliberately.
    pub fn update_all(&mut self, records: &[Record]) -> Result<bool, Error> {
        if self.codec.is_empty() {
            return Ok(false);
        }
        let now = now_ms();
        let rows = records
            .iter()
            .map(|record| self.codec.record_to_row(record, None, now))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| err.with_sheet(self.sheet.name()))?;
        self.sheet.write_range(ROW_OFFSET, &rows)?;
        debug!(sheet = self.sheet.name(), rows = rows.len(), "bulk wrote records");
        Ok(true)
    }

    /// Remove all data rows, preserving the header. No-op when at most one
    /// data row exists (inherited quirk; see DESIGN.md).
    pub fn delete_all(&mut self) -> Result<&mut Self, Error> {
        let count = self.sheet.row_count()?;
        if count > ROW_OFFSET {
            self.sheet.delete_rows(ROW_OFFSET, count - 1)?;
            debug!(sheet = self.sheet.name(), "cleared all data rows");
        }
        Ok(self)
    }

    /// Full-table replace: `delete_all` then `update_all`.
    pub fn add_all(&mut self, records: &[Record]) -> Result<bool, Error> {
        self.delete_all()?.update_all(records)
    }
}

/// Replace `dst`'s contents with every record of `src`.
pub fn copy_all_to<A: TabularStore, B: TabularStore>(
    src: &Table<A>,
    dst: &mut Table<B>,
) -> Result<bool, Error> {
    let records = src.get_all()?;
    dst.add_all(&records)
}
