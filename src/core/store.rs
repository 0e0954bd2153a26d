//! Purpose: Boundary contract to the backing tabular store, plus the in-memory reference store.
//! Exports: `TabularStore`, `Workbook`, `MemWorkbook`, `MemSheet`.
//! Role: The only seam `table`/`migrate` use to reach storage; row 1 is always the header.
//! Invariants: Row positions are 1-based; reads beyond the occupied region yield empty rows.
//! Invariants: Store failures surface as `Store` errors; the core never retries.

use crate::core::error::{Error, ErrorKind};
use crate::core::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Minimal contract the record layer needs from a backing sheet. Stores model
/// an unbounded grid: writing past the occupied region extends it, reading
/// past it yields empty rows.
pub trait TabularStore {
    /// Human-readable sheet name, part of diff entry keys.
    fn name(&self) -> &str;

    /// Stable numeric sheet identity, part of diff entry keys.
    fn id(&self) -> u64;

    /// Number of occupied rows, header included. Zero for a blank sheet.
    fn row_count(&self) -> Result<usize, Error>;

    fn header_row(&self) -> Result<Vec<Value>, Error>;

    fn read_range(&self, row_start: usize, row_count: usize) -> Result<Vec<Vec<Value>>, Error>;

    fn write_range(&mut self, row_start: usize, rows: &[Vec<Value>]) -> Result<(), Error>;

    /// Remove rows, shifting later rows up.
    fn delete_rows(&mut self, row_start: usize, row_count: usize) -> Result<(), Error>;

    fn delete_row(&mut self, row: usize) -> Result<(), Error> {
        self.delete_rows(row, 1)
    }
}

/// Sheet provisioning and lookup, mirroring a workbook that holds many sheets.
pub trait Workbook {
    type Sheet: TabularStore;

    /// Locate an existing sheet by id. Absence is a `Connect` error.
    fn open_sheet(&self, id: u64) -> Result<Self::Sheet, Error>;

    /// Provision a blank sheet under a fresh id.
    fn create_sheet(&mut self, name: &str) -> Result<Self::Sheet, Error>;
}

fn check_row_start(row_start: usize) -> Result<(), Error> {
    if row_start == 0 {
        return Err(Error::new(ErrorKind::Usage).with_message("row positions are 1-based"));
    }
    Ok(())
}

/// In-memory sheet. Handles share the underlying grid, so a sheet opened twice
/// from the same workbook observes the same rows.
#[derive(Clone, Debug)]
pub struct MemSheet {
    name: String,
    id: u64,
    rows: Rc<RefCell<Vec<Vec<Value>>>>,
}

impl MemSheet {
    pub fn new(name: impl Into<String>, id: u64) -> Self {
        Self {
            name: name.into(),
            id,
            rows: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Convenience for tests: a sheet whose first row is already a header.
    pub fn with_header(name: impl Into<String>, id: u64, headers: &[&str]) -> Self {
        let sheet = Self::new(name, id);
        let header_row = headers.iter().map(|h| Value::text(*h)).collect::<Vec<_>>();
        sheet.rows.borrow_mut().push(header_row);
        sheet
    }
}

impl TabularStore for MemSheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn row_count(&self) -> Result<usize, Error> {
        Ok(self.rows.borrow().len())
    }

    fn header_row(&self) -> Result<Vec<Value>, Error> {
        Ok(self.rows.borrow().first().cloned().unwrap_or_default())
    }

    fn read_range(&self, row_start: usize, row_count: usize) -> Result<Vec<Vec<Value>>, Error> {
        check_row_start(row_start)?;
        let rows = self.rows.borrow();
        let mut out = Vec::with_capacity(row_count);
        for row in row_start..row_start + row_count {
            out.push(rows.get(row - 1).cloned().unwrap_or_default());
        }
        Ok(out)
    }

    fn write_range(&mut self, row_start: usize, new_rows: &[Vec<Value>]) -> Result<(), Error> {
        check_row_start(row_start)?;
        let mut rows = self.rows.borrow_mut();
        let end = row_start - 1 + new_rows.len();
        if rows.len() < end {
            rows.resize(end, Vec::new());
        }
        for (offset, row) in new_rows.iter().enumerate() {
            rows[row_start - 1 + offset] = row.clone();
        }
        Ok(())
    }

    fn delete_rows(&mut self, row_start: usize, row_count: usize) -> Result<(), Error> {
        check_row_start(row_start)?;
        let mut rows = self.rows.borrow_mut();
        let start = (row_start - 1).min(rows.len());
        let end = (start + row_count).min(rows.len());
        let _ = rows.drain(start..end);
        Ok(())
    }
}

/// In-memory workbook: a registry of `MemSheet` handles with fresh-id assignment.
#[derive(Debug, Default)]
pub struct MemWorkbook {
    sheets: Vec<MemSheet>,
    next_id: u64,
}

impl MemWorkbook {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Workbook for MemWorkbook {
    type Sheet = MemSheet;

    fn open_sheet(&self, id: u64) -> Result<MemSheet, Error> {
        self.sheets
            .iter()
            .find(|sheet| sheet.id == id)
            .cloned()
            .ok_or_else(|| {
                Error::new(ErrorKind::Connect).with_message(format!("can not find sheet #{id}"))
            })
    }

    fn create_sheet(&mut self, name: &str) -> Result<MemSheet, Error> {
        if self.sheets.iter().any(|sheet| sheet.name == name) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("sheet name already exists")
                .with_sheet(name));
        }
        let sheet = MemSheet::new(name, self.next_id);
        self.next_id += 1;
        self.sheets.push(sheet.clone());
        Ok(sheet)
    }
}
