//! Purpose: Durable sheet store: one JSON document per sheet inside a workbook directory.
//! Exports: `FileWorkbook`, `FileSheet`, `SHEET_FORMAT_VERSION`.
//! Role: Reference durable implementation of the `TabularStore`/`Workbook` boundary.
//! Invariants: Mutations hold an exclusive advisory lock on the sheet file.
//! Invariants: Format version list is additive; bump only for incompatible document changes.

use crate::core::error::{Error, ErrorKind};
use crate::core::store::{TabularStore, Workbook};
use crate::core::value::Value;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const SHEET_FORMAT_VERSION: u32 = 1;
const SHEET_SUFFIX: &str = ".sheet.json";

#[derive(Debug, Deserialize, Serialize)]
struct SheetDoc {
    version: u32,
    id: u64,
    name: String,
    rows: Vec<Vec<serde_json::Value>>,
}

fn store_error(message: impl Into<String>, sheet: &str) -> Error {
    Error::new(ErrorKind::Store)
        .with_message(message)
        .with_sheet(sheet)
}

fn version_error(detected: u32, sheet: &str) -> Error {
    store_error(
        format!(
            "unsupported sheet format version {detected} (supported: {SHEET_FORMAT_VERSION})"
        ),
        sheet,
    )
}

fn parse_doc(bytes: &[u8], sheet: &str) -> Result<SheetDoc, Error> {
    let doc: SheetDoc = serde_json::from_slice(bytes)
        .map_err(|err| store_error("invalid sheet document", sheet).with_source(err))?;
    if doc.version != SHEET_FORMAT_VERSION {
        return Err(version_error(doc.version, sheet));
    }
    Ok(doc)
}

fn rows_from_doc(doc: &SheetDoc) -> Result<Vec<Vec<Value>>, Error> {
    doc.rows
        .iter()
        .map(|row| row.iter().map(Value::from_json).collect())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| err.with_sheet(&doc.name))
}

fn rows_to_doc(rows: &[Vec<Value>]) -> Vec<Vec<serde_json::Value>> {
    rows.iter()
        .map(|row| row.iter().map(Value::to_json).collect())
        .collect()
}

/// Handle to one sheet file. Every operation re-reads the document; nothing is
/// cached between calls.
#[derive(Clone, Debug)]
pub struct FileSheet {
    path: PathBuf,
    name: String,
    id: u64,
}

impl FileSheet {
    fn load_rows(&self) -> Result<Vec<Vec<Value>>, Error> {
        let mut file = File::open(&self.path)
            .map_err(|err| store_error("can not open sheet file", &self.name).with_source(err))?;
        fs2::FileExt::lock_shared(&file)
            .map_err(|err| store_error("can not lock sheet file", &self.name).with_source(err))?;
        let mut bytes = Vec::new();
        let result = file.read_to_end(&mut bytes);
        let _ = fs2::FileExt::unlock(&file);
        result.map_err(|err| store_error("can not read sheet file", &self.name).with_source(err))?;

        let doc = parse_doc(&bytes, &self.name)?;
        rows_from_doc(&doc)
    }

    /// Load-modify-store under one exclusive lock.
    fn mutate_rows(&self, apply: impl FnOnce(&mut Vec<Vec<Value>>)) -> Result<(), Error> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|err| store_error("can not open sheet file", &self.name).with_source(err))?;
        fs2::FileExt::lock_exclusive(&file)
            .map_err(|err| store_error("can not lock sheet file", &self.name).with_source(err))?;

        let result = self.mutate_locked(&mut file, apply);
        let _ = fs2::FileExt::unlock(&file);
        result
    }

    fn mutate_locked(
        &self,
        file: &mut File,
        apply: impl FnOnce(&mut Vec<Vec<Value>>),
    ) -> Result<(), Error> {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|err| store_error("can not read sheet file", &self.name).with_source(err))?;
        let doc = parse_doc(&bytes, &self.name)?;
        let mut rows = rows_from_doc(&doc)?;

        apply(&mut rows);

        let next = SheetDoc {
            version: SHEET_FORMAT_VERSION,
            id: doc.id,
            name: doc.name,
            rows: rows_to_doc(&rows),
        };
        let encoded = serde_json::to_vec(&next)
            .map_err(|err| store_error("can not encode sheet document", &self.name).with_source(err))?;

        file.set_len(0)
            .map_err(|err| store_error("can not truncate sheet file", &self.name).with_source(err))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|err| store_error("can not rewind sheet file", &self.name).with_source(err))?;
        file.write_all(&encoded)
            .map_err(|err| store_error("can not write sheet file", &self.name).with_source(err))?;
        file.flush()
            .map_err(|err| store_error("can not flush sheet file", &self.name).with_source(err))
    }
}

impl TabularStore for FileSheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn row_count(&self) -> Result<usize, Error> {
        Ok(self.load_rows()?.len())
    }

    fn header_row(&self) -> Result<Vec<Value>, Error> {
        Ok(self.load_rows()?.into_iter().next().unwrap_or_default())
    }

    fn read_range(&self, row_start: usize, row_count: usize) -> Result<Vec<Vec<Value>>, Error> {
        if row_start == 0 {
            return Err(Error::new(ErrorKind::Usage).with_message("row positions are 1-based"));
        }
        let rows = self.load_rows()?;
        let mut out = Vec::with_capacity(row_count);
        for row in row_start..row_start + row_count {
            out.push(rows.get(row - 1).cloned().unwrap_or_default());
        }
        Ok(out)
    }

    fn write_range(&mut self, row_start: usize, new_rows: &[Vec<Value>]) -> Result<(), Error> {
        if row_start == 0 {
            return Err(Error::new(ErrorKind::Usage).with_message("row positions are 1-based"));
        }
        self.mutate_rows(|rows| {
            let end = row_start - 1 + new_rows.len();
            if rows.len() < end {
                rows.resize(end, Vec::new());
            }
            for (offset, row) in new_rows.iter().enumerate() {
                rows[row_start - 1 + offset] = row.clone();
            }
        })
    }

    fn delete_rows(&mut self, row_start: usize, row_count: usize) -> Result<(), Error> {
        if row_start == 0 {
            return Err(Error::new(ErrorKind::Usage).with_message("row positions are 1-based"));
        }
        self.mutate_rows(|rows| {
            let start = (row_start - 1).min(rows.len());
            let end = (start + row_count).min(rows.len());
            let _ = rows.drain(start..end);
        })
    }
}

/// A directory of sheet files. Sheet ids are assigned at creation and live
/// inside the documents, so lookup by id scans the directory.
#[derive(Clone, Debug)]
pub struct FileWorkbook {
    dir: PathBuf,
}

impl FileWorkbook {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| {
            Error::new(ErrorKind::Connect)
                .with_message(format!("can not open workbook {}", dir.display()))
                .with_source(err)
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn sheet_paths(&self) -> Result<Vec<PathBuf>, Error> {
        let entries = fs::read_dir(&self.dir).map_err(|err| {
            Error::new(ErrorKind::Store)
                .with_message(format!("can not read workbook {}", self.dir.display()))
                .with_source(err)
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| {
                Error::new(ErrorKind::Store)
                    .with_message("can not scan workbook")
                    .with_source(err)
            })?;
            let path = entry.path();
            let is_sheet = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(SHEET_SUFFIX));
            if is_sheet {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn load_doc(path: &Path) -> Result<SheetDoc, Error> {
        let bytes = fs::read(path).map_err(|err| {
            Error::new(ErrorKind::Store)
                .with_message(format!("can not read {}", path.display()))
                .with_source(err)
        })?;
        parse_doc(&bytes, &path.display().to_string())
    }
}

impl Workbook for FileWorkbook {
    type Sheet = FileSheet;

    fn open_sheet(&self, id: u64) -> Result<FileSheet, Error> {
        for path in self.sheet_paths()? {
            let doc = Self::load_doc(&path)?;
            if doc.id == id {
                return Ok(FileSheet {
                    path,
                    name: doc.name,
                    id: doc.id,
                });
            }
        }
        Err(Error::new(ErrorKind::Connect).with_message(format!("can not find sheet #{id}")))
    }

    fn create_sheet(&mut self, name: &str) -> Result<FileSheet, Error> {
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("sheet names must be non-empty and contain no path separators")
                .with_sheet(name));
        }
        let path = self.dir.join(format!("{name}{SHEET_SUFFIX}"));
        if path.exists() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("sheet name already exists")
                .with_sheet(name));
        }

        let mut next_id = 0u64;
        for existing in self.sheet_paths()? {
            let doc = Self::load_doc(&existing)?;
            next_id = next_id.max(doc.id + 1);
        }

        let doc = SheetDoc {
            version: SHEET_FORMAT_VERSION,
            id: next_id,
            name: name.to_string(),
            rows: Vec::new(),
        };
        let encoded = serde_json::to_vec(&doc)
            .map_err(|err| store_error("can not encode sheet document", name).with_source(err))?;
        fs::write(&path, encoded)
            .map_err(|err| store_error("can not create sheet file", name).with_source(err))?;

        Ok(FileSheet {
            path,
            name: doc.name,
            id: doc.id,
        })
    }
}
