//! Purpose: Additive schema evolution and new-table provisioning.
//! Exports: `migrate`, `create_table`, `ColumnSet`.
//! Role: Rewrites the header row; never removes or reorders existing columns.
//! Invariants: A migrated table is a fresh `Table` value (header caches are not mutated in place).
//! Invariants: Provisioned tables always lead with the three reserved columns.

use crate::core::codec::{CREATED_AT, LOCK_VERSION, UPDATED_AT};
use crate::core::error::Error;
use crate::core::record::Record;
use crate::core::store::{TabularStore, Workbook};
use crate::core::table::Table;
use crate::core::value::Value;
use tracing::debug;

/// Migration input: a set of candidate column names. Implemented for name
/// sequences and for records (whose keys stand in for a schema shape).
pub trait ColumnSet {
    fn column_names(&self) -> Vec<String>;
}

impl ColumnSet for [String] {
    fn column_names(&self) -> Vec<String> {
        self.to_vec()
    }
}

impl ColumnSet for Vec<String> {
    fn column_names(&self) -> Vec<String> {
        self.clone()
    }
}

impl ColumnSet for [&str] {
    fn column_names(&self) -> Vec<String> {
        self.iter().map(|name| (*name).to_string()).collect()
    }
}

impl<const N: usize> ColumnSet for [&str; N] {
    fn column_names(&self) -> Vec<String> {
        self.as_slice().column_names()
    }
}

impl ColumnSet for Record {
    fn column_names(&self) -> Vec<String> {
        Record::column_names(self)
    }
}

/// Extend the table's header set with any names from `columns` not already
/// present. Existing columns keep their order and positions. Returns a fresh
/// table bound to the same sheet, since the header set is cached at connect
/// time.
pub fn migrate<S: TabularStore>(
    table: Table<S>,
    columns: &(impl ColumnSet + ?Sized),
) -> Result<Table<S>, Error> {
    let mut sheet = table.into_sheet();
    let mut names: Vec<String> = sheet
        .header_row()?
        .iter()
        .map(Value::display_string)
        .collect();

    let before = names.len();
    for candidate in columns.column_names() {
        if !names.contains(&candidate) {
            names.push(candidate);
        }
    }

    if names.len() > before {
        let header_row = names.iter().map(|name| Value::text(name.as_str())).collect::<Vec<_>>();
        sheet.write_range(1, &[header_row])?;
        debug!(
            sheet = sheet.name(),
            added = names.len() - before,
            "extended header set"
        );
    }

    Table::connect(sheet)
}

/// Provision a new sheet whose header row is the three reserved columns
/// followed by `schema`, and connect a table to it.
pub fn create_table<W: Workbook>(
    workbook: &mut W,
    name: &str,
    schema: &(impl ColumnSet + ?Sized),
) -> Result<Table<W::Sheet>, Error> {
    let mut sheet = workbook.create_sheet(name)?;

    let mut names = vec![
        CREATED_AT.to_string(),
        UPDATED_AT.to_string(),
        LOCK_VERSION.to_string(),
    ];
    for candidate in schema.column_names() {
        if !names.contains(&candidate) {
            names.push(candidate);
        }
    }

    let header_row = names.iter().map(|name| Value::text(name.as_str())).collect::<Vec<_>>();
    sheet.write_range(1, &[header_row])?;
    debug!(sheet = name, columns = names.len(), "provisioned table");
    Table::connect(sheet)
}

#[cfg(test)]
mod tests {
    use super::{create_table, migrate};
    use crate::core::codec::{CREATED_AT, LOCK_VERSION, UPDATED_AT};
    use crate::core::record::Record;
    use crate::core::store::{MemSheet, MemWorkbook, TabularStore};
    use crate::core::table::Table;
    use crate::core::value::Value;

    #[test]
    fn migrate_appends_only_new_columns() {
        let sheet = MemSheet::with_header("people", 1, &["name", "age"]);
        let table = Table::connect(sheet).expect("connect");

        let migrated = migrate(table, &["age", "email"]).expect("migrate");
        assert_eq!(
            migrated.headers(),
            vec!["name".to_string(), "age".to_string(), "email".to_string()]
        );
    }

    #[test]
    fn migrate_preserves_existing_rows() {
        let sheet = MemSheet::with_header("people", 1, &["name"]);
        let mut table = Table::connect(sheet).expect("connect");
        let _ = table.add(&mut Record::new().with("name", "Alice")).expect("add");

        let migrated = migrate(table, &["email"]).expect("migrate");
        let record = migrated.get(0).expect("get");
        assert_eq!(record.get("name"), Some(&Value::text("Alice")));
        assert_eq!(record.get("email"), Some(&Value::Null));
    }

    #[test]
    fn migrate_accepts_a_record_as_schema_shape() {
        let sheet = MemSheet::with_header("people", 1, &["name"]);
        let table = Table::connect(sheet).expect("connect");

        let shape = Record::new().with("email", "x@example.com").with("name", "ignored");
        let migrated = migrate(table, &shape).expect("migrate");
        assert_eq!(migrated.headers(), vec!["name".to_string(), "email".to_string()]);
    }

    #[test]
    fn migrate_without_new_columns_leaves_header_untouched() {
        let sheet = MemSheet::with_header("people", 1, &["name"]);
        let table = Table::connect(sheet).expect("connect");
        let migrated = migrate(table, &["name"]).expect("migrate");
        assert_eq!(migrated.headers(), vec!["name".to_string()]);
    }

    #[test]
    fn create_table_leads_with_reserved_columns() {
        let mut workbook = MemWorkbook::new();
        let table = create_table(&mut workbook, "people", &["name", "age"]).expect("create");

        assert_eq!(
            table.headers(),
            vec![
                CREATED_AT.to_string(),
                UPDATED_AT.to_string(),
                LOCK_VERSION.to_string(),
                "name".to_string(),
                "age".to_string(),
            ]
        );
        assert_eq!(table.sheet().row_count().expect("count"), 1);
    }

    #[test]
    fn created_table_is_immediately_usable() {
        let mut workbook = MemWorkbook::new();
        let mut table = create_table(&mut workbook, "people", &["name"]).expect("create");
        let _ = table.add(&mut Record::new().with("name", "Alice")).expect("add");
        assert_eq!(table.get_all().expect("all").len(), 1);
    }
}
