//! Purpose: Symmetric two-table diff under a configurable equality policy.
//! Exports: `diff`, `DiffOptions`, `DiffEntry`, `DiffKind`.
//! Role: Reads both tables fully and compares record sets in memory.
//! Invariants: Both directions run independently over the full cross product.
//! Invariants: `only` takes precedence when both options are set.

use crate::core::error::Error;
use crate::core::record::Record;
use crate::core::store::TabularStore;
use crate::core::table::Table;
use crate::core::value::{Value, cells_equal};
use serde::Serialize;

/// Equality scope: exclude one column, or compare one column only.
#[derive(Clone, Debug, Default)]
pub struct DiffOptions {
    pub without: Option<String>,
    pub only: Option<String>,
}

impl DiffOptions {
    pub fn without(column: impl Into<String>) -> Self {
        Self {
            without: Some(column.into()),
            only: None,
        }
    }

    pub fn only(column: impl Into<String>) -> Self {
        Self {
            without: None,
            only: Some(column.into()),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Add,
    Delete,
}

/// One reported difference. `index` is the composite key
/// `"<position>@<tableName>[#<tableId>]"` identifying the record's origin.
#[derive(Clone, Debug, Serialize)]
pub struct DiffEntry {
    pub index: String,
    pub diff: DiffKind,
    pub data: Record,
}

/// Records of `a` with no equal counterpart in `b` are reported as deletes,
/// records of `b` with no counterpart in `a` as adds. A record that differs
/// from all counterparts in both directions therefore produces both entries;
/// this is not a keyed symmetric difference.
pub fn diff<A: TabularStore, B: TabularStore>(
    a: &Table<A>,
    b: &Table<B>,
    options: &DiffOptions,
) -> Result<Vec<DiffEntry>, Error> {
    let a_records = a.get_all()?;
    let b_records = b.get_all()?;
    let mut entries = Vec::new();

    for (position, record) in a_records.iter().enumerate() {
        let matched = b_records
            .iter()
            .any(|other| records_equal(record, other, options));
        if !matched {
            entries.push(DiffEntry {
                index: entry_key(position, a.name(), a.id()),
                diff: DiffKind::Delete,
                data: record.clone(),
            });
        }
    }

    for (position, record) in b_records.iter().enumerate() {
        let matched = a_records
            .iter()
            .any(|other| records_equal(record, other, options));
        if !matched {
            entries.push(DiffEntry {
                index: entry_key(position, b.name(), b.id()),
                diff: DiffKind::Add,
                data: record.clone(),
            });
        }
    }

    Ok(entries)
}

fn entry_key(position: usize, name: &str, id: u64) -> String {
    format!("{position}@{name}[#{id}]")
}

/// The probe record's columns drive the comparison; `_index` never participates.
fn records_equal(probe: &Record, other: &Record, options: &DiffOptions) -> bool {
    if let Some(only) = &options.only {
        let ours = probe.get(only).unwrap_or(&Value::Null);
        let theirs = other.get(only).unwrap_or(&Value::Null);
        return cells_equal(ours, theirs);
    }

    for (column, value) in probe {
        if options.without.as_deref() == Some(column.as_str()) {
            continue;
        }
        let theirs = other.get(column).unwrap_or(&Value::Null);
        if !cells_equal(value, theirs) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::{DiffKind, DiffOptions, diff};
    use crate::core::record::Record;
    use crate::core::store::MemSheet;
    use crate::core::table::Table;
    use crate::core::value::Value;

    const HEADERS: [&str; 2] = ["name", "age"];

    fn table(name: &str, id: u64, rows: &[(&str, i64)]) -> Table<MemSheet> {
        let mut table =
            Table::connect(MemSheet::with_header(name, id, &HEADERS)).expect("connect");
        for (person, age) in rows {
            let _ = table
                .add(&mut Record::new().with("name", *person).with("age", *age))
                .expect("add");
        }
        table
    }

    #[test]
    fn table_against_itself_is_empty_under_every_option() {
        let t = table("people", 1, &[("Alice", 30), ("Bob", 40)]);
        for options in [
            DiffOptions::default(),
            DiffOptions::without("age"),
            DiffOptions::only("name"),
        ] {
            assert!(diff(&t, &t, &options).expect("diff").is_empty());
        }
    }

    #[test]
    fn single_field_change_yields_one_delete_and_one_add() {
        let a = table("people", 1, &[("Alice", 30), ("Bob", 40)]);
        let b = table("people-v2", 2, &[("Alice", 31), ("Bob", 40)]);

        let entries = diff(&a, &b, &DiffOptions::default()).expect("diff");
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].diff, DiffKind::Delete);
        assert_eq!(entries[0].index, "0@people[#1]");
        assert_eq!(entries[0].data.get("age"), Some(&Value::Number(30.0)));

        assert_eq!(entries[1].diff, DiffKind::Add);
        assert_eq!(entries[1].index, "0@people-v2[#2]");
        assert_eq!(entries[1].data.get("age"), Some(&Value::Number(31.0)));
    }

    #[test]
    fn without_suppresses_the_changed_field() {
        let a = table("people", 1, &[("Alice", 30)]);
        let b = table("people", 2, &[("Alice", 31)]);
        assert!(diff(&a, &b, &DiffOptions::without("age")).expect("diff").is_empty());
    }

    #[test]
    fn only_isolates_a_single_field() {
        let a = table("people", 1, &[("Alice", 30)]);
        let b = table("people", 2, &[("Alice", 31)]);

        assert!(diff(&a, &b, &DiffOptions::only("name")).expect("diff").is_empty());
        assert_eq!(diff(&a, &b, &DiffOptions::only("age")).expect("diff").len(), 2);
    }

    #[test]
    fn only_wins_when_both_options_are_set() {
        let a = table("people", 1, &[("Alice", 30)]);
        let b = table("people", 2, &[("Alice", 31)]);
        let both = DiffOptions {
            without: Some("age".to_string()),
            only: Some("age".to_string()),
        };
        assert_eq!(diff(&a, &b, &both).expect("diff").len(), 2);
    }

    #[test]
    fn disjoint_tables_report_everything() {
        let a = table("left", 1, &[("Alice", 30)]);
        let b = table("right", 2, &[("Bob", 40)]);
        let entries = diff(&a, &b, &DiffOptions::default()).expect("diff");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].diff, DiffKind::Delete);
        assert_eq!(entries[1].diff, DiffKind::Add);
    }

    #[test]
    fn entries_serialize_with_lowercase_kind() {
        let a = table("left", 1, &[("Alice", 30)]);
        let b = table("right", 2, &[]);
        let entries = diff(&a, &b, &DiffOptions::default()).expect("diff");
        let json = serde_json::to_value(&entries).expect("serialize");
        assert_eq!(json[0]["diff"], "delete");
        assert_eq!(json[0]["index"], "0@left[#1]");
        assert_eq!(json[0]["data"]["name"], "Alice");
        assert_eq!(json[0]["data"]["_index"], 0);
    }
}
