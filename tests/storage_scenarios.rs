//! End-to-end scenarios against the `Table` trait directly (no SQL layer),
//! covering the concrete scenarios from SPEC_FULL.md §8.

use slotdb::schema::{ColumnDef, DataType, Schema};
use slotdb::table::{DiskTable, MemTable, Table};
use slotdb::value::Value;

fn users_schema() -> Schema {
    Schema::new(vec![
        ColumnDef { name: "id".into(), data_type: DataType::Int },
        ColumnDef { name: "name".into(), data_type: DataType::Text },
    ])
}

fn row(id: i64, name: &str) -> Vec<Value> {
    vec![Value::Int(id), Value::Text(name.to_string())]
}

/// S1 — basic CRUD round trip, run against both backends since the
/// contract is meant to be identical.
fn s1_basic_crud(mut table: impl Table) {
    table.insert(row(1, "Alice")).unwrap();
    table.insert(row(2, "Bob")).unwrap();
    table.insert(row(3, "Charlie")).unwrap();

    assert_eq!(table.select(2).unwrap(), Some(row(2, "Bob")));

    assert!(table.update(1, row(1, "Al")).unwrap());
    assert_eq!(table.select(1).unwrap(), Some(row(1, "Al")));

    assert!(table.delete(3).unwrap());

    let mut all = table.select_all().unwrap();
    all.sort_by_key(|r| r[0].as_int().unwrap());
    assert_eq!(all, vec![row(1, "Al"), row(2, "Bob")]);
}

#[test]
fn s1_basic_crud_disk() {
    let dir = tempfile::tempdir().unwrap();
    s1_basic_crud(DiskTable::open(dir.path(), users_schema()).unwrap());
}

#[test]
fn s1_basic_crud_memory() {
    s1_basic_crud(MemTable::new(users_schema()));
}

/// S5 — range scan across multiple heap pages and B+Tree leaves.
#[test]
fn s5_range_scan_across_multiple_leaves() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Schema::new(vec![
        ColumnDef { name: "id".into(), data_type: DataType::Int },
        ColumnDef { name: "val".into(), data_type: DataType::Text },
    ]);
    let mut table = DiskTable::open(dir.path(), schema).unwrap();

    let filler = "x".repeat(30);
    for i in 0..200i64 {
        table.insert(vec![Value::Int(i), Value::Text(filler.clone())]).unwrap();
    }

    let rows = table.select_range(50, 149).unwrap();
    assert_eq!(rows.len(), 100);
    let ids: Vec<i64> = rows.iter().map(|r| r[0].as_int().unwrap()).collect();
    assert_eq!(ids, (50..=149).collect::<Vec<_>>());
}

/// S6 — an oversize update is rejected and leaves the row untouched.
#[test]
fn s6_oversize_update_rejected_on_disk() {
    use slotdb::table::TableError;

    let dir = tempfile::tempdir().unwrap();
    let mut table = DiskTable::open(dir.path(), users_schema()).unwrap();
    table.insert(row(1, "Al")).unwrap();

    let err = table.update(1, row(1, &"A".repeat(1000))).unwrap_err();
    assert!(matches!(err, TableError::Heap(_)));

    assert_eq!(table.select(1).unwrap(), Some(row(1, "Al")));
}

/// The in-memory variant has no oversize ceiling: growing updates succeed.
#[test]
fn mem_table_update_has_no_oversize_ceiling() {
    let mut table = MemTable::new(users_schema());
    table.insert(row(1, "Al")).unwrap();
    assert!(table.update(1, row(1, &"A".repeat(1000))).unwrap());
    assert_eq!(table.select(1).unwrap(), Some(row(1, &"A".repeat(1000))));
}

/// S4 (table-level) — deletes that force repeated B+Tree rebalancing leave
/// every surviving key findable through the table API.
#[test]
fn s4_delete_with_borrow_and_merge_at_table_level() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Schema::new(vec![ColumnDef { name: "id".into(), data_type: DataType::Int }]);
    let mut table = DiskTable::open(dir.path(), schema).unwrap();

    for k in 1..=400i64 {
        table.insert(vec![Value::Int(k)]).unwrap();
    }
    for k in [200, 201, 202, 203, 204, 205, 206, 207] {
        assert!(table.delete(k).unwrap());
        for probe in 1..=400i64 {
            let expected_present = !(200..=k).contains(&probe);
            assert_eq!(table.select(probe).unwrap().is_some(), expected_present);
        }
    }
}

#[test]
fn disk_table_rejects_duplicate_and_missing_key() {
    use slotdb::table::TableError;

    let dir = tempfile::tempdir().unwrap();
    let mut table = DiskTable::open(dir.path(), users_schema()).unwrap();
    table.insert(row(1, "Alice")).unwrap();
    assert!(matches!(
        table.insert(row(1, "Again")),
        Err(TableError::DuplicateKey(1))
    ));

    let missing = vec![];
    assert!(matches!(
        table.insert(missing),
        Err(TableError::ColumnCountMismatch { .. })
    ));
}
