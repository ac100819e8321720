//! S2 — persistence: close a disk-backed database and verify a fresh
//! process sees exactly what was left behind.

use slotdb::database::Database;
use slotdb::schema::{ColumnDef, DataType, Schema};
use slotdb::value::Value;

fn schema() -> Schema {
    Schema::new(vec![
        ColumnDef { name: "id".into(), data_type: DataType::Int },
        ColumnDef { name: "v".into(), data_type: DataType::Text },
    ])
}

#[test]
fn reopen_after_close_preserves_rows_and_deletes() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut db = Database::open_disk(dir.path().to_path_buf()).unwrap();
        db.create_table("t", schema()).unwrap();
        let table = db.get_table("t").unwrap();
        for id in 1..=10i64 {
            table.insert(vec![Value::Int(id), Value::Text("row".into())]).unwrap();
        }
        assert!(table.delete(5).unwrap());
        db.close().unwrap();
    }

    let mut db = Database::open_disk(dir.path().to_path_buf()).unwrap();
    assert_eq!(db.list_tables(), vec!["t".to_string()]);

    let table = db.get_table("t").unwrap();
    let mut ids: Vec<i64> = table
        .select_all()
        .unwrap()
        .iter()
        .map(|r| r[0].as_int().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3, 4, 6, 7, 8, 9, 10]);
    assert_eq!(table.select(5).unwrap(), None);
}

#[test]
fn reopen_sees_schema_and_rejects_second_create() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut db = Database::open_disk(dir.path().to_path_buf()).unwrap();
        db.create_table("t", schema()).unwrap();
    }
    let mut db = Database::open_disk(dir.path().to_path_buf()).unwrap();
    assert_eq!(db.get_table("t").unwrap().schema(), &schema());
    assert!(db.create_table("t", schema()).is_err());
}
