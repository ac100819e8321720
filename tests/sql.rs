//! End-to-end tests that drive the storage core entirely through the SQL
//! front end: lexer -> parser -> executor -> `Database`.

use slotdb::database::Database;
use slotdb::run_statement;

fn run(db: &mut Database, sql: &str) -> Result<String, String> {
    run_statement(sql, db)
}

#[test]
fn create_insert_select_update_delete_round_trip() {
    let mut db = Database::open_memory();
    run(&mut db, "CREATE TABLE users (id INT, name TEXT)").unwrap();
    run(&mut db, "INSERT INTO users VALUES (1, 'Alice'), (2, 'Bob'), (3, 'Charlie')").unwrap();

    let out = run(&mut db, "SELECT * FROM users WHERE id = 2").unwrap();
    assert!(out.contains("Bob"));

    assert_eq!(
        run(&mut db, "UPDATE users SET name = 'Al' WHERE id = 1").unwrap(),
        "1 row(s) updated"
    );
    assert!(run(&mut db, "SELECT * FROM users WHERE id = 1").unwrap().contains("Al"));

    assert_eq!(run(&mut db, "DELETE FROM users WHERE id = 3").unwrap(), "1 row(s) deleted");
    let all = run(&mut db, "SELECT * FROM users").unwrap();
    assert!(!all.contains("Charlie"));
    assert_eq!(all.lines().skip(2).count(), 2);
}

#[test]
fn insert_with_explicit_column_order() {
    let mut db = Database::open_memory();
    run(&mut db, "CREATE TABLE users (id INT, name TEXT, age INT)").unwrap();
    run(&mut db, "INSERT INTO users (name, age, id) VALUES ('Alice', 30, 1)").unwrap();

    let out = run(&mut db, "SELECT id, name, age FROM users").unwrap();
    let data_line = out.lines().nth(2).unwrap();
    assert_eq!(data_line, "1\tAlice\t30\t");
}

#[test]
fn where_with_and_or_not_and_comparisons() {
    let mut db = Database::open_memory();
    run(&mut db, "CREATE TABLE users (id INT, age INT)").unwrap();
    for (id, age) in [(1, 17), (2, 25), (3, 40), (4, 65)] {
        run(&mut db, &format!("INSERT INTO users VALUES ({id}, {age})")).unwrap();
    }

    let adults = run(&mut db, "SELECT id FROM users WHERE age >= 18 AND age < 65").unwrap();
    let ids: Vec<&str> = adults.lines().skip(2).collect();
    assert_eq!(ids, vec!["2\t", "3\t"]);

    let not_minor = run(&mut db, "SELECT id FROM users WHERE NOT age < 18").unwrap();
    assert_eq!(not_minor.lines().skip(2).count(), 3);
}

#[test]
fn like_pattern_matching() {
    let mut db = Database::open_memory();
    run(&mut db, "CREATE TABLE users (id INT, name TEXT)").unwrap();
    run(&mut db, "INSERT INTO users VALUES (1, 'Alice'), (2, 'Alan'), (3, 'Bob')").unwrap();

    let out = run(&mut db, "SELECT name FROM users WHERE name LIKE 'Al%'").unwrap();
    assert!(out.contains("Alice"));
    assert!(out.contains("Alan"));
    assert!(!out.contains("Bob"));

    let single = run(&mut db, "SELECT name FROM users WHERE name LIKE 'B_b'").unwrap();
    assert!(single.contains("Bob"));
}

#[test]
fn order_by_limit_and_offset() {
    let mut db = Database::open_memory();
    run(&mut db, "CREATE TABLE nums (id INT, v INT)").unwrap();
    for i in 1..=5i64 {
        run(&mut db, &format!("INSERT INTO nums VALUES ({i}, {})", 10 - i)).unwrap();
    }
    let out = run(&mut db, "SELECT id FROM nums ORDER BY v ASC LIMIT 2 OFFSET 1").unwrap();
    let ids: Vec<&str> = out.lines().skip(2).collect();
    assert_eq!(ids, vec!["4\t", "3\t"]);
}

#[test]
fn duplicate_primary_key_is_rejected() {
    let mut db = Database::open_memory();
    run(&mut db, "CREATE TABLE users (id INT, name TEXT)").unwrap();
    run(&mut db, "INSERT INTO users VALUES (1, 'Alice')").unwrap();
    assert!(run(&mut db, "INSERT INTO users VALUES (1, 'Again')").is_err());
}

#[test]
fn drop_table_then_query_is_an_error() {
    let mut db = Database::open_memory();
    run(&mut db, "CREATE TABLE t (id INT)").unwrap();
    assert_eq!(run(&mut db, "DROP TABLE t").unwrap(), "Table 't' dropped");
    assert!(run(&mut db, "SELECT * FROM t").is_err());
    assert!(run(&mut db, "DROP TABLE t").is_err());
}

#[test]
fn disk_backed_sql_session_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut db = Database::open_disk(dir.path().to_path_buf()).unwrap();
        run(&mut db, "CREATE TABLE users (id INT, name TEXT)").unwrap();
        run(&mut db, "INSERT INTO users VALUES (1, 'Alice'), (2, 'Bob')").unwrap();
        db.close().unwrap();
    }
    let mut db = Database::open_disk(dir.path().to_path_buf()).unwrap();
    let out = run(&mut db, "SELECT * FROM users WHERE id = 2").unwrap();
    assert!(out.contains("Bob"));
}
