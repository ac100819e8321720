//! Interactive and piped REPL over a disk-backed [`slotdb::database::Database`].

use slotdb::database::Database;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = "slotdb_data";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let data_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    let mut db = match Database::open_disk(data_dir.clone()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("failed to open database at {}: {e}", data_dir.display());
            std::process::exit(1);
        }
    };

    if io::stdin().is_terminal() {
        run_interactive(&mut db);
    } else {
        run_piped(&mut db);
    }

    if let Err(e) = db.close() {
        eprintln!("error closing database: {e}");
    }
}

fn run_interactive(db: &mut Database) {
    println!("slotdb - a small SQL engine over a page-based storage core");
    println!("Type 'exit' to quit\n");

    loop {
        print!("slotdb> ");
        io::stdout().flush().unwrap();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).unwrap_or(0) == 0 {
            break;
        }
        let query = input.trim();

        if query.eq_ignore_ascii_case("exit") {
            println!("Goodbye!");
            break;
        }
        if query.is_empty() {
            continue;
        }

        match slotdb::run_statement(query, db) {
            Ok(result) => println!("{result}"),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}

fn run_piped(db: &mut Database) {
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return;
    }
    let query = input.trim();
    if query.is_empty() {
        return;
    }
    match slotdb::run_statement(query, db) {
        Ok(result) => println!("{result}"),
        Err(e) => eprintln!("Error: {e}"),
    }
}
