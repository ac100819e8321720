//! Top-level DDL manager: owns a set of named tables in either of two
//! modes. See SPEC_FULL.md §4.5.

use crate::catalog::{Catalog, CatalogError, DEFAULT_BTREE_ORDER};
use crate::schema::Schema;
use crate::table::{log_created, DiskTable, MemTable, Table, TableError};
use log::info;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("table '{0}' already exists")]
    AlreadyExists(String),
    #[error("table '{0}' does not exist")]
    NotFound(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Table(#[from] TableError),
}

enum Mode {
    Disk { data_dir: PathBuf, catalog: Catalog },
    Memory,
}

pub struct Database {
    mode: Mode,
    tables: HashMap<String, Box<dyn Table>>,
}

impl Database {
    pub fn open_disk(data_dir: PathBuf) -> Result<Self, DatabaseError> {
        let catalog = Catalog::open(&data_dir)?;
        let mut tables: HashMap<String, Box<dyn Table>> = HashMap::new();
        for name in catalog.list_tables() {
            let entry = catalog
                .get_table(&name)
                .expect("name came from catalog.list_tables()");
            let table = DiskTable::open(data_dir.join(&name), entry.schema.clone())?;
            tables.insert(name, Box::new(table));
        }
        info!("opened database at {}", data_dir.display());
        Ok(Database {
            mode: Mode::Disk { data_dir, catalog },
            tables,
        })
    }

    pub fn open_memory() -> Self {
        Database {
            mode: Mode::Memory,
            tables: HashMap::new(),
        }
    }

    pub fn create_table(&mut self, name: &str, schema: Schema) -> Result<(), DatabaseError> {
        if self.tables.contains_key(name) {
            return Err(DatabaseError::AlreadyExists(name.to_string()));
        }
        match &mut self.mode {
            Mode::Memory => {
                log_created(name, &schema);
                self.tables.insert(name.to_string(), Box::new(MemTable::new(schema)));
            }
            Mode::Disk { data_dir, catalog } => {
                catalog.create_table(name, schema.clone(), DEFAULT_BTREE_ORDER)?;
                let table = DiskTable::open(data_dir.join(name), schema.clone())?;
                log_created(name, &schema);
                self.tables.insert(name.to_string(), Box::new(table));
            }
        }
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<bool, DatabaseError> {
        match &mut self.mode {
            Mode::Memory => Ok(self.tables.remove(name).is_some()),
            Mode::Disk { data_dir, catalog } => {
                let existed = catalog.drop_table(name)?;
                if existed {
                    if let Some(mut table) = self.tables.remove(name) {
                        table.close()?;
                    }
                    let table_dir = data_dir.join(name);
                    std::fs::remove_dir_all(&table_dir).ok();
                    info!("dropped table '{name}'");
                }
                Ok(existed)
            }
        }
    }

    pub fn get_table(&mut self, name: &str) -> Result<&mut Box<dyn Table>, DatabaseError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DatabaseError::NotFound(name.to_string()))
    }

    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn close(&mut self) -> Result<(), DatabaseError> {
        for table in self.tables.values_mut() {
            table.close()?;
        }
        Ok(())
    }
}
