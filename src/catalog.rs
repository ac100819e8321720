//! Table definitions persisted as `catalog.json` in the data directory.
//!
//! Format: `{"<table>": {"schema": {"col": "type", ...}, "btree_order": N}}`.
//! `btree_order` is carried for forward compatibility with the on-disk
//! format; this engine's `PageBTree` fans out to whatever fits in a page
//! rather than a configurable order, so the field is written back verbatim
//! but otherwise unused.

use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BTREE_ORDER: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("table '{0}' already exists")]
    AlreadyExists(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog file {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub schema: Schema,
    pub btree_order: u32,
}

pub struct Catalog {
    path: PathBuf,
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, CatalogError> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join("catalog.json");
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&raw).map_err(|source| CatalogError::Malformed {
                path: path.clone(),
                source,
            })?
        } else {
            BTreeMap::new()
        };
        Ok(Catalog { path, entries })
    }

    fn save(&self) -> Result<(), CatalogError> {
        let json = serde_json::to_string_pretty(&self.entries).expect("catalog is always JSON-serializable");
        fs::write(&self.path, json).map_err(|source| CatalogError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn create_table(
        &mut self,
        name: &str,
        schema: Schema,
        btree_order: u32,
    ) -> Result<(), CatalogError> {
        if self.entries.contains_key(name) {
            return Err(CatalogError::AlreadyExists(name.to_string()));
        }
        self.entries
            .insert(name.to_string(), CatalogEntry { schema, btree_order });
        self.save()
    }

    pub fn get_table(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    pub fn drop_table(&mut self, name: &str) -> Result<bool, CatalogError> {
        if self.entries.remove(name).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, DataType};

    fn schema() -> Schema {
        Schema::new(vec![
            ColumnDef {
                name: "id".into(),
                data_type: DataType::Int,
            },
            ColumnDef {
                name: "name".into(),
                data_type: DataType::Text,
            },
        ])
    }

    #[test]
    fn create_then_reopen_sees_the_table() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut cat = Catalog::open(dir.path()).unwrap();
            cat.create_table("users", schema(), DEFAULT_BTREE_ORDER).unwrap();
        }
        let cat = Catalog::open(dir.path()).unwrap();
        assert_eq!(cat.list_tables(), vec!["users".to_string()]);
        assert_eq!(cat.get_table("users").unwrap().schema, schema());
    }

    #[test]
    fn duplicate_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut cat = Catalog::open(dir.path()).unwrap();
        cat.create_table("users", schema(), DEFAULT_BTREE_ORDER).unwrap();
        assert!(matches!(
            cat.create_table("users", schema(), DEFAULT_BTREE_ORDER),
            Err(CatalogError::AlreadyExists(_))
        ));
    }

    #[test]
    fn drop_removes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut cat = Catalog::open(dir.path()).unwrap();
        cat.create_table("users", schema(), DEFAULT_BTREE_ORDER).unwrap();
        assert!(cat.drop_table("users").unwrap());
        assert!(!cat.drop_table("users").unwrap());
        let reopened = Catalog::open(dir.path()).unwrap();
        assert!(reopened.list_tables().is_empty());
    }
}
