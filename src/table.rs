//! The table abstraction: a schema plus a primary-key index over row
//! storage, in either of two backends.
//!
//! `DiskTable` persists to `heap.db` + `pk.idx` under a per-table directory
//! (§4.2, §4.3). `MemTable` is the same contract kept entirely in RAM, for
//! callers that don't need durability. Both only support an `Int` primary
//! key, since `PageBTree` only indexes signed 64-bit integers.

use crate::btree::{BTreeError, PageBTree};
use crate::heap::{HeapError, HeapFile, Rid};
use crate::schema::Schema;
use crate::value::{Row, Value};
use log::info;
use std::collections::BTreeMap as SortedMap;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("row is missing its primary key column '{0}'")]
    MissingPrimaryKey(String),
    #[error("primary key column '{0}' must be an integer, got {1}")]
    WrongKeyType(String, Value),
    #[error("duplicate primary key: {0}")]
    DuplicateKey(i64),
    #[error("row has {actual} columns, schema has {expected}")]
    ColumnCountMismatch { expected: usize, actual: usize },
    #[error("cannot change the primary key via update; delete and re-insert instead")]
    PrimaryKeyImmutable,
    #[error(transparent)]
    Heap(#[from] HeapError),
    #[error(transparent)]
    BTree(#[from] BTreeError),
}

fn primary_key_of(schema: &Schema, row: &[Value]) -> Result<i64, TableError> {
    let pk_name = schema.primary_key_name().unwrap_or("?").to_string();
    let value = row.first().ok_or(TableError::MissingPrimaryKey(pk_name.clone()))?;
    value
        .as_int()
        .ok_or_else(|| TableError::WrongKeyType(pk_name.clone(), value.clone()))
}

fn check_arity(schema: &Schema, row: &[Value]) -> Result<(), TableError> {
    if row.len() != schema.len() {
        return Err(TableError::ColumnCountMismatch {
            expected: schema.len(),
            actual: row.len(),
        });
    }
    Ok(())
}

/// Shared DML surface for disk- and memory-backed tables.
pub trait Table {
    fn schema(&self) -> &Schema;
    fn insert(&mut self, row: Row) -> Result<(), TableError>;
    fn select(&mut self, pk: i64) -> Result<Option<Row>, TableError>;
    fn select_range(&mut self, low: i64, high: i64) -> Result<Vec<Row>, TableError>;
    fn select_all(&mut self) -> Result<Vec<Row>, TableError>;
    fn update(&mut self, pk: i64, row: Row) -> Result<bool, TableError>;
    fn delete(&mut self, pk: i64) -> Result<bool, TableError>;
    fn row_count(&mut self) -> Result<usize, TableError>;

    /// Flush any backing storage. A no-op for in-memory tables.
    fn close(&mut self) -> Result<(), TableError> {
        Ok(())
    }
}

pub struct DiskTable {
    schema: Schema,
    heap: HeapFile,
    index: PageBTree,
}

impl DiskTable {
    pub fn open<P: AsRef<Path>>(table_dir: P, schema: Schema) -> Result<Self, TableError> {
        let dir = table_dir.as_ref();
        std::fs::create_dir_all(dir).ok();
        let heap = HeapFile::open(dir.join("heap.db"))?;
        let index = PageBTree::open(dir.join("pk.idx"))?;
        Ok(DiskTable { schema, heap, index })
    }
}

impl Table for DiskTable {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn insert(&mut self, row: Row) -> Result<(), TableError> {
        check_arity(&self.schema, &row)?;
        let pk = primary_key_of(&self.schema, &row)?;
        if self.index.search(pk)?.is_some() {
            return Err(TableError::DuplicateKey(pk));
        }
        let rid = self.heap.insert(&row)?;
        self.index.insert(pk, rid)?;
        Ok(())
    }

    fn select(&mut self, pk: i64) -> Result<Option<Row>, TableError> {
        let Some(rid) = self.index.search(pk)? else {
            return Ok(None);
        };
        Ok(self.heap.get(rid.0, rid.1)?)
    }

    fn select_range(&mut self, low: i64, high: i64) -> Result<Vec<Row>, TableError> {
        let rids = self.index.range_scan(low, high)?;
        let mut rows = Vec::with_capacity(rids.len());
        for (page_id, slot_id) in rids {
            if let Some(row) = self.heap.get(page_id, slot_id)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn select_all(&mut self) -> Result<Vec<Row>, TableError> {
        Ok(self.heap.scan()?)
    }

    fn update(&mut self, pk: i64, row: Row) -> Result<bool, TableError> {
        check_arity(&self.schema, &row)?;
        let new_pk = primary_key_of(&self.schema, &row)?;
        if new_pk != pk {
            return Err(TableError::PrimaryKeyImmutable);
        }
        let Some(rid) = self.index.search(pk)? else {
            return Ok(false);
        };
        if self.heap.get(rid.0, rid.1)?.is_none() {
            return Ok(false);
        }
        self.heap.update(rid.0, rid.1, &row)?;
        Ok(true)
    }

    fn delete(&mut self, pk: i64) -> Result<bool, TableError> {
        let Some(rid) = self.index.search(pk)? else {
            return Ok(false);
        };
        self.index.delete(pk)?;
        self.heap.delete(rid.0, rid.1)?;
        Ok(true)
    }

    fn row_count(&mut self) -> Result<usize, TableError> {
        Ok(self.heap.scan()?.len())
    }

    fn close(&mut self) -> Result<(), TableError> {
        self.heap.close()?;
        self.index.close()?;
        Ok(())
    }
}

/// The same contract, kept entirely in memory.
pub struct MemTable {
    schema: Schema,
    rows: Vec<Option<Row>>,
    index: SortedMap<i64, usize>,
}

impl MemTable {
    pub fn new(schema: Schema) -> Self {
        MemTable {
            schema,
            rows: Vec::new(),
            index: SortedMap::new(),
        }
    }
}

impl Table for MemTable {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn insert(&mut self, row: Row) -> Result<(), TableError> {
        check_arity(&self.schema, &row)?;
        let pk = primary_key_of(&self.schema, &row)?;
        if self.index.contains_key(&pk) {
            return Err(TableError::DuplicateKey(pk));
        }
        let slot = self.rows.len();
        self.rows.push(Some(row));
        self.index.insert(pk, slot);
        Ok(())
    }

    fn select(&mut self, pk: i64) -> Result<Option<Row>, TableError> {
        Ok(self
            .index
            .get(&pk)
            .and_then(|&slot| self.rows[slot].clone()))
    }

    fn select_range(&mut self, low: i64, high: i64) -> Result<Vec<Row>, TableError> {
        Ok(self
            .index
            .range(low..=high)
            .filter_map(|(_, &slot)| self.rows[slot].clone())
            .collect())
    }

    fn select_all(&mut self) -> Result<Vec<Row>, TableError> {
        Ok(self.rows.iter().flatten().cloned().collect())
    }

    fn update(&mut self, pk: i64, row: Row) -> Result<bool, TableError> {
        check_arity(&self.schema, &row)?;
        let new_pk = primary_key_of(&self.schema, &row)?;
        if new_pk != pk {
            return Err(TableError::PrimaryKeyImmutable);
        }
        let Some(&slot) = self.index.get(&pk) else {
            return Ok(false);
        };
        if self.rows[slot].is_none() {
            return Ok(false);
        }
        self.rows[slot] = Some(row);
        Ok(true)
    }

    fn delete(&mut self, pk: i64) -> Result<bool, TableError> {
        let Some(slot) = self.index.remove(&pk) else {
            return Ok(false);
        };
        self.rows[slot] = None;
        Ok(true)
    }

    fn row_count(&mut self) -> Result<usize, TableError> {
        Ok(self.rows.iter().filter(|r| r.is_some()).count())
    }
}

pub fn log_created(name: &str, schema: &Schema) {
    info!(
        "table '{name}' created with {} column(s), primary key '{}'",
        schema.len(),
        schema.primary_key_name().unwrap_or("?")
    );
}
