//! Table registry.
//!
//! Maps table ids to their backing files plus the name and primary-key
//! metadata the upper layers want. The storage core consults it only to
//! resolve `PageId.table_id` to a file for I/O.

use dashmap::DashMap;
use std::sync::Arc;

use crate::access::heap::DbFile;
use crate::access::tuple::TupleDesc;
use crate::error::{DbError, DbResult};

struct TableInfo {
    file: Arc<dyn DbFile>,
    name: String,
    primary_key: String,
}

pub struct Catalog {
    tables: DashMap<u32, TableInfo>,
    names: DashMap<String, u32>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            names: DashMap::new(),
        }
    }

    /// Registers a table. On a name conflict the newest registration wins
    /// the name.
    pub fn add_table(&self, file: Arc<dyn DbFile>, name: &str, primary_key: &str) {
        let id = file.id();
        self.names.insert(name.to_string(), id);
        self.tables.insert(
            id,
            TableInfo {
                file,
                name: name.to_string(),
                primary_key: primary_key.to_string(),
            },
        );
    }

    pub fn file(&self, table_id: u32) -> DbResult<Arc<dyn DbFile>> {
        self.tables
            .get(&table_id)
            .map(|info| Arc::clone(&info.file))
            .ok_or_else(|| DbError::NoSuchElement(format!("table id {}", table_id)))
    }

    pub fn table_id(&self, name: &str) -> DbResult<u32> {
        self.names
            .get(name)
            .map(|id| *id)
            .ok_or_else(|| DbError::NoSuchElement(format!("table named '{}'", name)))
    }

    pub fn tuple_desc(&self, table_id: u32) -> DbResult<TupleDesc> {
        Ok(self.file(table_id)?.tuple_desc().clone())
    }

    pub fn table_name(&self, table_id: u32) -> DbResult<String> {
        self.tables
            .get(&table_id)
            .map(|info| info.name.clone())
            .ok_or_else(|| DbError::NoSuchElement(format!("table id {}", table_id)))
    }

    pub fn primary_key(&self, table_id: u32) -> DbResult<String> {
        self.tables
            .get(&table_id)
            .map(|info| info.primary_key.clone())
            .ok_or_else(|| DbError::NoSuchElement(format!("table id {}", table_id)))
    }

    pub fn table_ids(&self) -> Vec<u32> {
        self.tables.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
