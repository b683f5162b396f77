// Table registry: resolves table ids (and names) to their heap files.
//
// The buffer pool takes the catalog as an injected dependency; nothing in
// the engine reaches for process-wide state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::error::{DbError, DbResult};
use crate::common::types::TableId;
use crate::storage::heap::HeapFile;
use crate::storage::tuple::TupleDesc;

struct TableEntry {
    file: Arc<HeapFile>,
    name: String,
}

#[derive(Default)]
pub struct Catalog {
    tables: RwLock<HashMap<TableId, TableEntry>>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Register a heap file under `name`. Re-adding a name replaces the
    /// previous binding, matching the newest-wins rule for test fixtures.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str) -> TableId {
        let id = file.id();
        let mut tables = self.tables.write();
        tables.retain(|_, entry| entry.name != name);
        tables.insert(
            id,
            TableEntry {
                file,
                name: name.to_string(),
            },
        );
        id
    }

    pub fn table(&self, id: TableId) -> DbResult<Arc<HeapFile>> {
        self.tables
            .read()
            .get(&id)
            .map(|entry| entry.file.clone())
            .ok_or(DbError::UnknownTable(id))
    }

    pub fn table_by_name(&self, name: &str) -> DbResult<Arc<HeapFile>> {
        self.tables
            .read()
            .values()
            .find(|entry| entry.name == name)
            .map(|entry| entry.file.clone())
            .ok_or_else(|| DbError::UnknownTableName(name.to_string()))
    }

    pub fn table_name(&self, id: TableId) -> Option<String> {
        self.tables.read().get(&id).map(|entry| entry.name.clone())
    }

    pub fn tuple_desc(&self, id: TableId) -> DbResult<Arc<TupleDesc>> {
        Ok(self.table(id)?.tuple_desc().clone())
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.read().keys().copied().collect()
    }
}
