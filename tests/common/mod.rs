use std::sync::Arc;

use anyhow::Result;
use tempfile::NamedTempFile;

use alderdb::catalog::Catalog;
use alderdb::common::types::TableId;
use alderdb::storage::buffer::BufferPool;
use alderdb::storage::heap::HeapFile;
use alderdb::storage::tuple::{Field, FieldType, Tuple, TupleDesc};
use alderdb::transaction::Transaction;

// Create a catalog and a buffer pool caching `pool_pages` pages
#[allow(dead_code)]
pub fn create_test_env(pool_pages: usize) -> (Arc<Catalog>, Arc<BufferPool>) {
    let catalog = Arc::new(Catalog::new());
    let pool = Arc::new(BufferPool::new(pool_pages, catalog.clone()));
    (catalog, pool)
}

// Register an empty heap table; the returned NamedTempFile keeps the
// backing file alive for the duration of the test
#[allow(dead_code)]
pub fn create_table(
    catalog: &Arc<Catalog>,
    name: &str,
    desc: Arc<TupleDesc>,
) -> Result<(Arc<HeapFile>, NamedTempFile)> {
    let temp = NamedTempFile::new()?;
    let file = Arc::new(HeapFile::open(temp.path(), desc)?);
    catalog.add_table(file.clone(), name);
    Ok((file, temp))
}

#[allow(dead_code)]
pub fn single_int_desc() -> Arc<TupleDesc> {
    Arc::new(TupleDesc::new(vec![FieldType::Int], vec![Some("v".into())]))
}

// Insert the values in one committed transaction
#[allow(dead_code)]
pub fn insert_ints(pool: &Arc<BufferPool>, table_id: TableId, values: &[i32]) -> Result<()> {
    let desc = pool.catalog().tuple_desc(table_id)?;
    let txn = Transaction::new();
    for &v in values {
        let mut tuple = Tuple::new(desc.clone(), vec![Field::Int(v)]);
        pool.insert_tuple(txn.id(), table_id, &mut tuple)?;
    }
    txn.commit(pool)?;
    Ok(())
}

// Scan the whole table under a fresh committed transaction, returning
// the first column of every tuple
#[allow(dead_code)]
pub fn scan_ints(pool: &Arc<BufferPool>, file: &Arc<HeapFile>) -> Result<Vec<i32>> {
    let txn = Transaction::new();
    let mut iter = file.iter(txn.id(), pool.clone());
    iter.open()?;
    let mut values = Vec::new();
    while let Some(tuple) = iter.next()? {
        match tuple.field(0) {
            Field::Int(v) => values.push(*v),
            other => anyhow::bail!("expected int field, got {:?}", other),
        }
    }
    iter.close();
    txn.commit(pool)?;
    Ok(values)
}

// Scan keeping the full tuples (with record ids), under the caller's
// transaction so follow-up deletes stay inside it
#[allow(dead_code)]
pub fn scan_tuples(
    pool: &Arc<BufferPool>,
    file: &Arc<HeapFile>,
    txn: &Transaction,
) -> Result<Vec<Tuple>> {
    let mut iter = file.iter(txn.id(), pool.clone());
    iter.open()?;
    let mut tuples = Vec::new();
    while let Some(tuple) = iter.next()? {
        tuples.push(tuple);
    }
    iter.close();
    Ok(tuples)
}
