// Transactions, locking, deadlock detection and the NO STEAL / FORCE
// policies, at the default page size.

use std::sync::{Arc, Barrier};
use std::thread;

use anyhow::Result;

mod common;
use common::{create_table, create_test_env, insert_ints, scan_ints, single_int_desc};

use alderdb::common::types::{PageId, Permissions};
use alderdb::storage::buffer::BufferPool;
use alderdb::storage::heap::HeapFile;
use alderdb::storage::page::HeapPage;
use alderdb::storage::tuple::{Field, Tuple};
use alderdb::transaction::Transaction;
use alderdb::DbError;

// Write `n` empty page images straight to disk so locking tests have
// distinct pages to fight over.
fn preallocate_pages(file: &Arc<HeapFile>, n: usize) -> Result<()> {
    for page_no in 0..n {
        let pid = PageId::new(file.id(), page_no);
        let page = HeapPage::new(pid, &HeapPage::empty_page_data(), file.tuple_desc().clone())?;
        file.write_page(&page)?;
    }
    Ok(())
}

#[test]
fn abort_discards_cached_changes() -> Result<()> {
    let (catalog, pool) = create_test_env(8);
    let (file, _guard) = create_table(&catalog, "rollback", single_int_desc())?;
    insert_ints(&pool, file.id(), &[1, 2])?;
    let before_disk = std::fs::read(file.path())?;

    let txn = Transaction::new();
    let mut t = Tuple::new(file.tuple_desc().clone(), vec![Field::Int(99)]);
    pool.insert_tuple(txn.id(), file.id(), &mut t)?;
    txn.abort(&pool)?;

    // cache was discarded, disk never written: the old rows survive
    let mut got = scan_ints(&pool, &file)?;
    got.sort_unstable();
    assert_eq!(got, vec![1, 2]);
    assert_eq!(std::fs::read(file.path())?, before_disk);
    Ok(())
}

#[test]
fn commit_forces_pages_to_disk() -> Result<()> {
    let (catalog, pool) = create_test_env(8);
    let (file, _guard) = create_table(&catalog, "force", single_int_desc())?;

    let txn = Transaction::new();
    let mut t = Tuple::new(file.tuple_desc().clone(), vec![Field::Int(42)]);
    pool.insert_tuple(txn.id(), file.id(), &mut t)?;

    // before commit the only on-disk image is the empty extension page
    assert!(std::fs::read(file.path())?.iter().all(|&b| b == 0));

    txn.commit(&pool)?;
    assert!(std::fs::read(file.path())?.iter().any(|&b| b != 0));

    // a second pool over the same catalog reads the committed row
    let cold_pool = Arc::new(BufferPool::new(4, catalog.clone()));
    assert_eq!(scan_ints(&cold_pool, &file)?, vec![42]);
    Ok(())
}

#[test]
fn no_steal_keeps_dirty_pages_in_memory() -> Result<()> {
    // S6: 1-page buffer; a dirty page blocks a reader but never leaks to
    // disk before its transaction commits
    let (catalog, pool) = create_test_env(1);
    let (file, _guard) = create_table(&catalog, "nosteal", single_int_desc())?;
    preallocate_pages(&file, 2)?;

    let t1 = Transaction::new();
    let mut t = Tuple::new(file.tuple_desc().clone(), vec![Field::Int(5)]);
    pool.insert_tuple(t1.id(), file.id(), &mut t)?;

    // the sole buffer page is dirty; a reader of the other page starves
    let t2 = Transaction::new();
    let p1 = PageId::new(file.id(), 1);
    match pool.get_page(t2.id(), p1, Permissions::ReadOnly) {
        Err(DbError::CacheFull) => {}
        other => panic!("expected CacheFull, got {:?}", other.map(|_| ())),
    }
    // the failed call released the lock it had taken
    assert!(!pool.holds_lock(t2.id(), p1));

    // page 0 is still all zeroes on disk
    let disk = std::fs::read(file.path())?;
    assert!(disk[..alderdb::common::types::page_size()].iter().all(|&b| b == 0));

    t1.commit(&pool)?;
    let disk = std::fs::read(file.path())?;
    assert!(disk[..alderdb::common::types::page_size()].iter().any(|&b| b != 0));

    // with page 0 clean again the reader gets through
    pool.get_page(t2.id(), p1, Permissions::ReadOnly)?;
    t2.commit(&pool)?;
    assert_eq!(scan_ints(&pool, &file)?, vec![5]);
    Ok(())
}

#[test]
fn deadlock_picks_exactly_one_victim() -> Result<()> {
    // S5: T1 holds P0 and wants P1, T2 holds P1 and wants P0
    let (catalog, pool) = create_test_env(8);
    let (file, _guard) = create_table(&catalog, "deadlock", single_int_desc())?;
    preallocate_pages(&file, 2)?;
    let p0 = PageId::new(file.id(), 0);
    let p1 = PageId::new(file.id(), 1);

    let barrier = Arc::new(Barrier::new(2));
    let spawn = |first: PageId, second: PageId| {
        let pool = pool.clone();
        let barrier = barrier.clone();
        thread::spawn(move || -> bool {
            let txn = Transaction::new();
            pool.get_page(txn.id(), first, Permissions::ReadWrite).unwrap();
            barrier.wait();
            match pool.get_page(txn.id(), second, Permissions::ReadWrite) {
                Ok(_) => {
                    txn.commit(&pool).unwrap();
                    false
                }
                Err(DbError::TransactionAborted(_)) => {
                    // the victim aborts itself, releasing its first page
                    txn.abort(&pool).unwrap();
                    true
                }
                Err(e) => panic!("unexpected error: {}", e),
            }
        })
    };

    let h1 = spawn(p0, p1);
    let h2 = spawn(p1, p0);
    let aborted = [h1.join().unwrap(), h2.join().unwrap()];
    assert_eq!(aborted.iter().filter(|&&a| a).count(), 1);
    Ok(())
}

#[test]
fn concurrent_increments_serialize() -> Result<()> {
    // two committed read-modify-write transactions on the same page are
    // equivalent to some serial order: no lost update
    let (catalog, pool) = create_test_env(8);
    let (file, _guard) = create_table(&catalog, "serial", single_int_desc())?;
    insert_ints(&pool, file.id(), &[0])?;

    let increment = |pool: &Arc<BufferPool>, file: &Arc<HeapFile>| -> Result<(), DbError> {
        let txn = Transaction::new();
        let run = || -> Result<(), DbError> {
            let mut iter = file.iter(txn.id(), pool.clone());
            iter.open()?;
            let current = iter.next()?.expect("counter tuple");
            iter.close();
            let value = match current.field(0) {
                Field::Int(v) => *v,
                _ => unreachable!(),
            };
            pool.delete_tuple(txn.id(), &current)?;
            let mut next = Tuple::new(file.tuple_desc().clone(), vec![Field::Int(value + 1)]);
            pool.insert_tuple(txn.id(), file.id(), &mut next)?;
            pool.transaction_complete(txn.id(), true)
        };
        run().map_err(|e| {
            // release whatever the failed attempt still holds
            let _ = pool.transaction_complete(txn.id(), false);
            e
        })
    };

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let pool = pool.clone();
            let file = file.clone();
            thread::spawn(move || loop {
                match increment(&pool, &file) {
                    Ok(()) => return,
                    Err(DbError::TransactionAborted(_)) => continue,
                    Err(e) => panic!("unexpected error: {}", e),
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(scan_ints(&pool, &file)?, vec![2]);
    Ok(())
}

#[test]
fn transaction_complete_is_idempotent() -> Result<()> {
    let (catalog, pool) = create_test_env(4);
    let (file, _guard) = create_table(&catalog, "idem", single_int_desc())?;

    let txn = Transaction::new();
    let mut t = Tuple::new(file.tuple_desc().clone(), vec![Field::Int(1)]);
    pool.insert_tuple(txn.id(), file.id(), &mut t)?;
    txn.commit(&pool)?;
    txn.commit(&pool)?;
    txn.abort(&pool)?;

    assert_eq!(scan_ints(&pool, &file)?, vec![1]);
    Ok(())
}

#[test]
fn release_page_drops_a_read_lock_early() -> Result<()> {
    let (catalog, pool) = create_test_env(4);
    let (file, _guard) = create_table(&catalog, "release", single_int_desc())?;
    insert_ints(&pool, file.id(), &[1])?;
    let pid = PageId::new(file.id(), 0);

    let reader = Transaction::new();
    pool.get_page(reader.id(), pid, Permissions::ReadOnly)?;
    assert!(pool.holds_lock(reader.id(), pid));
    pool.release_page(reader.id(), pid);
    assert!(!pool.holds_lock(reader.id(), pid));

    // a writer can now take the page without waiting
    let writer = Transaction::new();
    pool.get_page(writer.id(), pid, Permissions::ReadWrite)?;
    writer.commit(&pool)?;
    reader.commit(&pool)?;
    Ok(())
}

#[test]
fn writer_excludes_concurrent_writer() -> Result<()> {
    let (catalog, pool) = create_test_env(4);
    let (file, _guard) = create_table(&catalog, "exclusive", single_int_desc())?;
    preallocate_pages(&file, 1)?;
    let pid = PageId::new(file.id(), 0);

    let t1 = Transaction::new();
    pool.get_page(t1.id(), pid, Permissions::ReadWrite)?;

    let blocked = {
        let pool = pool.clone();
        thread::spawn(move || {
            let t2 = Transaction::new();
            pool.get_page(t2.id(), pid, Permissions::ReadWrite).unwrap();
            let held = pool.holds_lock(t2.id(), pid);
            t2.commit(&pool).unwrap();
            held
        })
    };

    thread::sleep(std::time::Duration::from_millis(50));
    assert!(!blocked.is_finished());

    t1.commit(&pool)?;
    assert!(blocked.join().unwrap());
    Ok(())
}
