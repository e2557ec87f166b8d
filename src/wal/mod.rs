/*
 * Copyright (c) 2026.  tarnlog contributors.
 * Please refer to the project repository for more information about this project and its license.
 */

//! Write-Ahead Log.
//!
//! Persists an ordered sequence of opaque byte records, block-structured
//! and reverse-scannable, with monotonic LSNs. Each block carries a
//! header field tracking a free-space pointer, in the same style as the
//! slotted page's own header; records grow downward from the high end of
//! the block, newest nearest the free pointer, so a reverse scan is a
//! forward walk starting from it.

mod iterator;

pub use iterator::WalIterator;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, instrument};

use crate::block::BlockId;
use crate::error::{Result, WalError};
use crate::file_manager::FileManager;
use crate::page::Page;
use crate::types::{Lsn, LSN_UNASSIGNED};

/// Offset of the 2-byte `free_head` field at the start of every WAL block.
const FREE_HEAD_OFFSET: u16 = 0;

/// Smallest legal `free_head` value: a record may never be written so it
/// would overwrite the `free_head` field itself.
const MIN_FREE_HEAD: u16 = 2;

struct WalState {
    block: BlockId,
    page: Page,
    latest_lsn: Lsn,
    last_saved_lsn: Lsn,
}

/// Append-only, block-structured log writer.
///
/// Append and flush are mutually exclusive: both operations take the same
/// [`WalState`] mutex across whatever disk I/O they require, since a
/// single log file only ever has one writer.
pub struct Wal {
    file_manager: Arc<FileManager>,
    file_name: String,
    block_size: u16,
    state: Mutex<WalState>,
    /// Bounded free-list of page buffers used by [`WalIterator`]s so a
    /// full-log reverse scan doesn't allocate a fresh 8 KiB buffer per
    /// block visited.
    page_pool: Mutex<Vec<Page>>,
}

const PAGE_POOL_CAPACITY: usize = 4;

impl Wal {
    /// Open (or create) the WAL file `file_name` under `file_manager`'s
    /// root directory.
    pub fn open(file_manager: Arc<FileManager>, file_name: impl Into<String>) -> Result<Self> {
        let file_name = file_name.into();
        let block_size = file_manager.block_size();

        let num_blocks = file_manager.size(&file_name)?;
        let (block, page) = if num_blocks == 0 {
            let block = file_manager.append(&file_name)?;
            let mut page = Page::zeroed();
            page.set_offset(FREE_HEAD_OFFSET, block_size)?;
            file_manager.write(&block, &page)?;
            (block, page)
        } else {
            let block = BlockId::new(file_name.clone(), num_blocks - 1);
            let mut page = Page::zeroed();
            file_manager.read(&block, &mut page)?;
            (block, page)
        };

        let latest_lsn = LSN_UNASSIGNED;
        Ok(Self {
            file_manager,
            file_name,
            block_size,
            state: Mutex::new(WalState {
                block,
                page,
                latest_lsn,
                last_saved_lsn: LSN_UNASSIGNED,
            }),
            page_pool: Mutex::new(Vec::with_capacity(PAGE_POOL_CAPACITY)),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Append `record` to the log and return its assigned LSN. LSNs are
    /// strictly increasing.
    #[instrument(skip(self, record), fields(len = record.len()))]
    pub fn append(&self, record: &[u8]) -> Result<Lsn> {
        let rec_total = record.len() + 4;
        if rec_total + MIN_FREE_HEAD as usize > self.block_size as usize {
            return Err(WalError::RecordTooLarge {
                size: rec_total,
                block_size: self.block_size as usize,
            }
            .into());
        }

        let mut state = self.state.lock();

        let free_head = state.page.get_offset(FREE_HEAD_OFFSET)?;
        if (free_head as i64) - (rec_total as i64) < MIN_FREE_HEAD as i64 {
            self.roll_over(&mut state)?;
        }

        let free_head = state.page.get_offset(FREE_HEAD_OFFSET)?;
        let new_free_head = free_head - rec_total as u16;
        state.page.set_bytes(new_free_head, record)?;
        state.page.set_offset(FREE_HEAD_OFFSET, new_free_head)?;

        state.latest_lsn += 1;
        Ok(state.latest_lsn)
    }

    /// Flush the current page to disk, allocate a fresh empty block, and
    /// make it the new current page.
    fn roll_over(&self, state: &mut WalState) -> Result<()> {
        self.file_manager.write(&state.block, &state.page)?;
        self.file_manager.sync(&self.file_name)?;

        let new_block = self.file_manager.append(&self.file_name)?;
        let mut new_page = Page::zeroed();
        new_page.set_offset(FREE_HEAD_OFFSET, self.block_size)?;
        self.file_manager.write(&new_block, &new_page)?;

        info!(block = %new_block, "wal rolled over to new block");
        state.block = new_block;
        state.page = new_page;
        Ok(())
    }

    /// Guarantee every record with LSN ≤ `lsn` is durable. No-op if
    /// already satisfied by a previous flush.
    #[instrument(skip(self))]
    pub fn flush(&self, lsn: Lsn) -> Result<()> {
        let mut state = self.state.lock();
        if lsn >= state.last_saved_lsn {
            self.file_manager.write(&state.block, &state.page)?;
            self.file_manager.sync(&self.file_name)?;
            state.last_saved_lsn = state.latest_lsn;
            info!(last_saved_lsn = state.last_saved_lsn, "wal flushed");
        }
        Ok(())
    }

    /// The highest LSN known to be durable.
    pub fn last_saved_lsn(&self) -> Lsn {
        self.state.lock().last_saved_lsn
    }

    /// The highest LSN ever assigned.
    pub fn latest_lsn(&self) -> Lsn {
        self.state.lock().latest_lsn
    }

    /// Construct a reverse iterator over every persisted record, newest
    /// first. Flushes first so the iterator always observes everything
    /// appended before this call.
    pub fn iterator(&self) -> Result<WalIterator<'_>> {
        let latest = {
            let state = self.state.lock();
            state.latest_lsn
        };
        if latest != LSN_UNASSIGNED {
            self.flush(latest)?;
        }
        let state = self.state.lock();
        WalIterator::new(self, state.block.clone(), state.page.clone())
    }

    fn acquire_page(&self) -> Page {
        self.page_pool.lock().pop().unwrap_or_else(Page::zeroed)
    }

    fn release_page(&self, page: Page) {
        let mut pool = self.page_pool.lock();
        if pool.len() < PAGE_POOL_CAPACITY {
            pool.push(page);
        }
    }

    pub(crate) fn file_mgr(&self) -> &Arc<FileManager> {
        &self.file_manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wal() -> (tempfile::TempDir, Wal) {
        let dir = tempfile::tempdir().unwrap();
        let fm = Arc::new(FileManager::new(dir.path()).unwrap());
        let wal = Wal::open(fm, "wal").unwrap();
        (dir, wal)
    }

    #[test]
    fn lsns_are_monotonic_and_start_at_one() {
        let (_dir, wal) = wal();
        let lsn1 = wal.append(b"a").unwrap();
        let lsn2 = wal.append(b"b").unwrap();
        let lsn3 = wal.append(b"c").unwrap();
        assert_eq!(lsn1, 1);
        assert_eq!(lsn2, 2);
        assert_eq!(lsn3, 3);
    }

    #[test]
    fn flush_is_a_noop_when_already_durable() {
        let (_dir, wal) = wal();
        wal.append(b"a").unwrap();
        wal.flush(1).unwrap();
        assert_eq!(wal.last_saved_lsn(), 1);
        // Flushing an already-covered LSN is a no-op but harmless.
        wal.flush(0).unwrap();
        assert_eq!(wal.last_saved_lsn(), 1);
    }

    #[test]
    fn record_too_large_is_rejected() {
        let (_dir, wal) = wal();
        let huge = vec![0u8; crate::types::PAGE_SIZE];
        assert!(wal.append(&huge).is_err());
    }

    #[test]
    fn concurrent_appends_yield_a_total_order() {
        let (_dir, wal) = wal();
        let wal = Arc::new(wal);
        let num_threads = 8;
        let per_thread = 20;

        let handles: Vec<_> = (0..num_threads)
            .map(|_| {
                let wal = wal.clone();
                std::thread::spawn(move || {
                    let mut lsns = Vec::with_capacity(per_thread);
                    for i in 0..per_thread {
                        lsns.push(wal.append(format!("rec-{i}").as_bytes()).unwrap());
                    }
                    lsns
                })
            })
            .collect();

        let mut all_lsns: Vec<Lsn> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all_lsns.sort_unstable();
        let expected: Vec<Lsn> = (1..=(num_threads * per_thread) as Lsn).collect();
        assert_eq!(all_lsns, expected);
    }
}
