/*
 * Copyright (c) 2026.  tarnlog contributors.
 * Please refer to the project repository for more information about this project and its license.
 */

//! Reverse iterator over a [`Wal`]'s persisted records.

use crate::block::BlockId;
use crate::error::Result;
use crate::page::Page;

use super::Wal;

/// Walks every persisted WAL record from newest to oldest.
///
/// Within a block, records are stored right-to-left (newest nearest
/// `free_head`), so walking forward from `free_head` visits a block's
/// records newest-first "for free." Across blocks, the iterator steps
/// from the highest block number down to block 0.
pub struct WalIterator<'a> {
    wal: &'a Wal,
    block: BlockId,
    page: Page,
    pos: u16,
    /// `true` once block 0 has been fully consumed — iteration always
    /// stops there.
    exhausted: bool,
}

impl<'a> WalIterator<'a> {
    pub(super) fn new(wal: &'a Wal, block: BlockId, page: Page) -> Self {
        let pos = page.get_offset(0).unwrap_or(wal.block_size);
        let exhausted = pos >= wal.block_size && block.block_number() == 0;
        Self {
            wal,
            block,
            page,
            pos,
            exhausted,
        }
    }

    /// `true` iff another record remains in the current block, or an
    /// earlier block has not yet been visited.
    pub fn has_next(&self) -> bool {
        !self.exhausted && (self.pos < self.wal.block_size || self.block.block_number() > 0)
    }

    /// Advance to the next record, crossing a block boundary if needed.
    /// Returns `Ok(None)` once every block down to (and including) block 0
    /// has been consumed.
    pub fn next(&mut self) -> Result<Option<Vec<u8>>> {
        if self.exhausted {
            return Ok(None);
        }

        while self.pos >= self.wal.block_size {
            if self.block.block_number() == 0 {
                self.exhausted = true;
                return Ok(None);
            }
            self.step_to_previous_block()?;
        }

        let record = self.page.get_bytes(self.pos)?;
        self.pos += 4 + record.len() as u16;

        if self.pos >= self.wal.block_size && self.block.block_number() == 0 {
            self.exhausted = true;
        }

        Ok(Some(record))
    }

    fn step_to_previous_block(&mut self) -> Result<()> {
        let prev_number = self.block.block_number() - 1;
        let prev_block = BlockId::new(self.block.file_name(), prev_number);

        let mut page = self.wal.acquire_page();
        self.wal.file_mgr().read(&prev_block, &mut page)?;
        let old_page = std::mem::replace(&mut self.page, page);
        self.wal.release_page(old_page);

        self.pos = self.page.get_offset(0)?;
        self.block = prev_block;
        Ok(())
    }
}

impl Drop for WalIterator<'_> {
    fn drop(&mut self) {
        let page = std::mem::replace(&mut self.page, Page::zeroed());
        self.wal.release_page(page);
    }
}
