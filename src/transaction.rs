/*
 * Copyright (c) 2026.  tarnlog contributors.
 * Please refer to the project repository for more information about this project and its license.
 */

//! The abstract `Transaction` collaborator.
//!
//! Slotted Page depends on nothing but this capability set: pin/unpin, a
//! handful of logged field accessors, and pass-through file growth,
//! expressed as a named trait so a real implementation and a
//! test-only in-memory mock can both satisfy Slotted Page's needs without
//! either one reaching into global state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::block::BlockId;
use crate::buffer_pool::{BufferPool, PinnedFrame};
use crate::error::{Result, StorageError};
use crate::file_manager::FileManager;
use crate::types::{Lsn, TxId, LSN_UNASSIGNED};
use crate::wal::Wal;

/// Everything Slotted Page needs from a transaction.
///
/// Mutating methods take `should_log`: `false` is reserved for internal
/// bookkeeping such as initial-load formatting, which must still touch
/// the page but has no meaningful WAL record to produce.
pub trait Transaction: Send + Sync {
    fn id(&self) -> TxId;
    fn pin(&self, block: &BlockId) -> Result<()>;
    fn unpin(&self, block: &BlockId) -> Result<()>;
    fn block_size(&self) -> u16;

    fn fixedlen(&self, block: &BlockId, offset: u16, size: usize) -> Result<Vec<u8>>;
    fn set_fixedlen(
        &self,
        block: &BlockId,
        offset: u16,
        size: usize,
        value: &[u8],
        should_log: bool,
    ) -> Result<()>;

    fn varlen(&self, block: &BlockId, offset: u16) -> Result<Vec<u8>>;
    fn set_varlen(&self, block: &BlockId, offset: u16, value: &[u8], should_log: bool) -> Result<()>;

    fn copy(
        &self,
        block: &BlockId,
        src_offset: u16,
        dst_offset: u16,
        length: usize,
        should_log: bool,
    ) -> Result<()>;

    fn append(&self, file: &str) -> Result<BlockId>;
    fn size(&self, file: &str) -> Result<u64>;
}

const TAG_SET_FIXEDLEN: u8 = 1;
const TAG_SET_VARLEN: u8 = 2;
const TAG_COPY: u8 = 3;

fn encode_header(tag: u8, tx: TxId, block: &BlockId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + 4 + 2 + block.file_name().len() + 8);
    buf.push(tag);
    buf.extend_from_slice(&tx.to_le_bytes());
    let name = block.file_name().as_bytes();
    buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
    buf.extend_from_slice(name);
    buf.extend_from_slice(&block.block_number().to_le_bytes());
    buf
}

/// Build the WAL record for a `set_fixedlen`/`set_varlen`/`copy` call.
/// There is no redo/undo logic in this core (full crash recovery beyond
/// WAL ordering is out of scope); these records exist so every page
/// mutation is represented in the log in the order it happened, since
/// every mutating call must produce a WAL record.
fn encode_set(tag: u8, tx: TxId, block: &BlockId, offset: u16, value: &[u8]) -> Vec<u8> {
    let mut buf = encode_header(tag, tx, block);
    buf.extend_from_slice(&offset.to_le_bytes());
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(value);
    buf
}

fn encode_copy(tx: TxId, block: &BlockId, src: u16, dst: u16, length: usize) -> Vec<u8> {
    let mut buf = encode_header(TAG_COPY, tx, block);
    buf.extend_from_slice(&src.to_le_bytes());
    buf.extend_from_slice(&dst.to_le_bytes());
    buf.extend_from_slice(&(length as u32).to_le_bytes());
    buf
}

/// Wires the Buffer Pool, WAL, and File Manager together behind the
/// `Transaction` interface.
pub struct EngineTransaction {
    id: TxId,
    buffer_pool: Arc<BufferPool>,
    wal: Arc<Wal>,
    file_manager: Arc<FileManager>,
    pinned: Mutex<HashMap<BlockId, PinnedFrame>>,
}

impl EngineTransaction {
    pub fn new(
        id: TxId,
        buffer_pool: Arc<BufferPool>,
        wal: Arc<Wal>,
        file_manager: Arc<FileManager>,
    ) -> Self {
        Self {
            id,
            buffer_pool,
            wal,
            file_manager,
            pinned: Mutex::new(HashMap::new()),
        }
    }

    fn frame_for(&self, block: &BlockId) -> Result<PinnedFrame> {
        self.pinned
            .lock()
            .get(block)
            .cloned()
            .ok_or_else(|| StorageError::NotPinned {
                tx: self.id,
                block: block.clone(),
            })
    }

    /// Flush every frame this transaction dirtied and release all pins.
    /// Used at commit.
    pub fn commit(&self) -> Result<()> {
        self.buffer_pool.flush_all(self.id)?;
        let blocks: Vec<BlockId> = self.pinned.lock().keys().cloned().collect();
        for block in blocks {
            self.unpin(&block)?;
        }
        Ok(())
    }
}

impl Transaction for EngineTransaction {
    fn id(&self) -> TxId {
        self.id
    }

    fn pin(&self, block: &BlockId) -> Result<()> {
        if self.pinned.lock().contains_key(block) {
            return Ok(());
        }
        let frame = self.buffer_pool.pin(block)?;
        self.pinned.lock().insert(block.clone(), frame);
        Ok(())
    }

    fn unpin(&self, block: &BlockId) -> Result<()> {
        if let Some(frame) = self.pinned.lock().remove(block) {
            frame.unpin();
        }
        Ok(())
    }

    fn block_size(&self) -> u16 {
        self.file_manager.block_size()
    }

    fn fixedlen(&self, block: &BlockId, offset: u16, size: usize) -> Result<Vec<u8>> {
        let frame = self.frame_for(block)?;
        frame.read(|page| match size {
            1 => Ok(vec![page.get_tinyint(offset)?]),
            2 => Ok(page.get_smallint(offset)?.to_le_bytes().to_vec()),
            4 => Ok(page.get_int(offset)?.to_le_bytes().to_vec()),
            8 => Ok(page.get_long(offset)?.to_le_bytes().to_vec()),
            other => Err(crate::error::PageError::InvalidField(format!(
                "unsupported fixed width {other}"
            ))
            .into()),
        })
    }

    fn set_fixedlen(
        &self,
        block: &BlockId,
        offset: u16,
        size: usize,
        value: &[u8],
        should_log: bool,
    ) -> Result<()> {
        let frame = self.frame_for(block)?;
        let lsn = if should_log {
            self.wal.append(&encode_set(TAG_SET_FIXEDLEN, self.id, block, offset, value))?
        } else {
            LSN_UNASSIGNED
        };
        frame.write(self.id, lsn, |page| match size {
            1 => page.set_tinyint(offset, value[0]),
            2 => page.set_smallint(offset, u16::from_le_bytes(value.try_into().unwrap())),
            4 => page.set_int(offset, u32::from_le_bytes(value.try_into().unwrap())),
            8 => page.set_long(offset, u64::from_le_bytes(value.try_into().unwrap())),
            other => Err(crate::error::PageError::InvalidField(format!(
                "unsupported fixed width {other}"
            ))
            .into()),
        })
    }

    fn varlen(&self, block: &BlockId, offset: u16) -> Result<Vec<u8>> {
        let frame = self.frame_for(block)?;
        frame.read(|page| page.get_bytes(offset))
    }

    fn set_varlen(&self, block: &BlockId, offset: u16, value: &[u8], should_log: bool) -> Result<()> {
        let frame = self.frame_for(block)?;
        let lsn = if should_log {
            self.wal.append(&encode_set(TAG_SET_VARLEN, self.id, block, offset, value))?
        } else {
            LSN_UNASSIGNED
        };
        frame.write(self.id, lsn, |page| page.set_bytes(offset, value))
    }

    fn copy(
        &self,
        block: &BlockId,
        src_offset: u16,
        dst_offset: u16,
        length: usize,
        should_log: bool,
    ) -> Result<()> {
        let frame = self.frame_for(block)?;
        let lsn = if should_log {
            self.wal
                .append(&encode_copy(self.id, block, src_offset, dst_offset, length))?
        } else {
            LSN_UNASSIGNED
        };
        frame.write(self.id, lsn, |page| page.copy_within(src_offset, dst_offset, length))
    }

    fn append(&self, file: &str) -> Result<BlockId> {
        self.file_manager.append(file)
    }

    fn size(&self, file: &str) -> Result<u64> {
        self.file_manager.size(file)
    }
}
