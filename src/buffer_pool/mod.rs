/*
 * Copyright (c) 2026.  tarnlog contributors.
 * Please refer to the project repository for more information about this project and its license.
 */

//! Buffer Pool.
//!
//! A fixed-size pool of page frames shared across transactions, with
//! `pin`/`unpin` reference counting, mark-and-sweep eviction, and the
//! WAL-before-data flush ordering rule. The pool depends on the WAL only
//! through the thin [`WalSink`] interface below: it only ever calls
//! `flush(lsn)`, never anything else, keeping the dependency one-way at
//! compile time even though the two subsystems are logically coupled.

mod frame;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::block::BlockId;
use crate::error::{BufferError, Result};
use crate::file_manager::FileManager;
use crate::page::Page;
use crate::types::{FrameId, Lsn, TxId};

use frame::Frame;

/// The operation the Buffer Pool needs from a WAL: guarantee durability up
/// to a given LSN before a dirty page may be written back. Kept as a
/// trait, rather than a direct `Wal` dependency, so the two modules don't
/// form a concrete-type cycle.
pub trait WalSink: Send + Sync {
    fn flush(&self, lsn: Lsn) -> Result<()>;
}

impl WalSink for crate::wal::Wal {
    fn flush(&self, lsn: Lsn) -> Result<()> {
        crate::wal::Wal::flush(self, lsn)
    }
}

/// A handle to one pinned frame. Cloning shares the pin (does not acquire
/// an additional one); drop the last clone and call [`PinnedFrame::unpin`]
/// explicitly — unlike a lock guard, unpinning is not automatic. Callers
/// are responsible for balancing pins and unpins themselves.
#[derive(Clone)]
pub struct PinnedFrame {
    pool: Arc<BufferPool>,
    idx: FrameId,
}

impl PinnedFrame {
    pub fn block(&self) -> BlockId {
        self.pool.frames[self.idx]
            .lock()
            .block
            .clone()
            .expect("a pinned frame is always bound to a block")
    }

    pub fn read<R>(&self, f: impl FnOnce(&Page) -> R) -> R {
        let frame = self.pool.frames[self.idx].lock();
        f(&frame.page)
    }

    /// Mutate the page and record the transaction/LSN responsible, marking
    /// the frame dirty; a modified frame tracks the LSN of its most
    /// recent change.
    pub fn write<R>(&self, tx: TxId, lsn: Lsn, f: impl FnOnce(&mut Page) -> R) -> R {
        let mut frame = self.pool.frames[self.idx].lock();
        let result = f(&mut frame.page);
        frame.modifying_tx = Some(tx);
        frame.lsn = lsn;
        result
    }

    pub fn unpin(&self) {
        self.pool.unpin(self.idx);
    }
}

pub struct BufferPool {
    file_manager: Arc<FileManager>,
    wal: Arc<dyn WalSink>,
    frames: Vec<Mutex<Frame>>,
    free_list: Mutex<VecDeque<FrameId>>,
    page_table: Mutex<HashMap<BlockId, FrameId>>,
    max_pin_count: u32,
    pin_timeout: Duration,
}

impl BufferPool {
    pub fn new(
        file_manager: Arc<FileManager>,
        wal: Arc<dyn WalSink>,
        size: usize,
        max_pin_count: u32,
        pin_timeout: Duration,
    ) -> Self {
        let frames = (0..size).map(|_| Mutex::new(Frame::unbound())).collect();
        let free_list = (0..size).collect();
        Self {
            file_manager,
            wal,
            frames,
            free_list: Mutex::new(free_list),
            page_table: Mutex::new(HashMap::new()),
            max_pin_count,
            pin_timeout,
        }
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Number of frames not currently bound to any block.
    pub fn available(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Pin `block`, bringing it into the pool if not already resident.
    /// Retries with exponential backoff (1ms doubling to a 100ms cap)
    /// until `pin_timeout` elapses with no frame available.
    #[instrument(skip(self))]
    pub fn pin(self: &Arc<Self>, block: &BlockId) -> Result<PinnedFrame> {
        let deadline = Instant::now() + self.pin_timeout;
        let mut backoff = Duration::from_millis(1);

        loop {
            if let Some(idx) = self.try_pin_existing(block) {
                return Ok(PinnedFrame {
                    pool: self.clone(),
                    idx,
                });
            }
            if let Some(idx) = self.try_pin_new(block)? {
                return Ok(PinnedFrame {
                    pool: self.clone(),
                    idx,
                });
            }

            if Instant::now() >= deadline {
                return Err(BufferError::ClientTimeout {
                    block: block.clone(),
                    timeout: self.pin_timeout,
                }
                .into());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            warn!(block = %block, backoff_ms = backoff.as_millis() as u64, "pin retry backing off");
            thread::sleep(backoff.min(remaining));
            backoff = (backoff * 2).min(Duration::from_millis(100));
        }
    }

    fn try_pin_existing(&self, block: &BlockId) -> Option<FrameId> {
        let idx = *self.page_table.lock().get(block)?;
        let mut frame = self.frames[idx].lock();
        if frame.block.as_ref() != Some(block) {
            // Evicted between the lookup and acquiring the frame lock.
            return None;
        }
        if frame.pin_count < self.max_pin_count {
            frame.pin_count += 1;
        }
        Some(idx)
    }

    fn try_pin_new(&self, block: &BlockId) -> Result<Option<FrameId>> {
        let mut idx = self.free_list.lock().pop_front();
        if idx.is_none() {
            if self.mark_and_sweep()? {
                idx = self.free_list.lock().pop_front();
            }
        }
        let Some(idx) = idx else {
            return Ok(None);
        };

        let mut frame = self.frames[idx].lock();
        if frame.block.is_some() {
            // Raced with another pinner; give the frame back and retry.
            drop(frame);
            self.free_list.lock().push_back(idx);
            return Ok(None);
        }

        self.file_manager.read(block, &mut frame.page)?;
        frame.block = Some(block.clone());
        frame.pin_count = 1;
        frame.lsn = crate::types::LSN_UNASSIGNED;
        frame.modifying_tx = None;
        frame.sweep_age = 0;
        drop(frame);

        self.page_table.lock().insert(block.clone(), idx);
        Ok(Some(idx))
    }

    /// Decrement a frame's pin count. Panics if the frame is unpinned
    /// already — that indicates a caller bug.
    fn unpin(&self, idx: FrameId) {
        let mut frame = self.frames[idx].lock();
        assert!(frame.pin_count > 0, "unpin called on a frame with zero pins");
        frame.pin_count -= 1;
    }

    /// One mark-and-sweep pass over currently bound frames: visits each
    /// bound frame once; the first unpinned frame found is flushed (if
    /// dirty) and freed, and the pass returns immediately. Pinned frames
    /// are passed over, their aging counter ticked down, and the sweep
    /// continues. Returns `true` iff a victim was freed.
    fn mark_and_sweep(&self) -> Result<bool> {
        let snapshot: Vec<(BlockId, FrameId)> = self
            .page_table
            .lock()
            .iter()
            .map(|(b, &i)| (b.clone(), i))
            .collect();

        for (block, idx) in snapshot {
            let mut frame = self.frames[idx].lock();
            if frame.block.as_ref() != Some(&block) {
                continue;
            }
            if frame.pin_count == 0 {
                self.flush_frame_locked(&mut frame)?;
                frame.block = None;
                drop(frame);
                self.page_table.lock().remove(&block);
                self.free_list.lock().push_back(idx);
                debug!(block = %block, "mark-and-sweep evicted frame");
                return Ok(true);
            }
            frame.sweep_age = frame.sweep_age.saturating_sub(1);
        }
        warn!("mark-and-sweep pass freed nothing; every bound frame is pinned");
        Ok(false)
    }

    /// The WAL-before-data flush rule: a dirty frame's WAL record must be
    /// durable before the page itself is written back.
    fn flush_frame_locked(&self, frame: &mut Frame) -> Result<()> {
        if !frame.is_dirty() {
            return Ok(());
        }
        let Some(block) = frame.block.clone() else {
            warn!("dirty frame has no bound block; dropping modification flag");
            frame.modifying_tx = None;
            return Ok(());
        };
        self.wal.flush(frame.lsn)?;
        self.file_manager.write(&block, &frame.page)?;
        frame.modifying_tx = None;
        Ok(())
    }

    /// Flush every frame last modified by `tx`, regardless of pin state.
    #[instrument(skip(self))]
    pub fn flush_all(&self, tx: TxId) -> Result<()> {
        let snapshot: Vec<FrameId> = self.page_table.lock().values().copied().collect();
        for idx in snapshot {
            let mut frame = self.frames[idx].lock();
            if frame.modifying_tx == Some(tx) {
                self.flush_frame_locked(&mut frame)?;
            }
        }
        Ok(())
    }
}
