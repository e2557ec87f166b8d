/*
 * Copyright (c) 2026.  tarnlog contributors.
 * Please refer to the project repository for more information about this project and its license.
 */

//! Shared type aliases and global constants.
//!
//! Narrow integer aliases kept distinct so call sites read as intent rather
//! than bare `u32`/`u64`. Values annotated "fixed" must not change after a
//! database has been created on disk, since doing so invalidates every
//! existing block and slotted-page layout.

/// Number of bytes in a single block/page. Not configurable past first
/// creation (see `EngineConfig`).
pub const PAGE_SIZE: usize = 8192;

/// Transaction identifier. `0` is reserved ([`TX_ID_INVALID`]).
pub type TxId = u32;

/// `TxIdInvalid` sentinel — no real transaction has this id.
pub const TX_ID_INVALID: TxId = 0;

/// The first transaction id a transaction manager may assign.
pub const TX_ID_FIRST: TxId = 1;

/// Log Sequence Number. Monotonically increasing, starts at 1; `0` means
/// "unassigned."
pub type Lsn = u64;

/// Sentinel for "no LSN assigned yet."
pub const LSN_UNASSIGNED: Lsn = 0;

/// Sentinel block number meaning "no block."
pub const BLOCK_EOF: u64 = u64::MAX;

/// Buffer frame identifier (index into the buffer pool's frame array).
pub type FrameId = usize;
