/*
 * Copyright (c) 2026.  tarnlog contributors.
 * Please refer to the project repository for more information about this project and its license.
 */

//! Structured errors propagated out of the storage core.
//!
//! Each subsystem keeps its own small error enum, every one deriving
//! `thiserror::Error` and folding into the top-level [`StorageError`] via
//! `#[from]`, so all four layers compose into one `Result` alias instead of
//! each module returning its own dead-end error type.

use std::time::Duration;

use crate::block::BlockId;
use crate::types::TxId;

/// Errors raised by the File/Block Manager.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("attempted to read past end of file {file}: block {block} (size is {size} blocks)")]
    ReadPastEnd {
        file: String,
        block: u64,
        size: u64,
    },
}

/// Errors raised by the Write-Ahead Log.
#[derive(Debug, thiserror::Error)]
pub enum WalError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error("record of {size} bytes (with length prefix) cannot fit in a single block of {block_size} bytes")]
    RecordTooLarge { size: usize, block_size: usize },
}

/// Errors raised by the Buffer Pool.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Wal(#[from] WalError),

    #[error("pin({block:?}) did not obtain a free frame within {timeout:?}")]
    ClientTimeout { block: BlockId, timeout: Duration },
}

/// Errors raised by the Slotted Page layer.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("no slot with enough free space for a {requested}-byte record was found")]
    NoFreeSlot { requested: usize },

    #[error("not enough free space on page to host a {requested}-byte record ({available} available)")]
    NoFreeSpace { requested: usize, available: usize },

    #[error("field {0:?} is not present in this record's layout")]
    InvalidField(String),

    #[error("slot {slot} is out of bounds (num_slots = {num_slots})")]
    SlotOutOfBounds { slot: u16, num_slots: u16 },

    #[error("page invariant violated: {0}")]
    Corruption(String),
}

/// The crate-wide error type. Every public, fallible operation returns
/// `Result<T, StorageError>`.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Wal(#[from] WalError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error("transaction {tx} attempted to act on a pin it does not hold for {block:?}")]
    NotPinned { tx: TxId, block: BlockId },

    #[error("on-disk structure is corrupt: {0}")]
    Corruption(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
