/*
 * Copyright (c) 2026.  tarnlog contributors.
 * Please refer to the project repository for more information about this project and its license.
 */

//! Storage engine core: block I/O, write-ahead log, buffer pool, and
//! slotted pages for a small educational relational database.
//!
//! Dependency order: [`file_manager`] and [`page`] are leaves; [`wal`]
//! and [`buffer_pool`] build on them; [`slotted_page`] builds on the
//! [`transaction`] abstraction that wires the three together.

pub mod block;
pub mod buffer_pool;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod page;
pub mod slotted_page;
pub mod transaction;
pub mod types;
pub mod wal;

pub use block::BlockId;
pub use buffer_pool::BufferPool;
pub use config::EngineConfig;
pub use error::{Result, StorageError};
pub use file_manager::FileManager;
pub use page::Page;
pub use transaction::{EngineTransaction, Transaction};
pub use wal::Wal;
