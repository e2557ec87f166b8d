/*
 * Copyright (c) 2026.  tarnlog contributors.
 * Please refer to the project repository for more information about this project and its license.
 */

//! [`BlockId`] — addresses a single fixed-size block within a named file.

use std::fmt;

use crate::types::BLOCK_EOF;

/// A block address: a file name paired with a block number within that
/// file. Two `BlockId`s are equal iff both components match.
///
/// Kept as an owned `String` rather than an interned/`Arc<str>` name: the
/// File Manager is multi-file (the WAL and any number of relation/index
/// files share one root directory), so the file name is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockId {
    file_name: String,
    block_number: u64,
}

impl BlockId {
    pub fn new(file_name: impl Into<String>, block_number: u64) -> Self {
        Self {
            file_name: file_name.into(),
            block_number,
        }
    }

    /// The sentinel `BlockId` meaning "no block." Carries `file_name` for
    /// display purposes only; never resolves to real storage.
    pub fn eof(file_name: impl Into<String>) -> Self {
        Self::new(file_name, BLOCK_EOF)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn is_eof(&self) -> bool {
        self.block_number == BLOCK_EOF
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[file {}, block {}]", self.file_name, self.block_number)
    }
}
