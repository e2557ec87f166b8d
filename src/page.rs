/*
 * Copyright (c) 2026.  tarnlog contributors.
 * Please refer to the project repository for more information about this project and its license.
 */

//! [`Page`] — the in-memory representation of one block.
//!
//! A fixed 8 KiB byte buffer with typed accessors at arbitrary offsets.
//! Every multi-byte integer is written little-endian, pinned to a single
//! canonical byte order rather than left to host endianness so an
//! on-disk database stays portable across machines.

use tracing::error;

use crate::error::{PageError, Result};
use crate::types::PAGE_SIZE;

/// Offset within a page. Two bytes.
pub type PageOffset = u16;

/// An 8 KiB byte buffer with typed read/write primitives.
///
/// Each buffer frame owns exactly one `Page`. Slotted-page code never
/// constructs a `Page` directly in production — it borrows one from a
/// pinned buffer frame via the `Transaction` interface — but tests build
/// bare pages freely.
#[derive(Clone)]
pub struct Page {
    bytes: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    /// A page initialized to all zero bytes, matching a freshly appended
    /// block.
    pub fn zeroed() -> Self {
        Self {
            bytes: Box::new([0u8; PAGE_SIZE]),
        }
    }

    /// Wrap an existing byte buffer (e.g. one just read from disk).
    pub fn from_bytes(bytes: Box<[u8; PAGE_SIZE]>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.bytes
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.bytes
    }

    #[inline]
    fn check(&self, offset: usize, width: usize) -> Result<()> {
        if offset + width > PAGE_SIZE {
            error!(offset, width, "page access overflows page bounds");
            return Err(PageError::Corruption(format!(
                "access at offset {offset} of width {width} overflows a {PAGE_SIZE}-byte page"
            ))
            .into());
        }
        Ok(())
    }

    // --- TinyInt (1 byte) ---

    pub fn get_tinyint(&self, offset: PageOffset) -> Result<u8> {
        let offset = offset as usize;
        self.check(offset, 1)?;
        Ok(self.bytes[offset])
    }

    pub fn set_tinyint(&mut self, offset: PageOffset, value: u8) -> Result<()> {
        let offset = offset as usize;
        self.check(offset, 1)?;
        self.bytes[offset] = value;
        Ok(())
    }

    // --- SmallInt (2 bytes) ---

    pub fn get_smallint(&self, offset: PageOffset) -> Result<u16> {
        let offset = offset as usize;
        self.check(offset, 2)?;
        Ok(u16::from_le_bytes(
            self.bytes[offset..offset + 2].try_into().unwrap(),
        ))
    }

    pub fn set_smallint(&mut self, offset: PageOffset, value: u16) -> Result<()> {
        let offset = offset as usize;
        self.check(offset, 2)?;
        self.bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    // --- Int (4 bytes) ---

    pub fn get_int(&self, offset: PageOffset) -> Result<u32> {
        let offset = offset as usize;
        self.check(offset, 4)?;
        Ok(u32::from_le_bytes(
            self.bytes[offset..offset + 4].try_into().unwrap(),
        ))
    }

    pub fn set_int(&mut self, offset: PageOffset, value: u32) -> Result<()> {
        let offset = offset as usize;
        self.check(offset, 4)?;
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    // --- Long (8 bytes) ---

    pub fn get_long(&self, offset: PageOffset) -> Result<u64> {
        let offset = offset as usize;
        self.check(offset, 8)?;
        Ok(u64::from_le_bytes(
            self.bytes[offset..offset + 8].try_into().unwrap(),
        ))
    }

    pub fn set_long(&mut self, offset: PageOffset, value: u64) -> Result<()> {
        let offset = offset as usize;
        self.check(offset, 8)?;
        self.bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    // --- Offset (2-byte unsigned, addressing within a page) ---

    pub fn get_offset(&self, offset: PageOffset) -> Result<PageOffset> {
        self.get_smallint(offset)
    }

    pub fn set_offset(&mut self, offset: PageOffset, value: PageOffset) -> Result<()> {
        self.set_smallint(offset, value)
    }

    // --- Varlen (4-byte length prefix followed by raw bytes) ---

    pub fn get_bytes(&self, offset: PageOffset) -> Result<Vec<u8>> {
        let len = self.get_int(offset)? as usize;
        let start = offset as usize + 4;
        self.check(start, len)?;
        Ok(self.bytes[start..start + len].to_vec())
    }

    pub fn set_bytes(&mut self, offset: PageOffset, value: &[u8]) -> Result<()> {
        self.set_int(offset, value.len() as u32)?;
        let start = offset as usize + 4;
        self.check(start, value.len())?;
        self.bytes[start..start + value.len()].copy_from_slice(value);
        Ok(())
    }

    /// Total bytes a varlen value of `len` occupies, including its 4-byte
    /// length prefix. Used by callers computing how much space a record
    /// needs before attempting an insert.
    pub const fn varlen_size(len: usize) -> usize {
        4 + len
    }

    /// Copy `length` bytes from `src_offset` to `dst_offset` within this
    /// page. Ranges may overlap (used by slotted-page compaction).
    pub fn copy_within(
        &mut self,
        src_offset: PageOffset,
        dst_offset: PageOffset,
        length: usize,
    ) -> Result<()> {
        self.check(src_offset as usize, length)?;
        self.check(dst_offset as usize, length)?;
        self.bytes
            .copy_within(src_offset as usize..src_offset as usize + length, dst_offset as usize);
        Ok(())
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::zeroed()
    }
}
