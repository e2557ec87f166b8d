/*
 * Copyright (c) 2026.  tarnlog contributors.
 * Please refer to the project repository for more information about this project and its license.
 */

//! Slotted Page.
//!
//! The on-page record layout shared by heap tables and index pages: a
//! header, a slot directory growing from the header end, records growing
//! down from the high end, and an optional special region. Field layout
//! is described by an arbitrary `FieldSpec` list rather than a fixed
//! tuple shape, and space freed by deletion is reclaimed only by an
//! explicit `compact()` pass rather than eagerly.
//!
//! A `SlottedPage` never owns page bytes — every read and write goes
//! through the caller-supplied [`Transaction`]; it borrows the frame via
//! that abstraction and never owns page memory directly.

use crate::block::BlockId;
use crate::error::{PageError, Result};
use crate::transaction::Transaction;
use crate::types::PAGE_SIZE;

const BLOCK_NUMBER_OFFSET: u16 = 0;
const NUM_SLOTS_OFFSET: u16 = 8;
const FREE_SPACE_END_OFFSET: u16 = 10;
const SPECIAL_SPACE_START_OFFSET: u16 = 12;
const HEADER_SIZE: u16 = 14;

const SLOT_SIZE: u16 = 8;

const RECORD_HEADER_SIZE: u16 = 12;
const XMIN_OFFSET: u16 = 0;
const XMAX_OFFSET: u16 = 4;
#[allow(dead_code)]
const TXOP_OFFSET: u16 = 8;
const RECFLAGS_OFFSET: u16 = 10;
const RECFLAG_UPDATED: u16 = 1;

pub const FLAG_EMPTY: u32 = 1;
pub const FLAG_IN_USE: u32 = 2;
pub const FLAG_DELETED: u32 = 4;

const PAGE_SIZE_U16: u16 = PAGE_SIZE as u16;

/// A slot directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    pub offset: u16,
    pub length: u16,
    pub flags: u32,
}

/// One field in a record's layout, used by [`SlottedPage::field_offset`]
/// to walk from the record start to a named field.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    Fixed(u16),
    Varlen,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
}

/// Forward iterator over a page's live slots, built on [`SlottedPage::next_after`].
pub struct RecordIter<'p, 't> {
    page: &'p SlottedPage<'t>,
    cursor: Option<u16>,
    done: bool,
}

impl Iterator for RecordIter<'_, '_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.done {
            return None;
        }
        match self.page.next_after(self.cursor) {
            Ok(slot) => {
                self.cursor = Some(slot);
                Some(slot)
            }
            Err(_) => {
                self.done = true;
                None
            }
        }
    }
}

/// A slotted-page view over one pinned block, borrowed through a
/// [`Transaction`].
pub struct SlottedPage<'t> {
    tx: &'t dyn Transaction,
    block: BlockId,
}

impl<'t> SlottedPage<'t> {
    pub fn new(tx: &'t dyn Transaction, block: BlockId) -> Self {
        Self { tx, block }
    }

    pub fn block(&self) -> &BlockId {
        &self.block
    }

    // --- low-level fixed-width helpers, all routed through the transaction ---

    fn read_u16(&self, offset: u16) -> Result<u16> {
        let bytes = self.tx.fixedlen(&self.block, offset, 2)?;
        Ok(u16::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn write_u16(&self, offset: u16, value: u16, should_log: bool) -> Result<()> {
        self.tx
            .set_fixedlen(&self.block, offset, 2, &value.to_le_bytes(), should_log)
    }

    fn read_u32(&self, offset: u16) -> Result<u32> {
        let bytes = self.tx.fixedlen(&self.block, offset, 4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn write_u32(&self, offset: u16, value: u32, should_log: bool) -> Result<()> {
        self.tx
            .set_fixedlen(&self.block, offset, 4, &value.to_le_bytes(), should_log)
    }

    fn read_u64(&self, offset: u16) -> Result<u64> {
        let bytes = self.tx.fixedlen(&self.block, offset, 8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn write_u64(&self, offset: u16, value: u64, should_log: bool) -> Result<()> {
        self.tx
            .set_fixedlen(&self.block, offset, 8, &value.to_le_bytes(), should_log)
    }

    // --- header ---

    pub fn block_number(&self) -> Result<u64> {
        self.read_u64(BLOCK_NUMBER_OFFSET)
    }

    pub fn num_slots(&self) -> Result<u16> {
        self.read_u16(NUM_SLOTS_OFFSET)
    }

    fn set_num_slots(&self, n: u16, should_log: bool) -> Result<()> {
        self.write_u16(NUM_SLOTS_OFFSET, n, should_log)
    }

    pub fn free_space_end(&self) -> Result<u16> {
        self.read_u16(FREE_SPACE_END_OFFSET)
    }

    fn set_free_space_end(&self, value: u16, should_log: bool) -> Result<()> {
        self.write_u16(FREE_SPACE_END_OFFSET, value, should_log)
    }

    pub fn special_space_start(&self) -> Result<u16> {
        self.read_u16(SPECIAL_SPACE_START_OFFSET)
    }

    fn set_special_space_start(&self, value: u16, should_log: bool) -> Result<()> {
        self.write_u16(SPECIAL_SPACE_START_OFFSET, value, should_log)
    }

    /// Panicking ergonomic accessor over a value validated by an earlier
    /// call in the same operation. Reserved for values that a prior call
    /// in the same operation already checked; failure here means the page
    /// is corrupt.
    pub fn must_num_slots(&self) -> u16 {
        self.num_slots().expect("num_slots must be readable on a well-formed page")
    }

    pub fn must_free_space_end(&self) -> u16 {
        self.free_space_end()
            .expect("free_space_end must be readable on a well-formed page")
    }

    /// Write a fresh header.
    pub fn format(&self, special_size: u16, should_log: bool) -> Result<()> {
        self.write_u64(BLOCK_NUMBER_OFFSET, self.block.block_number(), should_log)?;
        self.set_num_slots(0, should_log)?;
        let boundary = PAGE_SIZE_U16 - special_size;
        self.set_free_space_end(boundary, should_log)?;
        self.set_special_space_start(boundary, should_log)?;
        Ok(())
    }

    // --- slot directory ---

    fn slot_offset(slot: u16) -> u16 {
        HEADER_SIZE + slot * SLOT_SIZE
    }

    pub fn slot(&self, slot: u16) -> Result<SlotInfo> {
        let num_slots = self.num_slots()?;
        if slot >= num_slots {
            return Err(PageError::SlotOutOfBounds { slot, num_slots }.into());
        }
        let base = Self::slot_offset(slot);
        Ok(SlotInfo {
            offset: self.read_u16(base)?,
            length: self.read_u16(base + 2)?,
            flags: self.read_u32(base + 4)?,
        })
    }

    fn write_slot(&self, slot: u16, info: SlotInfo, should_log: bool) -> Result<()> {
        let base = Self::slot_offset(slot);
        self.write_u16(base, info.offset, should_log)?;
        self.write_u16(base + 2, info.length, should_log)?;
        self.write_u32(base + 4, info.flags, should_log)?;
        Ok(())
    }

    fn write_record_header(&self, record_offset: u16, updating: bool, should_log: bool) -> Result<()> {
        self.write_u32(record_offset + XMIN_OFFSET, self.tx.id(), should_log)?;
        self.write_u32(record_offset + XMAX_OFFSET, 0, should_log)?;
        let flags = if updating { RECFLAG_UPDATED } else { 0 };
        self.write_u16(record_offset + RECFLAGS_OFFSET, flags, should_log)?;
        Ok(())
    }

    pub fn is_deleted(&self, slot: u16) -> Result<bool> {
        Ok(self.slot(slot)?.flags == FLAG_DELETED)
    }

    /// Residual capacity between the end of the slot directory and the
    /// start of the records region.
    pub fn available_space(&self) -> Result<usize> {
        let free_space_end = self.free_space_end()? as usize;
        let num_slots = self.num_slots()? as usize;
        let slot_dir_end = HEADER_SIZE as usize + num_slots * SLOT_SIZE as usize;
        Ok(free_space_end.saturating_sub(slot_dir_end))
    }

    /// Whether `sizes` could all be inserted as fresh records, accounting
    /// for per-record headers and slot-directory growth.
    pub fn records_fit(&self, sizes: &[usize]) -> Result<bool> {
        let avail = self.available_space()?;
        let needed: usize = sizes
            .iter()
            .map(|s| s + RECORD_HEADER_SIZE as usize + SLOT_SIZE as usize)
            .sum();
        Ok(avail >= needed)
    }

    /// First-fit reuse of an `Empty` slot after `slot_hint`, else append a
    /// fresh slot and record.
    pub fn insert_after(
        &self,
        slot_hint: Option<u16>,
        record_size: usize,
        updating: bool,
        should_log: bool,
    ) -> Result<u16> {
        let num_slots = self.num_slots()?;
        let start = slot_hint.map(|s| s + 1).unwrap_or(0);
        for slot in start..num_slots {
            let info = self.slot(slot)?;
            if info.flags == FLAG_EMPTY && info.length as usize >= record_size {
                self.write_record_header(info.offset, updating, should_log)?;
                let new_info = SlotInfo {
                    offset: info.offset,
                    length: record_size as u16,
                    flags: FLAG_IN_USE,
                };
                self.write_slot(slot, new_info, should_log)?;
                return Ok(slot);
            }
        }

        let needed = record_size + RECORD_HEADER_SIZE as usize + SLOT_SIZE as usize;
        let avail = self.available_space()?;
        if avail < needed {
            return Err(PageError::NoFreeSlot { requested: record_size }.into());
        }

        let free_space_end = self.free_space_end()?;
        let new_offset = free_space_end - (record_size as u16 + RECORD_HEADER_SIZE);
        self.write_record_header(new_offset, updating, should_log)?;
        let slot = num_slots;
        self.write_slot(
            slot,
            SlotInfo {
                offset: new_offset,
                length: record_size as u16,
                flags: FLAG_IN_USE,
            },
            should_log,
        )?;
        self.set_num_slots(num_slots + 1, should_log)?;
        self.set_free_space_end(new_offset, should_log)?;
        Ok(slot)
    }

    /// Insert at an exact slot index, shifting `slot[slot..num_slots]`
    /// one position right.
    pub fn insert_at(&self, slot: u16, record_size: usize, should_log: bool) -> Result<()> {
        let num_slots = self.num_slots()?;
        if slot > num_slots {
            return Err(PageError::SlotOutOfBounds { slot, num_slots }.into());
        }
        let needed = record_size + RECORD_HEADER_SIZE as usize + SLOT_SIZE as usize;
        let avail = self.available_space()?;
        if avail < needed {
            return Err(PageError::NoFreeSpace {
                requested: record_size,
                available: avail,
            }
            .into());
        }

        for i in (slot..num_slots).rev() {
            let info = self.slot(i)?;
            self.write_slot(i + 1, info, should_log)?;
        }

        let free_space_end = self.free_space_end()?;
        let new_offset = free_space_end - (record_size as u16 + RECORD_HEADER_SIZE);
        self.write_record_header(new_offset, false, should_log)?;
        self.write_slot(
            slot,
            SlotInfo {
                offset: new_offset,
                length: record_size as u16,
                flags: FLAG_IN_USE,
            },
            should_log,
        )?;
        self.set_num_slots(num_slots + 1, should_log)?;
        self.set_free_space_end(new_offset, should_log)?;
        Ok(())
    }

    /// Mark a slot `Deleted` and stamp `xmax`. Bytes remain until
    /// `compact()`.
    pub fn delete(&self, slot: u16, should_log: bool) -> Result<()> {
        let mut info = self.slot(slot)?;
        info.flags = FLAG_DELETED;
        self.write_slot(slot, info, should_log)?;
        self.write_u32(info.offset + XMAX_OFFSET, self.tx.id(), should_log)?;
        Ok(())
    }

    /// First `InUse` slot strictly after `slot_hint`, skipping records
    /// this transaction inserted via update-then-reinsert in the same
    /// statement (the "updating" flag), which prevents a scan from
    /// revisiting a record it just rewrote earlier in the same
    /// statement. Fails with `NoFreeSlot` once the directory is
    /// exhausted.
    pub fn next_after(&self, slot_hint: Option<u16>) -> Result<u16> {
        let num_slots = self.num_slots()?;
        let start = slot_hint.map(|s| s + 1).unwrap_or(0);
        for slot in start..num_slots {
            let info = self.slot(slot)?;
            if info.flags != FLAG_IN_USE {
                continue;
            }
            let xmin = self.read_u32(info.offset + XMIN_OFFSET)?;
            let rec_flags = self.read_u16(info.offset + RECFLAGS_OFFSET)?;
            if xmin == self.tx.id() && rec_flags & RECFLAG_UPDATED != 0 {
                continue;
            }
            return Ok(slot);
        }
        Err(PageError::NoFreeSlot { requested: 0 }.into())
    }

    /// Walk every live slot in directory order via repeated `next_after`
    /// calls, stopping cleanly at `NoFreeSlot` instead of surfacing it as
    /// an error to the caller.
    pub fn records(&self) -> RecordIter<'_, 't> {
        RecordIter { page: self, cursor: None, done: false }
    }

    /// Offset of `field_name`'s first byte within `slot`'s record, walking
    /// `layout` from the record start.
    pub fn field_offset(&self, slot: u16, field_name: &str, layout: &[FieldSpec]) -> Result<u16> {
        let info = self.slot(slot)?;
        let mut cursor = info.offset + RECORD_HEADER_SIZE;
        for field in layout {
            if field.name == field_name {
                return Ok(cursor);
            }
            cursor += match field.ty {
                FieldType::Fixed(width) => width,
                FieldType::Varlen => 4 + self.read_u32(cursor)? as u16,
            };
        }
        Err(PageError::InvalidField(field_name.to_string()).into())
    }

    pub fn fixed_len(&self, slot: u16, field_name: &str, width: u16, layout: &[FieldSpec]) -> Result<Vec<u8>> {
        let offset = self.field_offset(slot, field_name, layout)?;
        self.tx.fixedlen(&self.block, offset, width as usize)
    }

    pub fn set_fixed_len(
        &self,
        slot: u16,
        field_name: &str,
        width: u16,
        value: &[u8],
        layout: &[FieldSpec],
        should_log: bool,
    ) -> Result<()> {
        let offset = self.field_offset(slot, field_name, layout)?;
        self.tx.set_fixedlen(&self.block, offset, width as usize, value, should_log)
    }

    pub fn var_len(&self, slot: u16, field_name: &str, layout: &[FieldSpec]) -> Result<Vec<u8>> {
        let offset = self.field_offset(slot, field_name, layout)?;
        self.tx.varlen(&self.block, offset)
    }

    pub fn set_var_len(
        &self,
        slot: u16,
        field_name: &str,
        value: &[u8],
        layout: &[FieldSpec],
        should_log: bool,
    ) -> Result<()> {
        let offset = self.field_offset(slot, field_name, layout)?;
        self.tx.set_varlen(&self.block, offset, value, should_log)
    }

    // --- special region (used by index pages) ---
    //
    // Offsets here are relative to `special_space_start`, not the page
    // start — the special region is the trailing `[special_space_start,
    // page_size)` span carved out by `format`.

    pub fn fixed_len_at_special(&self, offset: u16, width: u16) -> Result<Vec<u8>> {
        let base = self.special_space_start()?;
        self.tx.fixedlen(&self.block, base + offset, width as usize)
    }

    pub fn set_fixed_len_at_special(&self, offset: u16, width: u16, value: &[u8], should_log: bool) -> Result<()> {
        let base = self.special_space_start()?;
        self.tx
            .set_fixedlen(&self.block, base + offset, width as usize, value, should_log)
    }

    pub fn var_len_at_special(&self, offset: u16) -> Result<Vec<u8>> {
        let base = self.special_space_start()?;
        self.tx.varlen(&self.block, base + offset)
    }

    pub fn set_var_len_at_special(&self, offset: u16, value: &[u8], should_log: bool) -> Result<()> {
        let base = self.special_space_start()?;
        self.tx.set_varlen(&self.block, base + offset, value, should_log)
    }

    /// Remove all slots `>= slot`, then reclaim their space.
    pub fn truncate(&self, slot: u16, should_log: bool) -> Result<()> {
        self.set_num_slots(slot, should_log)?;
        self.compact(should_log)
    }

    /// Remove a single slot directory entry by shifting the entries after
    /// it left by one; record bytes are untouched.
    pub fn shift_slots_left(&self, slot: u16, should_log: bool) -> Result<()> {
        let num_slots = self.num_slots()?;
        if slot >= num_slots {
            return Err(PageError::SlotOutOfBounds { slot, num_slots }.into());
        }
        for i in (slot + 1)..num_slots {
            let info = self.slot(i)?;
            self.write_slot(i - 1, info, should_log)?;
        }
        self.set_num_slots(num_slots - 1, should_log)
    }

    /// Reclaim space left behind by deleted records. Idempotent: running
    /// it twice in a row is a no-op the second time, since every `InUse`
    /// record is already packed against `special_space_start`.
    pub fn compact(&self, should_log: bool) -> Result<()> {
        let num_slots = self.num_slots()?;
        let mut infos = Vec::with_capacity(num_slots as usize);
        for slot in 0..num_slots {
            infos.push(self.slot(slot)?);
        }

        let mut order: Vec<usize> = (0..infos.len()).collect();
        order.sort_by(|&a, &b| infos[b].offset.cmp(&infos[a].offset));

        let mut cursor = self.special_space_start()?;
        for i in order {
            if infos[i].flags != FLAG_IN_USE {
                continue;
            }
            let full_len = infos[i].length + RECORD_HEADER_SIZE;
            cursor -= full_len;
            if cursor != infos[i].offset {
                self.tx
                    .copy(&self.block, infos[i].offset, cursor, full_len as usize, should_log)?;
            }
            infos[i].offset = cursor;
            self.write_slot(i as u16, infos[i], should_log)?;
        }
        self.set_free_space_end(cursor, should_log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::test_support::MockTransaction;

    fn page(tx: &MockTransaction, block: &BlockId) -> SlottedPage<'_> {
        tx.pin(block).unwrap();
        SlottedPage::new(tx, block.clone())
    }

    #[test]
    fn format_initializes_an_empty_header() {
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();

        assert_eq!(sp.num_slots().unwrap(), 0);
        assert_eq!(sp.free_space_end().unwrap(), PAGE_SIZE_U16);
        assert_eq!(sp.special_space_start().unwrap(), PAGE_SIZE_U16);
    }

    #[test]
    fn insert_and_read_back_a_fixed_width_record() {
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();

        let layout = [FieldSpec {
            name: "value",
            ty: FieldType::Fixed(4),
        }];
        let slot = sp.insert_after(None, 4, false, true).unwrap();
        sp.set_fixed_len(slot, "value", 4, &255u32.to_le_bytes(), &layout, true)
            .unwrap();

        let read_back = sp.fixed_len(slot, "value", 4, &layout).unwrap();
        assert_eq!(u32::from_le_bytes(read_back.try_into().unwrap()), 255);
    }

    #[test]
    fn insert_and_read_multiple_mixed_fields() {
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();

        let layout = [
            FieldSpec { name: "a", ty: FieldType::Fixed(1) },
            FieldSpec { name: "b", ty: FieldType::Varlen },
            FieldSpec { name: "c", ty: FieldType::Fixed(4) },
            FieldSpec { name: "d", ty: FieldType::Varlen },
        ];
        let b_val = b"This is a variable string";
        let d_val = b"This is another string";
        let record_size = 1 + (4 + b_val.len()) + 4 + (4 + d_val.len());

        let slot = sp.insert_after(None, record_size, false, true).unwrap();
        sp.set_fixed_len(slot, "a", 1, &[12u8], &layout, true).unwrap();
        sp.set_var_len(slot, "b", b_val, &layout, true).unwrap();
        sp.set_fixed_len(slot, "c", 4, &4_567_890u32.to_le_bytes(), &layout, true)
            .unwrap();
        sp.set_var_len(slot, "d", d_val, &layout, true).unwrap();

        assert_eq!(sp.fixed_len(slot, "a", 1, &layout).unwrap(), vec![12u8]);
        assert_eq!(sp.var_len(slot, "b", &layout).unwrap(), b_val);
        assert_eq!(
            u32::from_le_bytes(sp.fixed_len(slot, "c", 4, &layout).unwrap().try_into().unwrap()),
            4_567_890
        );
        assert_eq!(sp.var_len(slot, "d", &layout).unwrap(), d_val);
    }

    #[test]
    fn compaction_reclaims_deleted_slot_space() {
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();

        let layout = [FieldSpec { name: "v", ty: FieldType::Fixed(4) }];
        let mut slots = Vec::new();
        for v in [255u32, 1023, 999_813] {
            let slot = sp.insert_after(None, 4, false, true).unwrap();
            sp.set_fixed_len(slot, "v", 4, &v.to_le_bytes(), &layout, true).unwrap();
            slots.push(slot);
        }

        sp.delete(slots[1], true).unwrap();
        sp.compact(true).unwrap();

        assert_eq!(sp.free_space_end().unwrap(), PAGE_SIZE_U16 - 2 * (12 + 4));
        assert_eq!(
            u32::from_le_bytes(sp.fixed_len(slots[0], "v", 4, &layout).unwrap().try_into().unwrap()),
            255
        );
        assert_eq!(
            u32::from_le_bytes(sp.fixed_len(slots[2], "v", 4, &layout).unwrap().try_into().unwrap()),
            999_813
        );
        assert!(sp.is_deleted(slots[1]).unwrap());
    }

    #[test]
    fn compact_is_idempotent() {
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();

        let layout = [FieldSpec { name: "v", ty: FieldType::Fixed(4) }];
        for v in [1u32, 2, 3] {
            let slot = sp.insert_after(None, 4, false, true).unwrap();
            sp.set_fixed_len(slot, "v", 4, &v.to_le_bytes(), &layout, true).unwrap();
        }
        sp.delete(1, true).unwrap();
        sp.compact(true).unwrap();
        let after_first = sp.free_space_end().unwrap();
        sp.compact(true).unwrap();
        assert_eq!(sp.free_space_end().unwrap(), after_first);
    }

    #[test]
    fn next_after_skips_deleted_and_stops_at_end() {
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();

        let s0 = sp.insert_after(None, 4, false, true).unwrap();
        let s1 = sp.insert_after(None, 4, false, true).unwrap();
        sp.delete(s0, true).unwrap();

        let next = sp.next_after(None).unwrap();
        assert_eq!(next, s1);
        assert!(sp.next_after(Some(s1)).is_err());
    }

    #[test]
    fn delete_alone_does_not_free_a_slot_for_reuse() {
        // Delete only flips a slot to `Deleted`; bytes (and the slot
        // entry) are reclaimed solely by `compact`, never implicitly by
        // a later insert. So a fresh insert after a delete must append a
        // new slot rather than reuse the deleted one.
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();

        let a = sp.insert_after(None, 8, false, true).unwrap();
        sp.delete(a, true).unwrap();
        let b = sp.insert_after(None, 4, false, true).unwrap();
        assert_ne!(a, b);
        assert_eq!(sp.num_slots().unwrap(), 2);
    }

    #[test]
    fn insert_after_reuses_an_empty_slot_first_fit() {
        // `insert_after`'s contract is first-fit over `Empty` slots
        // before appending a fresh one. Nothing in this module's own
        // operation set currently produces an `Empty` slot (delete only
        // ever produces `Deleted`), so this test manufactures one
        // directly via the crate-private slot writer to exercise the
        // reuse path on its own.
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();

        let a = sp.insert_after(None, 8, false, true).unwrap();
        let too_small = sp.insert_after(None, 8, false, true).unwrap();
        sp.write_slot(
            a,
            SlotInfo { offset: sp.slot(a).unwrap().offset, length: 8, flags: FLAG_EMPTY },
            true,
        )
        .unwrap();
        sp.write_slot(
            too_small,
            SlotInfo { offset: sp.slot(too_small).unwrap().offset, length: 2, flags: FLAG_EMPTY },
            true,
        )
        .unwrap();

        // A request that fits slot `a` (8 bytes) but not `too_small`
        // (2 bytes) must reuse `a` rather than append a third slot.
        let reused = sp.insert_after(None, 6, false, true).unwrap();
        assert_eq!(reused, a);
        assert_eq!(sp.num_slots().unwrap(), 2);
        assert_eq!(sp.slot(a).unwrap().flags, FLAG_IN_USE);
    }

    #[test]
    fn special_region_round_trip() {
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(512, true).unwrap();
        let special_start = sp.special_space_start().unwrap();
        assert_eq!(special_start, PAGE_SIZE_U16 - 512);

        sp.set_fixed_len_at_special(0, 4, &12345u32.to_le_bytes(), true).unwrap();
        let read_int = sp.fixed_len_at_special(0, 4).unwrap();
        assert_eq!(u32::from_le_bytes(read_int.try_into().unwrap()), 12345);

        sp.set_var_len_at_special(4, b"This is a string", true).unwrap();
        assert_eq!(sp.var_len_at_special(4).unwrap(), b"This is a string");

        // The bytes actually landed inside [special_space_start, page_size),
        // not at the absolute offsets 0/4 passed in — that range is the
        // page header (block_number lives at absolute offset 0).
        let raw_int = sp.tx.fixedlen(&sp.block, special_start, 4).unwrap();
        assert_eq!(u32::from_le_bytes(raw_int.try_into().unwrap()), 12345);
        let raw_str = sp.tx.varlen(&sp.block, special_start + 4).unwrap();
        assert_eq!(raw_str, b"This is a string");

        // The header fields themselves must be untouched.
        assert_eq!(sp.block_number().unwrap(), 0);
        assert_eq!(sp.num_slots().unwrap(), 0);
        assert_eq!(sp.special_space_start().unwrap(), special_start);
    }

    #[test]
    fn truncate_removes_trailing_slots_and_compacts() {
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();

        for v in [1u32, 2, 3] {
            let layout = [FieldSpec { name: "v", ty: FieldType::Fixed(4) }];
            let slot = sp.insert_after(None, 4, false, true).unwrap();
            sp.set_fixed_len(slot, "v", 4, &v.to_le_bytes(), &layout, true).unwrap();
        }
        sp.truncate(1, true).unwrap();
        assert_eq!(sp.num_slots().unwrap(), 1);
        assert_eq!(sp.free_space_end().unwrap(), PAGE_SIZE_U16 - (12 + 4));
    }

    #[test]
    fn records_fit_accounts_for_headers_and_slot_growth() {
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();

        assert!(sp.records_fit(&[4, 4, 4]).unwrap());
        assert!(!sp.records_fit(&[PAGE_SIZE]).unwrap());
    }

    #[test]
    fn insert_at_shifts_later_slots_right() {
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();
        let layout = [FieldSpec { name: "v", ty: FieldType::Fixed(4) }];

        let s0 = sp.insert_after(None, 4, false, true).unwrap();
        sp.set_fixed_len(s0, "v", 4, &1u32.to_le_bytes(), &layout, true).unwrap();
        let s1 = sp.insert_after(None, 4, false, true).unwrap();
        sp.set_fixed_len(s1, "v", 4, &2u32.to_le_bytes(), &layout, true).unwrap();

        // Insert a third record between slot 0 and slot 1's directory
        // entries; the old slot 1 moves to index 2.
        sp.insert_at(1, 4, true).unwrap();
        sp.set_fixed_len(1, "v", 4, &99u32.to_le_bytes(), &layout, true).unwrap();

        assert_eq!(sp.num_slots().unwrap(), 3);
        assert_eq!(
            u32::from_le_bytes(sp.fixed_len(0, "v", 4, &layout).unwrap().try_into().unwrap()),
            1
        );
        assert_eq!(
            u32::from_le_bytes(sp.fixed_len(1, "v", 4, &layout).unwrap().try_into().unwrap()),
            99
        );
        assert_eq!(
            u32::from_le_bytes(sp.fixed_len(2, "v", 4, &layout).unwrap().try_into().unwrap()),
            2
        );
    }

    #[test]
    fn insert_at_out_of_bounds_slot_fails() {
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();
        assert!(sp.insert_at(5, 4, true).is_err());
    }

    #[test]
    fn shift_slots_left_removes_one_directory_entry() {
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();
        let layout = [FieldSpec { name: "v", ty: FieldType::Fixed(4) }];

        let mut slots = Vec::new();
        for v in [1u32, 2, 3] {
            let slot = sp.insert_after(None, 4, false, true).unwrap();
            sp.set_fixed_len(slot, "v", 4, &v.to_le_bytes(), &layout, true).unwrap();
            slots.push(slot);
        }

        // Remove the directory entry for slot 0; slots 1 and 2 shift down
        // to 0 and 1, but the underlying record bytes are untouched.
        sp.shift_slots_left(0, true).unwrap();
        assert_eq!(sp.num_slots().unwrap(), 2);
        assert_eq!(
            u32::from_le_bytes(sp.fixed_len(0, "v", 4, &layout).unwrap().try_into().unwrap()),
            2
        );
        assert_eq!(
            u32::from_le_bytes(sp.fixed_len(1, "v", 4, &layout).unwrap().try_into().unwrap()),
            3
        );
    }

    #[test]
    fn shift_slots_left_out_of_bounds_fails() {
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();
        assert!(sp.shift_slots_left(0, true).is_err());
    }

    #[test]
    fn record_iter_walks_live_slots_in_order_and_skips_deleted() {
        let tx = MockTransaction::new(1);
        let block = BlockId::new("t.tbl", 0);
        let sp = page(&tx, &block);
        sp.format(0, true).unwrap();

        let mut slots = Vec::new();
        for _ in 0..4 {
            slots.push(sp.insert_after(None, 4, false, true).unwrap());
        }
        sp.delete(slots[2], true).unwrap();

        let visited: Vec<u16> = sp.records().collect();
        assert_eq!(visited, vec![slots[0], slots[1], slots[3]]);
    }
}
