//! Slotted heap page with a bitmap header.
//!
//! For a tuple width of `S` bytes the page holds
//! `slot_count = (PAGE_SIZE * 8) / (S * 8 + 1)` fixed-size slots: each slot
//! costs its tuple bytes plus one header bit. The header is
//! `ceil(slot_count / 8)` bytes of used-slot bitmap, least significant bit
//! first, followed by the slot bodies. A zero-filled buffer parses as a
//! valid empty page, which is how pages past end-of-file materialize.

use crate::access::tuple::{RecordId, Tuple, TupleDesc};
use crate::error::{DbError, DbResult};
use crate::storage::page::{Page, PageId};
use crate::storage::PAGE_SIZE;
use crate::transaction::id::TransactionId;
use std::any::Any;

pub struct HeapPage {
    pid: PageId,
    desc: TupleDesc,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirty_by: Option<TransactionId>,
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Number of tuple slots a page holds for the given schema.
    pub fn slot_count(desc: &TupleDesc) -> usize {
        (PAGE_SIZE * 8) / (desc.byte_size() * 8 + 1)
    }

    /// Bytes of bitmap needed to cover every slot.
    fn header_size(desc: &TupleDesc) -> usize {
        Self::slot_count(desc).div_ceil(8)
    }

    /// Parses a page from its on-disk bytes. The initial before-image is the
    /// parsed content itself: what is on disk is by definition committed.
    pub fn from_bytes(pid: PageId, desc: TupleDesc, data: &[u8]) -> DbResult<Self> {
        if data.len() != PAGE_SIZE {
            return Err(DbError::IllegalArgument(format!(
                "page buffer is {} bytes, expected {}",
                data.len(),
                PAGE_SIZE
            )));
        }

        let slot_count = Self::slot_count(&desc);
        let header_size = Self::header_size(&desc);
        let tuple_size = desc.byte_size();

        let header = data[..header_size].to_vec();
        let mut tuples = Vec::with_capacity(slot_count);
        for slot in 0..slot_count {
            if header[slot / 8] >> (slot % 8) & 1 == 1 {
                let offset = header_size + slot * tuple_size;
                let mut tuple = Tuple::read_from(&desc, &data[offset..offset + tuple_size])?;
                tuple.set_record_id(Some(RecordId::new(pid, slot)));
                tuples.push(Some(tuple));
            } else {
                tuples.push(None);
            }
        }

        let mut page = Self {
            pid,
            desc,
            header,
            tuples,
            dirty_by: None,
            before_image: Vec::new(),
        };
        page.before_image = page.serialize();
        Ok(page)
    }

    /// A fresh, empty page.
    pub fn empty(pid: PageId, desc: TupleDesc) -> Self {
        Self::from_bytes(pid, desc, &[0u8; PAGE_SIZE]).expect("zeroed buffer is a valid page")
    }

    fn serialize(&self) -> Vec<u8> {
        let tuple_size = self.desc.byte_size();
        let header_size = self.header.len();
        let mut data = vec![0u8; PAGE_SIZE];
        data[..header_size].copy_from_slice(&self.header);
        for (slot, tuple) in self.tuples.iter().enumerate() {
            if let Some(tuple) = tuple {
                let offset = header_size + slot * tuple_size;
                tuple.write_to(&mut data[offset..offset + tuple_size]);
            }
        }
        data
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.tuples.len() && self.header[slot / 8] >> (slot % 8) & 1 == 1
    }

    pub fn num_empty_slots(&self) -> usize {
        self.tuples.iter().filter(|t| t.is_none()).count()
    }

    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    fn set_slot_used(&mut self, slot: usize, used: bool) {
        if used {
            self.header[slot / 8] |= 1 << (slot % 8);
        } else {
            self.header[slot / 8] &= !(1 << (slot % 8));
        }
    }

    /// Places the tuple in the first free slot and stamps its record id.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> DbResult<()> {
        if tuple.desc() != &self.desc {
            return Err(DbError::IllegalArgument(
                "tuple schema does not match page schema".into(),
            ));
        }
        let slot = self
            .tuples
            .iter()
            .position(|t| t.is_none())
            .ok_or(DbError::PageFull(self.pid))?;

        tuple.set_record_id(Some(RecordId::new(self.pid, slot)));
        self.set_slot_used(slot, true);
        self.tuples[slot] = Some(tuple.clone());
        Ok(())
    }

    /// Clears the slot named by `rid`.
    pub fn delete_tuple(&mut self, rid: RecordId) -> DbResult<()> {
        if rid.page_id != self.pid {
            return Err(DbError::IllegalArgument(format!(
                "record id names page {}, this is page {}",
                rid.page_id, self.pid
            )));
        }
        if rid.slot >= self.tuples.len() {
            return Err(DbError::IllegalArgument(format!(
                "slot {} out of range (page has {} slots)",
                rid.slot,
                self.tuples.len()
            )));
        }
        if self.tuples[rid.slot].is_none() {
            return Err(DbError::NoSuchElement(format!(
                "slot {} of page {} is empty",
                rid.slot, self.pid
            )));
        }
        self.set_slot_used(rid.slot, false);
        self.tuples[rid.slot] = None;
        Ok(())
    }

    /// Tuples in slot order, used slots only.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().flatten()
    }
}

impl Page for HeapPage {
    fn id(&self) -> PageId {
        self.pid
    }

    fn page_data(&self) -> Vec<u8> {
        self.serialize()
    }

    fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirty_by = tid;
    }

    fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirty_by
    }

    fn set_before_image(&mut self) {
        self.before_image = self.serialize();
    }

    fn before_image_data(&self) -> Vec<u8> {
        self.before_image.clone()
    }

    fn restore_before_image(&mut self) {
        let restored = Self::from_bytes(self.pid, self.desc.clone(), &self.before_image)
            .expect("before-image is a previously serialized page");
        self.header = restored.header;
        self.tuples = restored.tuples;
        self.dirty_by = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
