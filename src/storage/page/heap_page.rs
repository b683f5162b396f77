// Slotted heap page codec.
//
// A page image is a bitmap header followed by N fixed-width tuple slots:
//
//   N           = floor(page_size * 8 / (tuple_bytes * 8 + 1))
//   header_len  = ceil(N / 8)
//
// Bit `i % 8` of header byte `i / 8` is 1 when slot `i` is occupied.
// Slot payloads follow the header in ascending slot order; everything
// past the last slot up to `page_size` is zero.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::types::{page_size, PageId, RecordId, TransactionId};
use crate::storage::page::PageError;
use crate::storage::tuple::{Field, Tuple, TupleDesc};

/// Shared handle to a cached page
pub type PagePtr = Arc<RwLock<HeapPage>>;

/// In-memory form of one slotted page.
pub struct HeapPage {
    pid: PageId,
    desc: Arc<TupleDesc>,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirty: Option<TransactionId>,
}

impl HeapPage {
    /// Number of tuple slots a page holds under the given schema.
    pub fn slots_per_page(desc: &TupleDesc) -> usize {
        (page_size() * 8) / (desc.tuple_bytes() * 8 + 1)
    }

    /// Header length in bytes for the given slot count.
    pub fn header_len(slots: usize) -> usize {
        (slots + 7) / 8
    }

    /// A fresh all-zero page image.
    pub fn empty_page_data() -> Vec<u8> {
        vec![0u8; page_size()]
    }

    /// Decode a page image.
    pub fn new(pid: PageId, data: &[u8], desc: Arc<TupleDesc>) -> Result<Self, PageError> {
        if data.len() != page_size() {
            return Err(PageError::BadImage {
                got: data.len(),
                want: page_size(),
            });
        }

        let slots = Self::slots_per_page(&desc);
        let header_len = Self::header_len(slots);
        let width = desc.tuple_bytes();
        let header = data[..header_len].to_vec();

        let mut tuples = Vec::with_capacity(slots);
        for slot in 0..slots {
            if header[slot / 8] & (1 << (slot % 8)) == 0 {
                tuples.push(None);
                continue;
            }
            let base = header_len + slot * width;
            let mut fields = Vec::with_capacity(desc.num_fields());
            let mut offset = base;
            for item in desc.items() {
                let len = item.field_type.byte_len();
                fields.push(Field::read_from(item.field_type, &data[offset..offset + len]));
                offset += len;
            }
            let mut tuple = Tuple::new(desc.clone(), fields);
            tuple.set_record_id(Some(RecordId::new(pid, slot)));
            tuples.push(Some(tuple));
        }

        Ok(HeapPage {
            pid,
            desc,
            header,
            tuples,
            dirty: None,
        })
    }

    /// Encode back into an exact `page_size()` image.
    pub fn page_data(&self) -> Vec<u8> {
        let mut data = vec![0u8; page_size()];
        let header_len = self.header.len();
        data[..header_len].copy_from_slice(&self.header);

        let width = self.desc.tuple_bytes();
        for (slot, tuple) in self.tuples.iter().enumerate() {
            let Some(tuple) = tuple else { continue };
            let mut offset = header_len + slot * width;
            for field in tuple.fields() {
                let len = field.field_type().byte_len();
                field.write_to(&mut data[offset..offset + len]);
                offset += len;
            }
        }
        data
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn num_slots(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        self.header[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn set_slot(&mut self, slot: usize, used: bool) {
        if used {
            self.header[slot / 8] |= 1 << (slot % 8);
        } else {
            self.header[slot / 8] &= !(1 << (slot % 8));
        }
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.tuples.len()).filter(|&s| !self.is_slot_used(s)).count()
    }

    /// Place `tuple` in the lowest free slot and stamp its record id.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<(), PageError> {
        tuple.check_schema(&self.desc)?;
        let slot = (0..self.tuples.len())
            .find(|&s| !self.is_slot_used(s))
            .ok_or(PageError::PageFull)?;
        tuple.set_record_id(Some(RecordId::new(self.pid, slot)));
        self.set_slot(slot, true);
        self.tuples[slot] = Some(tuple.clone());
        Ok(())
    }

    /// Clear the slot named by the tuple's record id.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<(), PageError> {
        let rid = tuple.record_id().ok_or(PageError::TupleNotFound)?;
        if rid.page_id != self.pid || rid.slot >= self.tuples.len() || !self.is_slot_used(rid.slot) {
            return Err(PageError::TupleNotFound);
        }
        self.set_slot(rid.slot, false);
        self.tuples[rid.slot] = None;
        Ok(())
    }

    /// Occupied tuples in ascending slot order. Each call starts fresh.
    pub fn iter(&self) -> impl Iterator<Item = Tuple> + '_ {
        self.tuples.iter().filter_map(|t| t.clone())
    }

    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirty = tid;
    }

    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{set_page_size, DEFAULT_PAGE_SIZE};
    use crate::storage::tuple::FieldType;

    fn int_desc() -> Arc<TupleDesc> {
        Arc::new(TupleDesc::with_types(vec![FieldType::Int]))
    }

    fn pid() -> PageId {
        PageId::new(7, 0)
    }

    #[test]
    fn slot_math() {
        set_page_size(DEFAULT_PAGE_SIZE);
        let desc = int_desc();
        // 4096 * 8 / (4 * 8 + 1) = 992 slots, 124 header bytes
        assert_eq!(HeapPage::slots_per_page(&desc), 992);
        assert_eq!(HeapPage::header_len(992), 124);
    }

    #[test]
    fn empty_page_has_all_slots_free() {
        set_page_size(DEFAULT_PAGE_SIZE);
        let desc = int_desc();
        let page = HeapPage::new(pid(), &HeapPage::empty_page_data(), desc.clone()).unwrap();
        assert_eq!(page.num_empty_slots(), page.num_slots());
        assert_eq!(page.iter().count(), 0);
    }

    #[test]
    fn encode_decode_round_trip() {
        set_page_size(DEFAULT_PAGE_SIZE);
        let desc = int_desc();
        let mut page = HeapPage::new(pid(), &HeapPage::empty_page_data(), desc.clone()).unwrap();

        for v in [3, 1, 4, 1, 5] {
            let mut t = Tuple::new(desc.clone(), vec![Field::Int(v)]);
            page.insert_tuple(&mut t).unwrap();
        }

        let image = page.page_data();
        assert_eq!(image.len(), page_size());

        let decoded = HeapPage::new(pid(), &image, desc.clone()).unwrap();
        assert_eq!(decoded.page_data(), image);
        assert_eq!(decoded.num_empty_slots(), page.num_empty_slots());
        let values: Vec<_> = decoded.iter().map(|t| t.field(0).clone()).collect();
        assert_eq!(
            values,
            vec![
                Field::Int(3),
                Field::Int(1),
                Field::Int(4),
                Field::Int(1),
                Field::Int(5)
            ]
        );
    }

    #[test]
    fn empty_slot_count_matches_header_bits() {
        set_page_size(DEFAULT_PAGE_SIZE);
        let desc = int_desc();
        let mut page = HeapPage::new(pid(), &HeapPage::empty_page_data(), desc.clone()).unwrap();
        let total = page.num_slots();

        for v in 0..10 {
            let mut t = Tuple::new(desc.clone(), vec![Field::Int(v)]);
            page.insert_tuple(&mut t).unwrap();
        }
        assert_eq!(page.num_empty_slots(), total - 10);

        let cleared = (0..total).filter(|&s| !page.is_slot_used(s)).count();
        assert_eq!(page.num_empty_slots(), cleared);
    }

    #[test]
    fn insert_assigns_lowest_free_slot() {
        set_page_size(DEFAULT_PAGE_SIZE);
        let desc = int_desc();
        let mut page = HeapPage::new(pid(), &HeapPage::empty_page_data(), desc.clone()).unwrap();

        let mut a = Tuple::new(desc.clone(), vec![Field::Int(10)]);
        let mut b = Tuple::new(desc.clone(), vec![Field::Int(20)]);
        let mut c = Tuple::new(desc.clone(), vec![Field::Int(30)]);
        page.insert_tuple(&mut a).unwrap();
        page.insert_tuple(&mut b).unwrap();
        page.delete_tuple(&a).unwrap();
        page.insert_tuple(&mut c).unwrap();

        assert_eq!(c.record_id().unwrap().slot, 0);
    }

    #[test]
    fn delete_rejects_foreign_and_empty_slots() {
        set_page_size(DEFAULT_PAGE_SIZE);
        let desc = int_desc();
        let mut page = HeapPage::new(pid(), &HeapPage::empty_page_data(), desc.clone()).unwrap();

        // never inserted anywhere
        let t = Tuple::new(desc.clone(), vec![Field::Int(1)]);
        assert!(matches!(page.delete_tuple(&t), Err(PageError::TupleNotFound)));

        // wrong page
        let mut t = Tuple::new(desc.clone(), vec![Field::Int(1)]);
        t.set_record_id(Some(RecordId::new(PageId::new(9, 3), 0)));
        assert!(matches!(page.delete_tuple(&t), Err(PageError::TupleNotFound)));
    }

    #[test]
    fn insert_rejects_schema_mismatch() {
        set_page_size(DEFAULT_PAGE_SIZE);
        let desc = int_desc();
        let mut page = HeapPage::new(pid(), &HeapPage::empty_page_data(), desc).unwrap();
        let other = Arc::new(TupleDesc::with_types(vec![FieldType::Str]));
        let mut t = Tuple::new(other, vec![Field::Str("nope".into())]);
        assert!(matches!(
            page.insert_tuple(&mut t),
            Err(PageError::SchemaMismatch(_))
        ));
    }
}
