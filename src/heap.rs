//! Slotted-page heap file: row storage on top of `Pager`.
//!
//! See SPEC_FULL.md §4.2 for the page layout this module implements:
//! a 4-byte header (`num_slots`, reserved), a slot directory growing
//! forward from the header, and row payloads packed backward from the
//! end of the page.

use crate::pager::{Pager, PagerError, PAGE_SIZE};
use crate::value::{decode_row, encode_row, Row};
use log::{debug, trace};
use std::path::Path;

const HEADER_SIZE: usize = 4;
const SLOT_SIZE: usize = 4;

/// Row identifier: `(page_id, slot_id)`. Stable for the life of the row.
pub type Rid = (u64, u16);

#[derive(Debug, thiserror::Error)]
pub enum HeapError {
    #[error(transparent)]
    Pager(#[from] PagerError),
    #[error("slot {slot_id} out of range on page {page_id}")]
    OutOfRange { page_id: u64, slot_id: u16 },
    #[error("slot {slot_id} on page {page_id} has been deleted")]
    Deleted { page_id: u64, slot_id: u16 },
    #[error("encoded row is {actual} bytes, which exceeds the original slot length {original}")]
    Oversize { actual: usize, original: usize },
    #[error("page {page_id} header is corrupt: {reason}")]
    Corrupt { page_id: u64, reason: String },
}

struct Slot {
    offset: u16,
    length: u16,
}

impl Slot {
    fn is_tombstone(&self) -> bool {
        self.offset == 0 && self.length == 0
    }
}

/// A heap page decoded into memory: header + slot directory + raw bytes.
struct HeapPage {
    slots: Vec<Slot>,
    raw: Vec<u8>,
}

impl HeapPage {
    fn decode(raw: Vec<u8>) -> Result<Self, String> {
        if raw.len() != PAGE_SIZE {
            return Err(format!("page buffer is {} bytes, expected {PAGE_SIZE}", raw.len()));
        }
        let num_slots = u16::from_le_bytes([raw[0], raw[1]]);
        let mut slots = Vec::with_capacity(num_slots as usize);
        for i in 0..num_slots as usize {
            let base = HEADER_SIZE + i * SLOT_SIZE;
            if base + SLOT_SIZE > PAGE_SIZE {
                return Err(format!("num_slots={num_slots} overflows page"));
            }
            let offset = u16::from_le_bytes([raw[base], raw[base + 1]]);
            let length = u16::from_le_bytes([raw[base + 2], raw[base + 3]]);
            slots.push(Slot { offset, length });
        }
        Ok(HeapPage { slots, raw })
    }

    fn blank() -> Self {
        HeapPage {
            slots: Vec::new(),
            raw: vec![0u8; PAGE_SIZE],
        }
    }

    fn directory_end(&self) -> usize {
        HEADER_SIZE + self.slots.len() * SLOT_SIZE
    }

    /// Lowest live payload offset, or `PAGE_SIZE` if there is none yet.
    fn payload_floor(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| !s.is_tombstone())
            .map(|s| s.offset as usize)
            .min()
            .unwrap_or(PAGE_SIZE)
    }

    fn free_space(&self) -> usize {
        self.payload_floor().saturating_sub(self.directory_end())
    }

    fn write_header(&mut self) {
        let n = self.slots.len() as u16;
        self.raw[0..2].copy_from_slice(&n.to_le_bytes());
        self.raw[2..4].copy_from_slice(&0u16.to_le_bytes());
    }

    fn write_slot_entry(&mut self, slot_id: usize, slot: &Slot) {
        let base = HEADER_SIZE + slot_id * SLOT_SIZE;
        self.raw[base..base + 2].copy_from_slice(&slot.offset.to_le_bytes());
        self.raw[base + 2..base + 4].copy_from_slice(&slot.length.to_le_bytes());
    }

    /// Append `data` into free space, append a slot entry, and return the
    /// new slot id.
    fn insert_payload(&mut self, data: &[u8]) -> u16 {
        let offset = self.payload_floor() - data.len();
        self.raw[offset..offset + data.len()].copy_from_slice(data);
        let slot_id = self.slots.len();
        self.slots.push(Slot {
            offset: offset as u16,
            length: data.len() as u16,
        });
        self.write_header();
        self.write_slot_entry(slot_id, &self.slots[slot_id]);
        slot_id as u16
    }

    fn payload(&self, slot: &Slot) -> &[u8] {
        let start = slot.offset as usize;
        &self.raw[start..start + slot.length as usize]
    }
}

pub struct HeapFile {
    pager: Pager,
}

impl HeapFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HeapError> {
        Ok(HeapFile {
            pager: Pager::open(path)?,
        })
    }

    fn read_page(&mut self, page_id: u64) -> Result<HeapPage, HeapError> {
        let raw = self.pager.read_page(page_id)?;
        HeapPage::decode(raw).map_err(|reason| HeapError::Corrupt { page_id, reason })
    }

    pub fn insert(&mut self, row: &[crate::value::Value]) -> Result<Rid, HeapError> {
        let data = encode_row(row);
        let needed = data.len() + SLOT_SIZE;
        let num_pages = self.pager.num_pages()?;

        let mut target = None;
        for page_id in 0..num_pages {
            let page = self.read_page(page_id)?;
            if page.free_space() >= needed {
                target = Some(page_id);
                break;
            }
        }
        let page_id = match target {
            Some(id) => id,
            None => self.pager.allocate_page()?,
        };

        let mut page = if page_id < num_pages {
            self.read_page(page_id)?
        } else {
            HeapPage::blank()
        };
        let slot_id = page.insert_payload(&data);
        self.pager.write_page(page_id, &page.raw)?;
        trace!("heap: inserted row at ({page_id}, {slot_id}), {} bytes", data.len());
        Ok((page_id, slot_id))
    }

    pub fn get(&mut self, page_id: u64, slot_id: u16) -> Result<Option<Row>, HeapError> {
        let num_pages = self.pager.num_pages()?;
        if page_id >= num_pages {
            return Ok(None);
        }
        let page = self.read_page(page_id)?;
        let Some(slot) = page.slots.get(slot_id as usize) else {
            return Ok(None);
        };
        if slot.is_tombstone() {
            return Ok(None);
        }
        let row = decode_row(page.payload(slot))
            .map_err(|e| HeapError::Corrupt { page_id, reason: e.to_string() })?;
        Ok(Some(row))
    }

    pub fn update(
        &mut self,
        page_id: u64,
        slot_id: u16,
        row: &[crate::value::Value],
    ) -> Result<(), HeapError> {
        let mut page = self.read_page(page_id)?;
        let slot = page
            .slots
            .get(slot_id as usize)
            .ok_or(HeapError::OutOfRange { page_id, slot_id })?;
        if slot.is_tombstone() {
            return Err(HeapError::Deleted { page_id, slot_id });
        }
        let original_len = slot.length as usize;
        let offset = slot.offset as usize;

        let new_data = encode_row(row);
        if new_data.len() > original_len {
            return Err(HeapError::Oversize {
                actual: new_data.len(),
                original: original_len,
            });
        }

        page.raw[offset..offset + new_data.len()].copy_from_slice(&new_data);
        for b in &mut page.raw[offset + new_data.len()..offset + original_len] {
            *b = 0;
        }
        page.slots[slot_id as usize].length = new_data.len() as u16;
        page.write_slot_entry(slot_id as usize, &page.slots[slot_id as usize]);
        self.pager.write_page(page_id, &page.raw)?;
        Ok(())
    }

    pub fn delete(&mut self, page_id: u64, slot_id: u16) -> Result<(), HeapError> {
        let mut page = self.read_page(page_id)?;
        let slot = page
            .slots
            .get(slot_id as usize)
            .ok_or(HeapError::OutOfRange { page_id, slot_id })?;
        if slot.is_tombstone() {
            return Err(HeapError::Deleted { page_id, slot_id });
        }
        page.slots[slot_id as usize] = Slot { offset: 0, length: 0 };
        page.write_slot_entry(slot_id as usize, &page.slots[slot_id as usize]);
        self.pager.write_page(page_id, &page.raw)?;
        debug!("heap: tombstoned ({page_id}, {slot_id})");
        Ok(())
    }

    pub fn scan(&mut self) -> Result<Vec<Row>, HeapError> {
        let num_pages = self.pager.num_pages()?;
        let mut rows = Vec::new();
        for page_id in 0..num_pages {
            let page = self.read_page(page_id)?;
            for slot in &page.slots {
                if !slot.is_tombstone() {
                    let row = decode_row(page.payload(slot))
                        .map_err(|e| HeapError::Corrupt { page_id, reason: e.to_string() })?;
                    rows.push(row);
                }
            }
        }
        Ok(rows)
    }

    pub fn close(&mut self) -> Result<(), HeapError> {
        Ok(self.pager.close()?)
    }
}
