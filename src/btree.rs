//! Disk-resident B+Tree over signed 64-bit integer keys.
//!
//! Every node occupies exactly one page; page 0 is always the root. See
//! SPEC_FULL.md §4.3 for the node layout and the split/borrow/merge
//! algorithms this module implements.

use crate::heap::Rid;
use crate::pager::{Pager, PagerError, PAGE_SIZE};
use log::debug;
use std::path::Path;

const HEADER_SIZE: usize = 7; // is_leaf(1) + num_keys(2) + next_page(4)
const LEAF_ENTRY_SIZE: usize = 16; // key(8) + page_id(4) + slot_id(4)
const INTERNAL_ENTRY_SIZE: usize = 12; // key(8) + child(4)
const CHILD_PTR_SIZE: usize = 4;
const NO_PAGE: i32 = -1;

pub const LEAF_CAPACITY: usize = (PAGE_SIZE - HEADER_SIZE) / LEAF_ENTRY_SIZE;
pub const INTERNAL_CAPACITY: usize =
    (PAGE_SIZE - HEADER_SIZE - CHILD_PTR_SIZE) / INTERNAL_ENTRY_SIZE;

fn min_keys(capacity: usize) -> usize {
    (capacity / 2).max(1)
}

// A merge concatenates left_keys + separator + right_keys; for that to
// always fit back in one page we need 2*min_keys + 1 <= capacity, which
// (capacity/2).max(1) doesn't guarantee for odd-ish capacities at scale.
fn internal_min_keys(capacity: usize) -> usize {
    ((capacity - 1) / 2).max(1)
}

#[derive(Debug, thiserror::Error)]
pub enum BTreeError {
    #[error(transparent)]
    Pager(#[from] PagerError),
    #[error("btree node at page {page_id} is corrupt: {reason}")]
    Corrupt { page_id: u64, reason: String },
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        entries: Vec<(i64, Rid)>,
        next: i64,
    },
    Internal {
        children: Vec<u64>,
        keys: Vec<i64>,
    },
}

impl Node {
    fn blank_leaf() -> Self {
        Node::Leaf {
            entries: Vec::new(),
            next: NO_PAGE as i64,
        }
    }

    fn key_count(&self) -> usize {
        match self {
            Node::Leaf { entries, .. } => entries.len(),
            Node::Internal { keys, .. } => keys.len(),
        }
    }

    fn is_full(&self) -> bool {
        match self {
            Node::Leaf { .. } => self.key_count() >= LEAF_CAPACITY,
            Node::Internal { .. } => self.key_count() >= INTERNAL_CAPACITY,
        }
    }

    fn min_keys(&self) -> usize {
        match self {
            Node::Leaf { .. } => min_keys(LEAF_CAPACITY),
            Node::Internal { .. } => internal_min_keys(INTERNAL_CAPACITY),
        }
    }

    fn encode(&self, page_id: u64) -> Result<Vec<u8>, BTreeError> {
        let mut buf = vec![0u8; PAGE_SIZE];
        match self {
            Node::Leaf { entries, next } => {
                if HEADER_SIZE + entries.len() * LEAF_ENTRY_SIZE > PAGE_SIZE {
                    return Err(BTreeError::Corrupt {
                        page_id,
                        reason: format!("{} leaf entries exceed page capacity", entries.len()),
                    });
                }
                buf[0] = 1;
                buf[1..3].copy_from_slice(&(entries.len() as u16).to_le_bytes());
                buf[3..7].copy_from_slice(&(*next as i32).to_le_bytes());
                let mut off = HEADER_SIZE;
                for (key, (page_id, slot_id)) in entries {
                    buf[off..off + 8].copy_from_slice(&key.to_le_bytes());
                    buf[off + 8..off + 12].copy_from_slice(&(*page_id as i32).to_le_bytes());
                    buf[off + 12..off + 16].copy_from_slice(&(*slot_id as i32).to_le_bytes());
                    off += LEAF_ENTRY_SIZE;
                }
            }
            Node::Internal { children, keys } => {
                if HEADER_SIZE + CHILD_PTR_SIZE + keys.len() * INTERNAL_ENTRY_SIZE > PAGE_SIZE {
                    return Err(BTreeError::Corrupt {
                        page_id,
                        reason: format!("{} internal keys exceed page capacity", keys.len()),
                    });
                }
                buf[0] = 0;
                buf[1..3].copy_from_slice(&(keys.len() as u16).to_le_bytes());
                buf[3..7].copy_from_slice(&NO_PAGE.to_le_bytes());
                let mut off = HEADER_SIZE;
                buf[off..off + 4].copy_from_slice(&(children[0] as i32).to_le_bytes());
                off += CHILD_PTR_SIZE;
                for (i, key) in keys.iter().enumerate() {
                    buf[off..off + 8].copy_from_slice(&key.to_le_bytes());
                    buf[off + 8..off + 12].copy_from_slice(&(children[i + 1] as i32).to_le_bytes());
                    off += INTERNAL_ENTRY_SIZE;
                }
            }
        }
        Ok(buf)
    }

    fn decode(page_id: u64, buf: &[u8]) -> Result<Self, BTreeError> {
        let corrupt = |reason: String| BTreeError::Corrupt { page_id, reason };
        let is_leaf = buf[0];
        let num_keys = u16::from_le_bytes([buf[1], buf[2]]) as usize;
        let next_page = i32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]);

        match is_leaf {
            1 => {
                if HEADER_SIZE + num_keys * LEAF_ENTRY_SIZE > PAGE_SIZE {
                    return Err(corrupt(format!("num_keys={num_keys} overflows a leaf page")));
                }
                let mut entries = Vec::with_capacity(num_keys);
                let mut off = HEADER_SIZE;
                for _ in 0..num_keys {
                    let key = i64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
                    let rid_page =
                        i32::from_le_bytes(buf[off + 8..off + 12].try_into().unwrap()) as u64;
                    let rid_slot =
                        i32::from_le_bytes(buf[off + 12..off + 16].try_into().unwrap()) as u16;
                    entries.push((key, (rid_page, rid_slot)));
                    off += LEAF_ENTRY_SIZE;
                }
                Ok(Node::Leaf {
                    entries,
                    next: next_page as i64,
                })
            }
            0 => {
                if HEADER_SIZE + CHILD_PTR_SIZE + num_keys * INTERNAL_ENTRY_SIZE > PAGE_SIZE {
                    return Err(corrupt(format!(
                        "num_keys={num_keys} overflows an internal page"
                    )));
                }
                let mut off = HEADER_SIZE;
                let mut children =
                    vec![i32::from_le_bytes(buf[off..off + 4].try_into().unwrap()) as u64];
                off += CHILD_PTR_SIZE;
                let mut keys = Vec::with_capacity(num_keys);
                for _ in 0..num_keys {
                    let key = i64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
                    let child =
                        i32::from_le_bytes(buf[off + 8..off + 12].try_into().unwrap()) as u64;
                    keys.push(key);
                    children.push(child);
                    off += INTERNAL_ENTRY_SIZE;
                }
                Ok(Node::Internal { children, keys })
            }
            other => Err(corrupt(format!("unrecognised is_leaf byte {other}"))),
        }
    }
}

/// Find the child index to descend into for `key`: the first `i` with
/// `key < keys[i]`, i.e. the count of keys that are `<= key`.
fn child_index(keys: &[i64], key: i64) -> usize {
    keys.partition_point(|&k| k <= key)
}

pub struct PageBTree {
    pager: Pager,
}

impl PageBTree {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BTreeError> {
        let mut pager = Pager::open(path)?;
        if pager.num_pages()? == 0 {
            let root = Node::blank_leaf();
            pager.allocate_page()?;
            pager.write_page(0, &root.encode(0)?)?;
        }
        Ok(PageBTree { pager })
    }

    fn read_node(&mut self, page_id: u64) -> Result<Node, BTreeError> {
        let raw = self.pager.read_page(page_id)?;
        Node::decode(page_id, &raw)
    }

    fn write_node(&mut self, page_id: u64, node: &Node) -> Result<(), BTreeError> {
        let encoded = node.encode(page_id)?;
        while self.pager.num_pages()? <= page_id {
            self.pager.allocate_page()?;
        }
        self.pager.write_page(page_id, &encoded)?;
        Ok(())
    }

    pub fn search(&mut self, key: i64) -> Result<Option<Rid>, BTreeError> {
        let mut page_id = 0u64;
        loop {
            match self.read_node(page_id)? {
                Node::Leaf { entries, .. } => {
                    return Ok(entries
                        .binary_search_by_key(&key, |(k, _)| *k)
                        .ok()
                        .map(|i| entries[i].1));
                }
                Node::Internal { children, keys } => {
                    page_id = children[child_index(&keys, key)];
                }
            }
        }
    }

    pub fn range_scan(&mut self, low: i64, high: i64) -> Result<Vec<Rid>, BTreeError> {
        let mut page_id = self.find_leaf_page(low)?;
        let mut result = Vec::new();
        loop {
            let Node::Leaf { entries, next } = self.read_node(page_id)? else {
                return Err(BTreeError::Corrupt {
                    page_id,
                    reason: "leaf linked-list pointed at an internal node".into(),
                });
            };
            for (key, rid) in &entries {
                if *key > high {
                    return Ok(result);
                }
                if *key >= low {
                    result.push(*rid);
                }
            }
            if next == NO_PAGE as i64 {
                break;
            }
            page_id = next as u64;
        }
        Ok(result)
    }

    fn find_leaf_page(&mut self, key: i64) -> Result<u64, BTreeError> {
        let mut page_id = 0u64;
        loop {
            match self.read_node(page_id)? {
                Node::Leaf { .. } => return Ok(page_id),
                Node::Internal { children, keys } => {
                    page_id = children[child_index(&keys, key)];
                }
            }
        }
    }

    pub fn insert(&mut self, key: i64, rid: Rid) -> Result<(), BTreeError> {
        let root = self.read_node(0)?;
        if root.is_full() {
            let old_root_pid = self.pager.allocate_page()?;
            self.write_node(old_root_pid, &root)?;
            let new_root = Node::Internal {
                children: vec![old_root_pid],
                keys: Vec::new(),
            };
            self.write_node(0, &new_root)?;
            self.split_child(0, 0)?;
            debug!("btree: split root into new root over page {old_root_pid}");
        }
        self.insert_non_full(0, key, rid)
    }

    fn insert_non_full(&mut self, page_id: u64, key: i64, rid: Rid) -> Result<(), BTreeError> {
        match self.read_node(page_id)? {
            Node::Leaf { mut entries, next } => {
                let pos = entries.partition_point(|(k, _)| *k < key);
                entries.insert(pos, (key, rid));
                self.write_node(page_id, &Node::Leaf { entries, next })
            }
            Node::Internal { children, keys } => {
                let mut i = child_index(&keys, key);
                if self.read_node(children[i])?.is_full() {
                    self.split_child(page_id, i)?;
                    // The split may have inserted a new separator at `i`;
                    // recompute which child now owns `key`.
                    let Node::Internal { keys, .. } = self.read_node(page_id)? else {
                        unreachable!("page_id was just written as an internal node")
                    };
                    i = child_index(&keys, key);
                }
                let Node::Internal { children, .. } = self.read_node(page_id)? else {
                    unreachable!("page_id was just written as an internal node")
                };
                self.insert_non_full(children[i], key, rid)
            }
        }
    }

    /// Split `parent.children[child_idx]` in two, pushing a separator up
    /// into `parent`.
    fn split_child(&mut self, parent_pid: u64, child_idx: usize) -> Result<(), BTreeError> {
        let Node::Internal {
            mut children,
            mut keys,
        } = self.read_node(parent_pid)?
        else {
            panic!("split_child called with a non-internal parent");
        };
        let child_pid = children[child_idx];

        match self.read_node(child_pid)? {
            Node::Leaf { mut entries, next } => {
                let mid = entries.len() / 2;
                let right_entries = entries.split_off(mid);
                let separator = right_entries[0].0;
                let right_pid = self.pager.allocate_page()?;
                self.write_node(
                    child_pid,
                    &Node::Leaf {
                        entries,
                        next: right_pid as i64,
                    },
                )?;
                self.write_node(
                    right_pid,
                    &Node::Leaf {
                        entries: right_entries,
                        next,
                    },
                )?;
                children.insert(child_idx + 1, right_pid);
                keys.insert(child_idx, separator);
            }
            Node::Internal {
                children: mut as_child,
                keys: mut as_keys,
            } => {
                let mid = as_keys.len() / 2;
                let mut right_keys = as_keys.split_off(mid);
                let median = right_keys.remove(0);
                let right_children = as_child.split_off(mid + 1);
                let right_pid = self.pager.allocate_page()?;
                self.write_node(
                    child_pid,
                    &Node::Internal {
                        children: as_child,
                        keys: as_keys,
                    },
                )?;
                self.write_node(
                    right_pid,
                    &Node::Internal {
                        children: right_children,
                        keys: right_keys,
                    },
                )?;
                children.insert(child_idx + 1, right_pid);
                keys.insert(child_idx, median);
            }
        }

        self.write_node(parent_pid, &Node::Internal { children, keys })
    }

    pub fn delete(&mut self, key: i64) -> Result<bool, BTreeError> {
        let found = self.delete_rec(0, key)?;
        if let Node::Internal { children, keys } = self.read_node(0)? {
            if keys.is_empty() && children.len() == 1 {
                let only = self.read_node(children[0])?;
                self.write_node(0, &only)?;
                debug!("btree: collapsed root after delete");
            }
        }
        Ok(found)
    }

    fn delete_rec(&mut self, page_id: u64, key: i64) -> Result<bool, BTreeError> {
        match self.read_node(page_id)? {
            Node::Leaf { mut entries, next } => {
                let Some(pos) = entries.iter().position(|(k, _)| *k == key) else {
                    return Ok(false);
                };
                entries.remove(pos);
                self.write_node(page_id, &Node::Leaf { entries, next })?;
                Ok(true)
            }
            Node::Internal { children, keys } => {
                let mut i = child_index(&keys, key);
                let child = self.read_node(children[i])?;
                if child.key_count() <= child.min_keys() {
                    self.fix_child(page_id, i)?;
                    let Node::Internal { keys, .. } = self.read_node(page_id)? else {
                        unreachable!("page_id was just written as an internal node")
                    };
                    i = child_index(&keys, key);
                }
                let Node::Internal { children, .. } = self.read_node(page_id)? else {
                    unreachable!("page_id was just written as an internal node")
                };
                self.delete_rec(children[i], key)
            }
        }
    }

    /// Rebalance `parent.children[idx]`, which is at or below its minimum
    /// occupancy, by borrowing from a sibling or merging with one.
    fn fix_child(&mut self, parent_pid: u64, idx: usize) -> Result<(), BTreeError> {
        let Node::Internal { children, .. } = self.read_node(parent_pid)? else {
            panic!("fix_child called with a non-internal parent");
        };
        let min_keys_needed = self.read_node(children[idx])?.min_keys();

        if idx > 0 {
            let left = self.read_node(children[idx - 1])?;
            if left.key_count() > min_keys_needed {
                return self.borrow_left(parent_pid, idx);
            }
        }
        if idx + 1 < children.len() {
            let right = self.read_node(children[idx + 1])?;
            if right.key_count() > min_keys_needed {
                return self.borrow_right(parent_pid, idx);
            }
        }
        if idx > 0 {
            self.merge(parent_pid, idx - 1)
        } else {
            self.merge(parent_pid, idx)
        }
    }

    fn borrow_left(&mut self, parent_pid: u64, idx: usize) -> Result<(), BTreeError> {
        let Node::Internal {
            children,
            mut keys,
        } = self.read_node(parent_pid)?
        else {
            panic!("borrow_left called with a non-internal parent");
        };
        let left_pid = children[idx - 1];
        let child_pid = children[idx];

        match (self.read_node(left_pid)?, self.read_node(child_pid)?) {
            (Node::Leaf { entries: mut left_entries, next: left_next }, Node::Leaf { mut entries, next }) => {
                let moved = left_entries.pop().expect("left sibling has spare keys");
                entries.insert(0, moved);
                keys[idx - 1] = entries[0].0;
                self.write_node(left_pid, &Node::Leaf { entries: left_entries, next: left_next })?;
                self.write_node(child_pid, &Node::Leaf { entries, next })?;
            }
            (
                Node::Internal { children: mut left_children, keys: mut left_keys },
                Node::Internal { mut children, mut keys: child_keys },
            ) => {
                let separator = keys[idx - 1];
                let moved_child = left_children.pop().expect("left sibling has spare children");
                let moved_key = left_keys.pop().expect("left sibling has spare keys");
                children.insert(0, moved_child);
                let mut new_child_keys = vec![separator];
                new_child_keys.extend(child_keys.drain(..));
                keys[idx - 1] = moved_key;
                self.write_node(left_pid, &Node::Internal { children: left_children, keys: left_keys })?;
                self.write_node(child_pid, &Node::Internal { children, keys: new_child_keys })?;
            }
            _ => {
                return Err(BTreeError::Corrupt {
                    page_id: parent_pid,
                    reason: "sibling and child differ in leaf/internal kind".into(),
                })
            }
        }
        self.write_node(parent_pid, &Node::Internal { children, keys })
    }

    fn borrow_right(&mut self, parent_pid: u64, idx: usize) -> Result<(), BTreeError> {
        let Node::Internal {
            children,
            mut keys,
        } = self.read_node(parent_pid)?
        else {
            panic!("borrow_right called with a non-internal parent");
        };
        let child_pid = children[idx];
        let right_pid = children[idx + 1];

        match (self.read_node(child_pid)?, self.read_node(right_pid)?) {
            (Node::Leaf { mut entries, next }, Node::Leaf { entries: mut right_entries, next: right_next }) => {
                let moved = right_entries.remove(0);
                entries.push(moved);
                keys[idx] = right_entries[0].0;
                self.write_node(child_pid, &Node::Leaf { entries, next })?;
                self.write_node(right_pid, &Node::Leaf { entries: right_entries, next: right_next })?;
            }
            (
                Node::Internal { mut children, mut keys: child_keys },
                Node::Internal { children: mut right_children, keys: mut right_keys },
            ) => {
                let separator = keys[idx];
                let moved_child = right_children.remove(0);
                let moved_key = right_keys.remove(0);
                children.push(moved_child);
                child_keys.push(separator);
                keys[idx] = moved_key;
                self.write_node(child_pid, &Node::Internal { children, keys: child_keys })?;
                self.write_node(right_pid, &Node::Internal { children: right_children, keys: right_keys })?;
            }
            _ => {
                return Err(BTreeError::Corrupt {
                    page_id: parent_pid,
                    reason: "sibling and child differ in leaf/internal kind".into(),
                })
            }
        }
        self.write_node(parent_pid, &Node::Internal { children, keys })
    }

    /// Merge `parent.children[left_idx + 1]` into `parent.children[left_idx]`.
    fn merge(&mut self, parent_pid: u64, left_idx: usize) -> Result<(), BTreeError> {
        let Node::Internal {
            mut children,
            mut keys,
        } = self.read_node(parent_pid)?
        else {
            panic!("merge called with a non-internal parent");
        };
        let left_pid = children[left_idx];
        let right_pid = children[left_idx + 1];

        match (self.read_node(left_pid)?, self.read_node(right_pid)?) {
            (Node::Leaf { mut entries, .. }, Node::Leaf { entries: right_entries, next: right_next }) => {
                entries.extend(right_entries);
                self.write_node(left_pid, &Node::Leaf { entries, next: right_next })?;
            }
            (
                Node::Internal { mut children, mut keys: left_keys },
                Node::Internal { children: right_children, keys: right_keys },
            ) => {
                left_keys.push(keys[left_idx]);
                left_keys.extend(right_keys);
                children.extend(right_children);
                self.write_node(left_pid, &Node::Internal { children, keys: left_keys })?;
            }
            _ => {
                return Err(BTreeError::Corrupt {
                    page_id: parent_pid,
                    reason: "sibling and child differ in leaf/internal kind".into(),
                })
            }
        }

        keys.remove(left_idx);
        children.remove(left_idx + 1);
        debug!("btree: merged page {right_pid} into {left_pid}");
        self.write_node(parent_pid, &Node::Internal { children, keys })
    }

    pub fn close(&mut self) -> Result<(), BTreeError> {
        Ok(self.pager.close()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (PageBTree, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let tree = PageBTree::open(dir.path().join("pk.idx")).unwrap();
        (tree, dir)
    }

    #[test]
    fn search_after_insert_with_no_interleaving() {
        let (mut tree, _dir) = tree();
        for k in 0..20i64 {
            tree.insert(k, (k as u64, k as u16)).unwrap();
            assert_eq!(tree.search(k).unwrap(), Some((k as u64, k as u16)));
        }
    }

    #[test]
    fn delete_removes_only_the_target_key() {
        let (mut tree, _dir) = tree();
        for k in 0..10i64 {
            tree.insert(k, (k as u64, 0)).unwrap();
        }
        assert!(tree.delete(5).unwrap());
        assert_eq!(tree.search(5).unwrap(), None);
        for k in [0, 1, 2, 3, 4, 6, 7, 8, 9] {
            assert_eq!(tree.search(k).unwrap(), Some((k as u64, 0)));
        }
        assert!(!tree.delete(5).unwrap());
    }

    #[test]
    fn range_scan_is_ascending_and_bounded() {
        let (mut tree, _dir) = tree();
        for k in 0..50i64 {
            tree.insert(k, (k as u64, 0)).unwrap();
        }
        let rids = tree.range_scan(10, 20).unwrap();
        let keys: Vec<i64> = rids.iter().map(|r| r.0 as i64).collect();
        assert_eq!(keys, (10..=20).collect::<Vec<_>>());
    }

    #[test]
    fn split_stress_descending_inserts_stay_searchable() {
        let (mut tree, _dir) = tree();
        for k in (1..=300i64).rev() {
            tree.insert(k, (k as u64, 0)).unwrap();
            for probe in k..=300 {
                assert_eq!(
                    tree.search(probe).unwrap(),
                    Some((probe as u64, 0)),
                    "key {probe} missing after inserting down to {k}"
                );
            }
        }
        let scanned = tree.range_scan(25, 75).unwrap();
        let keys: Vec<i64> = scanned.iter().map(|r| r.0 as i64).collect();
        assert_eq!(keys, (25..=75).collect::<Vec<_>>());
    }

    #[test]
    fn repeated_deletes_force_borrow_and_merge() {
        let (mut tree, _dir) = tree();
        for k in 1..=400i64 {
            tree.insert(k, (k as u64, 0)).unwrap();
        }
        for k in [200, 201, 202, 203, 204, 205, 206, 207] {
            assert!(tree.delete(k).unwrap());
            for probe in 1..=400i64 {
                let expect_present = !(200..=k).contains(&probe);
                assert_eq!(tree.search(probe).unwrap().is_some(), expect_present);
            }
        }
    }

    #[test]
    fn leaf_capacity_matches_page_size_budget() {
        assert_eq!(LEAF_CAPACITY, (PAGE_SIZE - 7) / 16);
        assert_eq!(INTERNAL_CAPACITY, (PAGE_SIZE - 7 - 4) / 12);
    }
}
