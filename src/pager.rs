//! Fixed-size page I/O against a single backing file.
//!
//! `HeapFile` and `PageBTree` both sit on top of a `Pager`; neither ever
//! touches a `std::fs::File` directly. See SPEC_FULL.md §4.1.

use log::{debug, trace};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const PAGE_SIZE: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum PagerError {
    #[error("page {page_id} out of range (num_pages={num_pages})")]
    OutOfRange { page_id: u64, num_pages: u64 },
    #[error("write_page payload is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct Pager {
    file: File,
    path: PathBuf,
    page_size: usize,
}

impl Pager {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PagerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| PagerError::Io {
                path: path.clone(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|source| PagerError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Pager {
            file,
            path,
            page_size: PAGE_SIZE,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_pages(&self) -> Result<u64, PagerError> {
        let len = self.file.metadata().map_err(|source| PagerError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(len.len() / self.page_size as u64)
    }

    pub fn read_page(&mut self, page_id: u64) -> Result<Vec<u8>, PagerError> {
        let num_pages = self.num_pages()?;
        if page_id >= num_pages {
            return Err(PagerError::OutOfRange { page_id, num_pages });
        }
        self.file
            .seek(SeekFrom::Start(page_id * self.page_size as u64))
            .map_err(|source| PagerError::Io {
                path: self.path.clone(),
                source,
            })?;
        let mut buf = vec![0u8; self.page_size];
        let mut read_so_far = 0;
        loop {
            let n = self
                .file
                .read(&mut buf[read_so_far..])
                .map_err(|source| PagerError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            if n == 0 {
                break;
            }
            read_so_far += n;
            if read_so_far == buf.len() {
                break;
            }
        }
        // A short read (truncated file) is left zero-padded in `buf`.
        debug!("pager: read page {page_id} ({read_so_far} bytes live)");
        Ok(buf)
    }

    pub fn write_page(&mut self, page_id: u64, data: &[u8]) -> Result<(), PagerError> {
        if data.len() != self.page_size {
            return Err(PagerError::SizeMismatch {
                expected: self.page_size,
                actual: data.len(),
            });
        }
        let num_pages = self.num_pages()?;
        if page_id > num_pages {
            return Err(PagerError::OutOfRange { page_id, num_pages });
        }
        self.file
            .seek(SeekFrom::Start(page_id * self.page_size as u64))
            .map_err(|source| PagerError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.file.write_all(data).map_err(|source| PagerError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.file.flush().map_err(|source| PagerError::Io {
            path: self.path.clone(),
            source,
        })?;
        trace!("pager: wrote page {page_id}");
        Ok(())
    }

    pub fn allocate_page(&mut self) -> Result<u64, PagerError> {
        let page_id = self.num_pages()?;
        let zeros = vec![0u8; self.page_size];
        self.file
            .seek(SeekFrom::End(0))
            .map_err(|source| PagerError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.file
            .write_all(&zeros)
            .map_err(|source| PagerError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.file.flush().map_err(|source| PagerError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!("pager: allocated page {page_id} in {}", self.path.display());
        Ok(page_id)
    }

    pub fn close(&mut self) -> Result<(), PagerError> {
        self.file.flush().map_err(|source| PagerError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pager() -> (Pager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pager = Pager::open(dir.path().join("pages.db")).unwrap();
        (pager, dir)
    }

    #[test]
    fn new_file_has_zero_pages() {
        let (pager, _dir) = pager();
        assert_eq!(pager.num_pages().unwrap(), 0);
    }

    #[test]
    fn allocate_then_read_is_zero_filled() {
        let (mut pager, _dir) = pager();
        let id = pager.allocate_page().unwrap();
        assert_eq!(id, 0);
        assert_eq!(pager.num_pages().unwrap(), 1);
        let page = pager.read_page(0).unwrap();
        assert_eq!(page.len(), PAGE_SIZE);
        assert!(page.iter().all(|&b| b == 0));
    }

    #[test]
    fn write_then_read_round_trips() {
        let (mut pager, _dir) = pager();
        pager.allocate_page().unwrap();
        let mut data = vec![0u8; PAGE_SIZE];
        data[0] = 0xAB;
        data[PAGE_SIZE - 1] = 0xCD;
        pager.write_page(0, &data).unwrap();
        let read_back = pager.read_page(0).unwrap();
        assert_eq!(read_back, data);
    }

    #[test]
    fn read_out_of_range_fails() {
        let (mut pager, _dir) = pager();
        let err = pager.read_page(0).unwrap_err();
        assert!(matches!(err, PagerError::OutOfRange { page_id: 0, .. }));
    }

    #[test]
    fn write_wrong_size_fails() {
        let (mut pager, _dir) = pager();
        pager.allocate_page().unwrap();
        let err = pager.write_page(0, &[0u8; 10]).unwrap_err();
        assert!(matches!(err, PagerError::SizeMismatch { .. }));
    }

    #[test]
    fn write_past_end_with_gap_fails() {
        let (mut pager, _dir) = pager();
        let data = vec![0u8; PAGE_SIZE];
        let err = pager.write_page(1, &data).unwrap_err();
        assert!(matches!(err, PagerError::OutOfRange { page_id: 1, .. }));
    }

    #[test]
    fn reopening_sees_prior_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.db");
        {
            let mut pager = Pager::open(&path).unwrap();
            pager.allocate_page().unwrap();
            let mut data = vec![0u8; PAGE_SIZE];
            data[5] = 42;
            pager.write_page(0, &data).unwrap();
            pager.close().unwrap();
        }
        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.num_pages().unwrap(), 1);
        assert_eq!(pager.read_page(0).unwrap()[5], 42);
    }
}
