/*
 * Copyright (c) 2026.  tarnlog contributors.
 * Please refer to the project repository for more information about this project and its license.
 */

//! File/Block Manager.
//!
//! Provides block-granular I/O over named files rooted at one data
//! directory, opening files lazily on first access. One manager serves
//! both the WAL file and any number of relation/index files sharing the
//! same root directory.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{error, trace};

use crate::block::BlockId;
use crate::error::{FileError, Result};
use crate::page::Page;
use crate::types::PAGE_SIZE;

/// One lazily-opened file handle, guarded by its own mutex so concurrent
/// operations against *different* files never contend.
struct OpenFile {
    handle: Mutex<File>,
}

/// Block-granular I/O over files rooted at `root_dir`.
pub struct FileManager {
    root_dir: PathBuf,
    is_new: bool,
    files: Mutex<HashMap<String, std::sync::Arc<OpenFile>>>,
}

impl FileManager {
    /// Open (or create) the data directory at `root_dir`. `is_new()`
    /// reports whether the directory had to be created, signaling that
    /// higher layers must run first-boot metadata initialization.
    pub fn new(root_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root_dir = root_dir.into();
        let is_new = !root_dir.exists();
        std::fs::create_dir_all(&root_dir)?;
        Ok(Self {
            root_dir,
            is_new,
            files: Mutex::new(HashMap::new()),
        })
    }

    /// The process-wide page size.
    pub const fn block_size(&self) -> u16 {
        PAGE_SIZE as u16
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn file_path(&self, file_name: &str) -> PathBuf {
        self.root_dir.join(file_name)
    }

    fn open_file(&self, file_name: &str) -> Result<std::sync::Arc<OpenFile>> {
        let mut files = self.files.lock();
        if let Some(f) = files.get(file_name) {
            return Ok(f.clone());
        }
        let path = self.file_path(file_name);
        let handle = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| FileError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        let opened = std::sync::Arc::new(OpenFile {
            handle: Mutex::new(handle),
        });
        files.insert(file_name.to_string(), opened.clone());
        Ok(opened)
    }

    /// Read exactly one block into `page`. Reading past end-of-file is a
    /// fatal error; callers must check `size()` first.
    pub fn read(&self, block: &BlockId, page: &mut Page) -> Result<()> {
        trace!(block = %block, "file_manager::read");
        let opened = self.open_file(block.file_name())?;
        let mut file = opened.handle.lock();
        let offset = block.block_number() * PAGE_SIZE as u64;

        let len = file
            .metadata()
            .map_err(|e| self.io_err(block.file_name(), e))?
            .len();
        if offset + PAGE_SIZE as u64 > len {
            return Err(FileError::ReadPastEnd {
                file: block.file_name().to_string(),
                block: block.block_number(),
                size: len / PAGE_SIZE as u64,
            }
            .into());
        }

        file.seek(SeekFrom::Start(offset))
            .map_err(|e| self.io_err(block.file_name(), e))?;
        file.read_exact(page.as_mut_bytes())
            .map_err(|e| self.io_err(block.file_name(), e))?;
        Ok(())
    }

    /// Write the full page to `block`'s offset. WAL callers must `fsync`
    /// separately via [`FileManager::sync`]; data-file writes may defer
    /// fsync to shutdown.
    pub fn write(&self, block: &BlockId, page: &Page) -> Result<()> {
        trace!(block = %block, "file_manager::write");
        let opened = self.open_file(block.file_name())?;
        let mut file = opened.handle.lock();
        let offset = block.block_number() * PAGE_SIZE as u64;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| self.io_err(block.file_name(), e))?;
        file.write_all(page.as_bytes())
            .map_err(|e| self.io_err(block.file_name(), e))?;
        Ok(())
    }

    /// `fsync` the given file. Required after every WAL write; data-file
    /// writes may skip this until shutdown.
    pub fn sync(&self, file_name: &str) -> Result<()> {
        let opened = self.open_file(file_name)?;
        let file = opened.handle.lock();
        file.sync_data().map_err(|e| self.io_err(file_name, e))?;
        Ok(())
    }

    /// Extend `file_name` by one zero-filled block and return its id.
    /// Atomic with respect to concurrent appenders of the same file: the
    /// per-file mutex is held across the length check, write, and fsync.
    pub fn append(&self, file_name: &str) -> Result<BlockId> {
        let opened = self.open_file(file_name)?;
        let mut file = opened.handle.lock();
        let len = file
            .metadata()
            .map_err(|e| self.io_err(file_name, e))?
            .len();
        let block_number = len / PAGE_SIZE as u64;
        let offset = block_number * PAGE_SIZE as u64;

        file.seek(SeekFrom::Start(offset))
            .map_err(|e| self.io_err(file_name, e))?;
        file.write_all(&[0u8; PAGE_SIZE])
            .map_err(|e| self.io_err(file_name, e))?;
        file.sync_data().map_err(|e| self.io_err(file_name, e))?;

        trace!(file = file_name, block_number, "file_manager::append");
        Ok(BlockId::new(file_name, block_number))
    }

    /// Number of blocks currently in `file_name` (0 if the file has never
    /// been created).
    pub fn size(&self, file_name: &str) -> Result<u64> {
        let opened = self.open_file(file_name)?;
        let file = opened.handle.lock();
        let len = file
            .metadata()
            .map_err(|e| self.io_err(file_name, e))?
            .len();
        Ok(len / PAGE_SIZE as u64)
    }

    fn io_err(&self, file_name: &str, source: std::io::Error) -> crate::error::StorageError {
        let path = self.file_path(file_name).display().to_string();
        error!(path = %path, %source, "fatal io error");
        FileError::Io { path, source }.into()
    }
}
