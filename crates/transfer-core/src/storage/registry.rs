//! FileHandle registry: one open handle per path, shared across every
//! TransferPart that touches it, closed exactly once at pipeline teardown.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;

use super::handle::FileHandle;

#[derive(Default)]
pub struct FileRegistry {
    handles: Mutex<HashMap<PathBuf, FileHandle>>,
}

impl FileRegistry {
    pub fn new() -> Self {
        FileRegistry {
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Opens (or returns the already-open) write handle for `path`. On first
    /// open, if `declared_size` is known, preallocates the file to that size
    /// so concurrent out-of-order part writes never race a file-extending
    /// write against another part's positional write. `create_dirs` mirrors
    /// the `mkdirs` option (§6): when unset, a missing parent directory is a
    /// hard error rather than created on the caller's behalf.
    pub fn handle_for_write(&self, path: &Path, declared_size: Option<u64>, create_dirs: bool) -> Result<FileHandle> {
        let mut handles = self.handles.lock().unwrap();
        if let Some(h) = handles.get(path) {
            return Ok(h.clone());
        }
        let h = FileHandle::open_for_write(path, create_dirs)?;
        if let Some(size) = declared_size {
            h.set_len(size)?;
        }
        handles.insert(path.to_path_buf(), h.clone());
        Ok(h)
    }

    pub fn handle_for_read(&self, path: &Path) -> Result<FileHandle> {
        let mut handles = self.handles.lock().unwrap();
        if let Some(h) = handles.get(path) {
            return Ok(h.clone());
        }
        let h = FileHandle::open_for_read(path)?;
        handles.insert(path.to_path_buf(), h.clone());
        Ok(h)
    }

    /// Drops every tracked handle. Called exactly once by the Controller at
    /// pipeline teardown, on both the success and failure paths.
    pub fn close_all(&self) {
        self.handles.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_shares_one_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let registry = FileRegistry::new();
        let a = registry.handle_for_write(&path, Some(32), false).unwrap();
        let b = registry.handle_for_write(&path, None, false).unwrap();
        a.write_at(0, b"hi").unwrap();
        let data = b.read_at(0, 2).unwrap();
        assert_eq!(data, b"hi");
    }

    #[test]
    fn close_all_drops_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let registry = FileRegistry::new();
        registry.handle_for_write(&path, None, false).unwrap();
        registry.close_all();
        assert!(registry.handles.lock().unwrap().is_empty());
    }
}
