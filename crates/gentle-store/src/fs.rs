//! Directory-backed stores.
//!
//! Layout under the root directory:
//!
//! ```text
//! content_db/<content-id>   blob bytes, read-only once written
//! pointer_db/<pointer-id>   hex content id of the target
//! ```
//!
//! Every write goes through a temporary file in the same directory followed
//! by a rename, so readers never observe a partially written entry.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use gentle_types::{is_valid, validate_partial, ContentId, PointerId};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{describe_target, StoreError, StoreResult};
use crate::traits::{ContentStore, DataStore, PointerStore};

/// Subdirectory holding blobs.
pub const CONTENT_DIR: &str = "content_db";

/// Subdirectory holding pointers.
pub const POINTER_DIR: &str = "pointer_db";

fn open_dir(dir: &Path, create: bool) -> StoreResult<()> {
    if create {
        fs::create_dir_all(dir)?;
    } else if !dir.is_dir() {
        return Err(StoreError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("store directory {} does not exist", dir.display()),
        )));
    }
    Ok(())
}

/// File names in `dir` that are full identifiers starting with `prefix`.
///
/// Temporary files and anything else that is not an identifier are skipped.
fn list_matching(dir: &Path, prefix: &str) -> StoreResult<Vec<String>> {
    validate_partial(prefix)?;
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if is_valid(name, false) && name.starts_with(prefix) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

fn map_not_found(e: io::Error, not_found: impl FnOnce() -> StoreError) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        not_found()
    } else {
        StoreError::Io(e)
    }
}

/// Write `data` to a fresh temporary file in `dir`, flushed to disk.
fn staged(dir: &Path, data: &[u8]) -> StoreResult<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

#[cfg(unix)]
fn make_read_only(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o400))
}

#[cfg(not(unix))]
fn make_read_only(file: &fs::File) -> io::Result<()> {
    let mut perms = file.metadata()?.permissions();
    perms.set_readonly(true);
    file.set_permissions(perms)
}

/// Content store keeping one file per blob.
#[derive(Debug)]
pub struct FsContentStore {
    dir: PathBuf,
}

impl FsContentStore {
    pub fn open(dir: impl Into<PathBuf>, create: bool) -> StoreResult<Self> {
        let dir = dir.into();
        open_dir(&dir, create)?;
        Ok(Self { dir })
    }

    fn path(&self, id: &ContentId) -> PathBuf {
        self.dir.join(id.to_hex())
    }
}

impl ContentStore for FsContentStore {
    fn put(&self, data: &[u8]) -> StoreResult<ContentId> {
        let id = ContentId::digest(data);
        let path = self.path(&id);
        if path.exists() {
            return Ok(id);
        }
        let tmp = staged(&self.dir, data)?;
        make_read_only(tmp.as_file())?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                debug!(id = %id.short_hex(), bytes = data.len(), "stored blob");
                Ok(id)
            }
            // Another writer got there first with the same bytes.
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(id),
            Err(e) => Err(StoreError::Io(e.error)),
        }
    }

    fn get(&self, id: &ContentId) -> StoreResult<Vec<u8>> {
        let data = fs::read(self.path(id))
            .map_err(|e| map_not_found(e, || StoreError::content_not_found(id)))?;
        let computed = ContentId::digest(&data);
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(data)
    }

    fn contains(&self, id: &ContentId) -> StoreResult<bool> {
        Ok(self.path(id).is_file())
    }

    fn delete(&self, id: &ContentId) -> StoreResult<()> {
        fs::remove_file(self.path(id))
            .map_err(|e| map_not_found(e, || StoreError::content_not_found(id)))
    }

    fn find(&self, prefix: &str) -> StoreResult<Vec<ContentId>> {
        list_matching(&self.dir, prefix)?
            .iter()
            .map(|name| ContentId::from_hex(name).map_err(StoreError::from))
            .collect()
    }
}

/// Pointer store keeping one file per pointer, holding the target's hex id.
#[derive(Debug)]
pub struct FsPointerStore {
    dir: PathBuf,
    // Held by every writer so compare-and-set sees no interleaved set or delete.
    writer: Mutex<()>,
}

impl FsPointerStore {
    pub fn open(dir: impl Into<PathBuf>, create: bool) -> StoreResult<Self> {
        let dir = dir.into();
        open_dir(&dir, create)?;
        Ok(Self {
            dir,
            writer: Mutex::new(()),
        })
    }

    fn path(&self, id: &PointerId) -> PathBuf {
        self.dir.join(id.to_hex())
    }

    fn read_target(&self, id: &PointerId) -> StoreResult<Option<ContentId>> {
        let text = match fs::read_to_string(self.path(id)) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        ContentId::from_hex(text.trim())
            .map(Some)
            .map_err(|e| StoreError::CorruptObject {
                id: id.to_hex(),
                reason: e.to_string(),
            })
    }

    fn write_target(&self, id: &PointerId, target: &ContentId) -> StoreResult<()> {
        let tmp = staged(&self.dir, target.to_hex().as_bytes())?;
        tmp.persist(self.path(id)).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

impl PointerStore for FsPointerStore {
    fn set(&self, id: &PointerId, target: &ContentId) -> StoreResult<()> {
        let _guard = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        self.write_target(id, target)
    }

    fn get(&self, id: &PointerId) -> StoreResult<ContentId> {
        self.read_target(id)?
            .ok_or_else(|| StoreError::pointer_not_found(id))
    }

    fn contains(&self, id: &PointerId) -> StoreResult<bool> {
        Ok(self.path(id).is_file())
    }

    fn delete(&self, id: &PointerId) -> StoreResult<()> {
        let _guard = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        fs::remove_file(self.path(id))
            .map_err(|e| map_not_found(e, || StoreError::pointer_not_found(id)))
    }

    fn find(&self, prefix: &str) -> StoreResult<Vec<PointerId>> {
        list_matching(&self.dir, prefix)?
            .iter()
            .map(|name| PointerId::from_hex(name).map_err(StoreError::from))
            .collect()
    }

    fn compare_and_set(
        &self,
        id: &PointerId,
        expected: Option<&ContentId>,
        new: &ContentId,
    ) -> StoreResult<()> {
        let _guard = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        let current = self.read_target(id)?;
        if current.as_ref() != expected {
            return Err(StoreError::Conflict {
                id: id.to_hex(),
                expected: describe_target(expected),
                found: describe_target(current.as_ref()),
            });
        }
        self.write_target(id, new)
    }
}

/// A content store and pointer store sharing one root directory.
#[derive(Debug)]
pub struct FsDataStore {
    root: PathBuf,
    content: FsContentStore,
    pointers: FsPointerStore,
}

impl FsDataStore {
    /// Open the store rooted at `root`, creating the directories if
    /// `create` is set.
    pub fn open(root: impl AsRef<Path>, create: bool) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        let content = FsContentStore::open(root.join(CONTENT_DIR), create)?;
        let pointers = FsPointerStore::open(root.join(POINTER_DIR), create)?;
        debug!(root = %root.display(), "opened filesystem store");
        Ok(Self {
            root,
            content,
            pointers,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DataStore for FsDataStore {
    fn content(&self) -> &dyn ContentStore {
        &self.content
    }

    fn pointers(&self) -> &dyn PointerStore {
        &self.pointers
    }
}
