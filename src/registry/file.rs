//! Registry shared between processes through a directory.
//!
//! ```text
//! {dir}/
//! ├── registry.json  ← all records, replaced atomically on every write
//! └── registry.lock  ← flock(2) target serializing operations
//! ```
//!
//! Each operation takes the exclusive lock, reads the data file, applies
//! itself and, if anything changed, writes `registry.json.tmp` and renames it
//! over the data file. Two operations never interleave; a read-then-write
//! sequence across operations is not atomic.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::HostRecord;
use crate::registry::{
    insert_record, remove_records, update_records, Filter, Patch, Registry,
};

const DATA_FILE: &str = "registry.json";
const LOCK_FILE: &str = "registry.lock";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct RegistryData {
    version: u32,
    records: Vec<HostRecord>,
}

#[derive(Debug, Clone)]
pub struct FileRegistry {
    dir: PathBuf,
}

impl FileRegistry {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn data_path(&self) -> PathBuf {
        self.dir.join(DATA_FILE)
    }

    fn locked<T>(&self, op: impl FnOnce(&mut Vec<HostRecord>) -> Result<(T, bool)>) -> Result<T> {
        let _lock = RegistryLock::acquire(&self.dir.join(LOCK_FILE))?;
        let mut records = self.read_records()?;
        let (value, dirty) = op(&mut records)?;
        if dirty {
            self.write_records(records)?;
        }
        Ok(value)
    }

    fn read_records(&self) -> Result<Vec<HostRecord>> {
        let bytes = match std::fs::read(self.data_path()) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        let data: RegistryData = serde_json::from_slice(&bytes)?;
        if data.version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(data.version));
        }
        Ok(data.records)
    }

    fn write_records(&self, records: Vec<HostRecord>) -> Result<()> {
        let path = self.data_path();
        let tmp = path.with_extension("json.tmp");
        let data = RegistryData {
            version: FORMAT_VERSION,
            records,
        };
        let bytes = serde_json::to_vec_pretty(&data)?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, &path)?;
        debug!("wrote {} records to {}", data.records.len(), path.display());
        Ok(())
    }
}

impl Registry for FileRegistry {
    fn find(&self, filter: &Filter) -> Result<Vec<HostRecord>> {
        self.locked(|records| {
            let found = records
                .iter()
                .filter(|record| filter.matches(record))
                .cloned()
                .collect();
            Ok((found, false))
        })
    }

    fn insert(&self, record: HostRecord) -> Result<()> {
        self.locked(|records| insert_record(records, record).map(|()| ((), true)))
    }

    fn update(&self, filter: &Filter, patch: &Patch) -> Result<usize> {
        self.locked(|records| {
            let matched = update_records(records, filter, patch)?;
            Ok((matched, matched > 0))
        })
    }

    fn remove(&self, filter: &Filter) -> Result<usize> {
        self.locked(|records| {
            let removed = remove_records(records, filter);
            Ok((removed, removed > 0))
        })
    }
}

struct RegistryLock {
    file: File,
}

impl RegistryLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        loop {
            let res = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if res == 0 {
                return Ok(Self { file });
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != ErrorKind::Interrupted {
                return Err(Error::Io(err));
            }
        }
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}
