use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::record::HostRecord;
use crate::registry::{insert_record, remove_records, update_records, Filter, Patch, Registry};

/// In-process registry. Shared by reference between callers in one process.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: Mutex<Vec<HostRecord>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the registry without the hostname uniqueness check.
    pub fn with_records(records: Vec<HostRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    fn records(&self) -> MutexGuard<'_, Vec<HostRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Registry for MemoryRegistry {
    fn find(&self, filter: &Filter) -> Result<Vec<HostRecord>> {
        Ok(self
            .records()
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    fn insert(&self, record: HostRecord) -> Result<()> {
        insert_record(&mut self.records(), record)
    }

    fn update(&self, filter: &Filter, patch: &Patch) -> Result<usize> {
        update_records(&mut self.records(), filter, patch)
    }

    fn remove(&self, filter: &Filter) -> Result<usize> {
        Ok(remove_records(&mut self.records(), filter))
    }
}
