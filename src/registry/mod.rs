//! Shared naming registry access.
//!
//! The registry is a flat collection of [`HostRecord`]s with document-store
//! style operations: exact-match and set-membership finds, conditional
//! updates by filter, inserts, removals and counts. Every backend enforces a unique
//! index on non-empty hostnames; a write that would break it fails with
//! [`Error::HostnameTaken`] and leaves the registry untouched.

pub mod file;
pub mod memory;

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::record::{HostRecord, ServiceType};

pub use file::FileRegistry;
pub use memory::MemoryRegistry;

/// Record selector. Every field that is set must match; an empty filter
/// matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    instance_id: Option<String>,
    hostname: Option<String>,
    not_hostname: Option<String>,
    service: Option<String>,
    any_alias: Option<BTreeSet<String>>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn instance_id(mut self, value: impl Into<String>) -> Self {
        self.instance_id = Some(value.into());
        self
    }

    pub fn hostname(mut self, value: impl Into<String>) -> Self {
        self.hostname = Some(value.into());
        self
    }

    /// Excludes the record holding `value`.
    pub fn not_hostname(mut self, value: impl Into<String>) -> Self {
        self.not_hostname = Some(value.into());
        self
    }

    pub fn service(mut self, value: impl Into<String>) -> Self {
        self.service = Some(value.into());
        self
    }

    /// Matches records holding at least one of `aliases`.
    pub fn any_alias(mut self, aliases: &BTreeSet<String>) -> Self {
        self.any_alias = Some(aliases.clone());
        self
    }

    pub fn matches(&self, record: &HostRecord) -> bool {
        if let Some(value) = &self.instance_id {
            if record.instance_id != *value {
                return false;
            }
        }
        if let Some(value) = &self.hostname {
            if record.hostname != *value {
                return false;
            }
        }
        if let Some(value) = &self.not_hostname {
            if record.hostname == *value {
                return false;
            }
        }
        if let Some(value) = &self.service {
            if record.service != *value {
                return false;
            }
        }
        if let Some(aliases) = &self.any_alias {
            if record.aliases.is_disjoint(aliases) {
                return false;
            }
        }
        true
    }
}

/// Field assignments applied to every record matched by an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    instance_id: Option<String>,
    hostname: Option<String>,
    ip: Option<String>,
    service: Option<String>,
    service_type: Option<ServiceType>,
    aliases: Option<BTreeSet<String>>,
    pull_aliases: Option<BTreeSet<String>>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance_id(mut self, value: impl Into<String>) -> Self {
        self.instance_id = Some(value.into());
        self
    }

    pub fn hostname(mut self, value: impl Into<String>) -> Self {
        self.hostname = Some(value.into());
        self
    }

    pub fn ip(mut self, value: impl Into<String>) -> Self {
        self.ip = Some(value.into());
        self
    }

    pub fn service(mut self, value: impl Into<String>) -> Self {
        self.service = Some(value.into());
        self
    }

    pub fn service_type(mut self, value: ServiceType) -> Self {
        self.service_type = Some(value);
        self
    }

    /// Replaces the alias set.
    pub fn aliases(mut self, aliases: BTreeSet<String>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    /// Removes exactly these aliases, keeping the others. Applied after
    /// [`Patch::aliases`] when both are set.
    pub fn pull_aliases(mut self, aliases: BTreeSet<String>) -> Self {
        self.pull_aliases = Some(aliases);
        self
    }

    pub fn apply(&self, record: &mut HostRecord) {
        if let Some(value) = &self.instance_id {
            record.instance_id.clone_from(value);
        }
        if let Some(value) = &self.hostname {
            record.hostname.clone_from(value);
        }
        if let Some(value) = &self.ip {
            record.ip.clone_from(value);
        }
        if let Some(value) = &self.service {
            record.service.clone_from(value);
        }
        if let Some(value) = self.service_type {
            record.service_type = value;
        }
        if let Some(value) = &self.aliases {
            record.aliases.clone_from(value);
        }
        if let Some(pull) = &self.pull_aliases {
            record.aliases.retain(|alias| !pull.contains(alias));
        }
    }
}

pub trait Registry {
    fn find(&self, filter: &Filter) -> Result<Vec<HostRecord>>;

    /// Inserts a new record. Fails with [`Error::HostnameTaken`] if another
    /// record already holds the same non-empty hostname.
    fn insert(&self, record: HostRecord) -> Result<()>;

    /// Applies `patch` to every record matching `filter` and returns the
    /// number of records matched.
    fn update(&self, filter: &Filter, patch: &Patch) -> Result<usize>;

    /// Deletes every record matching `filter` and returns how many went.
    fn remove(&self, filter: &Filter) -> Result<usize>;

    fn find_one(&self, filter: &Filter) -> Result<Option<HostRecord>> {
        Ok(self.find(filter)?.into_iter().next())
    }

    fn count(&self, filter: &Filter) -> Result<usize> {
        Ok(self.find(filter)?.len())
    }

    fn snapshot(&self) -> Result<Vec<HostRecord>> {
        self.find(&Filter::all())
    }
}

pub(crate) fn insert_record(records: &mut Vec<HostRecord>, record: HostRecord) -> Result<()> {
    if record.is_named() && records.iter().any(|r| r.hostname == record.hostname) {
        return Err(Error::HostnameTaken(record.hostname));
    }
    records.push(record);
    Ok(())
}

pub(crate) fn update_records(
    records: &mut [HostRecord],
    filter: &Filter,
    patch: &Patch,
) -> Result<usize> {
    let matched: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| filter.matches(record))
        .map(|(idx, _)| idx)
        .collect();

    if let Some(hostname) = patch.hostname.as_deref().filter(|h| !h.is_empty()) {
        let held_elsewhere = records
            .iter()
            .enumerate()
            .any(|(idx, r)| r.hostname == hostname && !matched.contains(&idx));
        if matched.len() > 1 || (!matched.is_empty() && held_elsewhere) {
            return Err(Error::HostnameTaken(hostname.to_string()));
        }
    }

    for idx in &matched {
        patch.apply(&mut records[*idx]);
    }
    Ok(matched.len())
}

pub(crate) fn remove_records(records: &mut Vec<HostRecord>, filter: &Filter) -> usize {
    let before = records.len();
    records.retain(|record| !filter.matches(record));
    before - records.len()
}
