//! Duplicate instance and alias conflict detection.
//!
//! The pure functions work on an explicit record set; [`DuplicateGuard`]
//! runs the same checks against a live registry.

use std::collections::BTreeSet;

use log::{info, warn};

use crate::error::Result;
use crate::record::HostRecord;
use crate::registry::{Filter, Patch, Registry};

/// How an instance is currently bound in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// No record carries the instance.
    Unbound,
    /// The instance owns a named slot. Allocation must be refused.
    Bound { hostname: String },
    /// The instance is on a record whose hostname was cleared, such as a
    /// displaced master in the middle of a failover. Re-allocation is
    /// allowed and reuses or releases that record.
    Unnamed,
}

impl Binding {
    pub fn is_bound(&self) -> bool {
        matches!(self, Binding::Bound { .. })
    }
}

pub fn binding_of(records: &[HostRecord], instance_id: &str) -> Binding {
    if instance_id.is_empty() {
        return Binding::Unbound;
    }
    let mut unnamed = false;
    for record in records.iter().filter(|r| r.instance_id == instance_id) {
        if record.is_named() {
            return Binding::Bound {
                hostname: record.hostname.clone(),
            };
        }
        unnamed = true;
    }
    if unnamed {
        Binding::Unnamed
    } else {
        Binding::Unbound
    }
}

/// The requested aliases that some record already holds.
pub fn alias_conflicts(records: &[HostRecord], aliases: &BTreeSet<String>) -> BTreeSet<String> {
    records
        .iter()
        .flat_map(|record| record.aliases.intersection(aliases))
        .cloned()
        .collect()
}

/// Returns updated copies of the records holding any of `conflicts`, with
/// exactly those aliases removed.
pub fn resolve_alias_conflicts(
    records: &[HostRecord],
    conflicts: &BTreeSet<String>,
) -> Vec<HostRecord> {
    let patch = Patch::new().pull_aliases(conflicts.clone());
    records
        .iter()
        .filter(|record| !record.aliases.is_disjoint(conflicts))
        .map(|record| {
            let mut updated = record.clone();
            patch.apply(&mut updated);
            updated
        })
        .collect()
}

pub struct DuplicateGuard<'a, R: Registry + ?Sized> {
    registry: &'a R,
}

impl<'a, R: Registry + ?Sized> DuplicateGuard<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self { registry }
    }

    pub fn binding(&self, instance_id: &str) -> Result<Binding> {
        if instance_id.is_empty() {
            return Ok(Binding::Unbound);
        }
        let records = self.registry.find(&Filter::all().instance_id(instance_id))?;
        Ok(binding_of(&records, instance_id))
    }

    pub fn is_bound_duplicate(&self, instance_id: &str) -> Result<bool> {
        let binding = self.binding(instance_id)?;
        if let Binding::Bound { hostname } = &binding {
            warn!("duplicate instance {instance_id} already holds {hostname}");
        }
        Ok(binding.is_bound())
    }

    pub fn find_alias_conflicts(&self, aliases: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        if aliases.is_empty() {
            return Ok(BTreeSet::new());
        }
        let holders = self.registry.find(&Filter::all().any_alias(aliases))?;
        Ok(alias_conflicts(&holders, aliases))
    }

    /// Strips `conflicts` from every record holding them except the one at
    /// `owner`. Returns the number of records touched.
    pub fn resolve_alias_conflicts(
        &self,
        conflicts: &BTreeSet<String>,
        owner: &str,
    ) -> Result<usize> {
        if conflicts.is_empty() {
            return Ok(0);
        }
        let touched = self.registry.update(
            &Filter::all().any_alias(conflicts).not_hostname(owner),
            &Patch::new().pull_aliases(conflicts.clone()),
        )?;
        if touched > 0 {
            info!("transferred aliases {conflicts:?} from {touched} records to {owner}");
        }
        Ok(touched)
    }
}
