//! Hostname selection for new and re-registering instances.
//!
//! Vacant slots are always reused first, smallest hostname wins. New names
//! take their ordinal from the number of named records in the service, so
//! two allocations that read the same snapshot pick the same name; the
//! registry's hostname index and the conditional bind in the registrar turn
//! that race into a retry.

use std::collections::BTreeSet;

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::guard::{Binding, DuplicateGuard};
use crate::record::{
    iterative_hostname, master_hostname, slave_hostname, HostRecord, ServiceType,
};
use crate::registry::Registry;

/// A chosen hostname together with the registry state it was chosen from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub hostname: String,
    /// The existing record at `hostname` when it was picked. `None` for a
    /// newly minted name.
    pub slot: Option<HostRecord>,
    /// Binding of the requesting instance at allocation time.
    pub binding: Binding,
}

/// Picks a hostname for `service` from a registry snapshot. Records of
/// other services only matter as names a new hostname must not reuse.
pub fn pick_name(
    records: &[HostRecord],
    service: &str,
    service_type: ServiceType,
) -> (String, Option<HostRecord>) {
    let named: Vec<&HostRecord> = records
        .iter()
        .filter(|r| r.service == service && r.is_named())
        .collect();
    let named_count = named.len();
    debug!("{named_count} named hosts found in service {service}");

    if service_type == ServiceType::Masterful {
        let master = master_hostname(service);
        if named.is_empty() {
            return (master, None);
        }
        if let Some(slot) = named.iter().find(|r| r.hostname == master) {
            if slot.instance_id.is_empty() {
                info!("replacing fallen master {master}");
                return (master, Some((*slot).clone()));
            }
        }
    }

    if let Some(gap) = smallest_gap(&named) {
        info!("reusing vacant slot {}", gap.hostname);
        return (gap.hostname.clone(), Some(gap.clone()));
    }

    let taken: BTreeSet<&str> = records
        .iter()
        .filter(|r| r.is_named())
        .map(|r| r.hostname.as_str())
        .collect();
    let mut ordinal = named_count;
    loop {
        let candidate = match service_type {
            ServiceType::Masterful => slave_hostname(service, ordinal),
            ServiceType::Iterative => iterative_hostname(service, ordinal),
        };
        if !taken.contains(candidate.as_str()) {
            return (candidate, None);
        }
        debug!("{candidate} is already taken, trying the next ordinal");
        ordinal += 1;
    }
}

fn smallest_gap<'r>(named: &[&'r HostRecord]) -> Option<&'r HostRecord> {
    named
        .iter()
        .copied()
        .filter(|r| r.instance_id.is_empty())
        .min_by(|a, b| a.hostname.cmp(&b.hostname))
}

pub struct NameAllocator<'a, R: Registry + ?Sized> {
    registry: &'a R,
}

impl<'a, R: Registry + ?Sized> NameAllocator<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self { registry }
    }

    /// Returns `None` when the instance already owns a named slot.
    pub fn allocate(
        &self,
        service: &str,
        service_type: ServiceType,
        instance_id: &str,
    ) -> Result<Option<Allocation>> {
        let binding = DuplicateGuard::new(self.registry).binding(instance_id)?;
        if let Binding::Bound { hostname } = &binding {
            warn!("refusing allocation: {instance_id} already holds {hostname}");
            return Ok(None);
        }

        let records = self.registry.snapshot()?;
        if let Some(existing) = records
            .iter()
            .find(|r| r.service == service && r.service_type != service_type)
        {
            return Err(Error::ServiceTypeMismatch {
                service: service.to_string(),
                existing: existing.service_type,
                requested: service_type,
            });
        }

        let (hostname, slot) = pick_name(&records, service, service_type);
        Ok(Some(Allocation {
            hostname,
            slot,
            binding,
        }))
    }
}
