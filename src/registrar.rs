//! Registration and failover orchestration.
//!
//! The registrar is the only component that changes the machine's name and
//! writes bindings to the registry. A registration is all-or-nothing with
//! respect to the local name: the registry is written only after the local
//! apply succeeded, and aliases move to the new record only once it is bound.

use std::collections::BTreeSet;

use log::{debug, info, warn};

use crate::allocator::{Allocation, NameAllocator};
use crate::election::MasterElection;
use crate::error::{Error, Result};
use crate::guard::{Binding, DuplicateGuard};
use crate::hostname::LocalHostname;
use crate::record::{HostRecord, ServiceType};
use crate::registry::{Filter, Patch, Registry};

/// Allocate-and-bind rounds before a registration gives up on a contended
/// slot.
pub const MAX_BIND_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Registered { hostname: String },
    /// The instance already owns a named slot; nothing was changed.
    Refused,
}

/// Lookup key of a rename: exactly one of instance id or hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKey {
    Instance(String),
    Hostname(String),
}

impl SlotKey {
    pub fn from_parts(instance_id: Option<String>, hostname: Option<String>) -> Result<Self> {
        match (instance_id, hostname) {
            (Some(_), Some(_)) => Err(Error::InvalidInput(
                "specify either an instance id or a hostname, not both",
            )),
            (None, None) => Err(Error::InvalidInput(
                "specify either an instance id or a hostname",
            )),
            (Some(id), None) if !id.is_empty() => Ok(SlotKey::Instance(id)),
            (None, Some(host)) if !host.is_empty() => Ok(SlotKey::Hostname(host)),
            _ => Err(Error::InvalidInput("lookup key cannot be empty")),
        }
    }

    fn filter(&self) -> Filter {
        match self {
            SlotKey::Instance(id) => Filter::all().instance_id(id),
            SlotKey::Hostname(host) => Filter::all().hostname(host),
        }
    }
}

/// Fields written when an instance takes a slot.
pub(crate) struct Claim<'c> {
    pub instance_id: &'c str,
    pub ip: &'c str,
    pub service: &'c str,
    pub service_type: ServiceType,
    pub aliases: &'c BTreeSet<String>,
}

impl Claim<'_> {
    fn patch(&self) -> Patch {
        Patch::new()
            .instance_id(self.instance_id)
            .ip(self.ip)
            .service(self.service)
            .service_type(self.service_type)
            .aliases(self.aliases.clone())
    }
}

/// Writes an allocation as a conditional update. Returns `false` when the
/// slot changed since the allocation read it.
pub(crate) fn bind_slot<R: Registry + ?Sized>(
    registry: &R,
    allocation: &Allocation,
    claim: &Claim<'_>,
) -> Result<bool> {
    let nameless = Filter::all().instance_id(claim.instance_id).hostname("");
    let outcome = match (&allocation.slot, &allocation.binding) {
        (Some(slot), _) => {
            let expected = Filter::all()
                .hostname(&allocation.hostname)
                .instance_id(&slot.instance_id);
            registry.update(&expected, &claim.patch()).map(|n| n > 0)
        }
        (None, Binding::Unnamed) => registry
            .update(&nameless, &claim.patch().hostname(&allocation.hostname))
            .map(|n| n > 0),
        (None, _) => {
            let record = HostRecord {
                instance_id: claim.instance_id.to_string(),
                hostname: allocation.hostname.clone(),
                ip: claim.ip.to_string(),
                service: claim.service.to_string(),
                service_type: claim.service_type,
                aliases: claim.aliases.clone(),
            };
            registry.insert(record).map(|()| true)
        }
    };

    let bound = match outcome {
        Ok(bound) => bound,
        Err(Error::HostnameTaken(hostname)) => {
            debug!("{hostname} was taken before it could be bound");
            false
        }
        Err(err) => return Err(err),
    };

    if bound && allocation.slot.is_some() && allocation.binding == Binding::Unnamed {
        // The instance moved into an existing slot; its nameless record is
        // not a slot and goes.
        registry.remove(&nameless)?;
    }
    Ok(bound)
}

pub struct Registrar<'a, R: Registry + ?Sized, L: LocalHostname + ?Sized> {
    registry: &'a R,
    local: &'a L,
    max_attempts: usize,
}

impl<'a, R: Registry + ?Sized, L: LocalHostname + ?Sized> Registrar<'a, R, L> {
    pub fn new(registry: &'a R, local: &'a L) -> Self {
        Self {
            registry,
            local,
            max_attempts: MAX_BIND_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// The hostname a registration would pick right now. Writes nothing.
    pub fn plan(
        &self,
        service: &str,
        service_type: ServiceType,
        instance_id: &str,
    ) -> Result<Option<String>> {
        validate_request(service, instance_id)?;
        let allocation =
            NameAllocator::new(self.registry).allocate(service, service_type, instance_id)?;
        Ok(allocation.map(|a| a.hostname))
    }

    pub fn register<I, S>(
        &self,
        service: &str,
        service_type: ServiceType,
        instance_id: &str,
        ip: &str,
        aliases: I,
    ) -> Result<Registration>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_request(service, instance_id)?;
        let aliases: BTreeSet<String> = aliases.into_iter().map(Into::into).collect();
        let allocator = NameAllocator::new(self.registry);
        let claim = Claim {
            instance_id,
            ip,
            service,
            service_type,
            aliases: &aliases,
        };

        let mut applied: Option<String> = None;
        for attempt in 1..=self.max_attempts {
            let allocation = match allocator.allocate(service, service_type, instance_id)? {
                Some(allocation) => allocation,
                None => return Ok(Registration::Refused),
            };

            if applied.as_deref() != Some(allocation.hostname.as_str()) {
                self.local.apply(&allocation.hostname)?;
                applied = Some(allocation.hostname.clone());
            }

            if bind_slot(self.registry, &allocation, &claim)? {
                DuplicateGuard::new(self.registry)
                    .resolve_alias_conflicts(&aliases, &allocation.hostname)?;
                info!("registered {instance_id} ({ip}) as {}", allocation.hostname);
                return Ok(Registration::Registered {
                    hostname: allocation.hostname,
                });
            }
            warn!(
                "lost race for {} on attempt {attempt}/{}",
                allocation.hostname, self.max_attempts
            );
        }

        Err(Error::BindConflict {
            hostname: applied.unwrap_or_default(),
            attempts: self.max_attempts,
        })
    }

    pub fn request_master_failover(
        &self,
        service: &str,
        service_type: ServiceType,
        instance_id: &str,
    ) -> Result<bool> {
        MasterElection::new(self.registry).step_up(service, service_type, instance_id)
    }

    /// Sets the hostname of the records selected by `key`. Returns the number
    /// of records changed.
    pub fn rename(&self, key: &SlotKey, hostname: &str) -> Result<usize> {
        let changed = self.registry.update(&key.filter(), &Patch::new().hostname(hostname))?;
        info!("renamed {changed} record(s) matching {key:?} to {hostname:?}");
        Ok(changed)
    }
}

fn validate_request(service: &str, instance_id: &str) -> Result<()> {
    if service.is_empty() {
        return Err(Error::InvalidInput("service cannot be empty"));
    }
    if instance_id.is_empty() {
        return Err(Error::InvalidInput("instance id cannot be empty"));
    }
    Ok(())
}
