//! Master hostname handover for masterful services.

use log::{error, info};

use crate::allocator::NameAllocator;
use crate::error::{Error, Result};
use crate::record::{master_hostname, ServiceType};
use crate::registrar::{bind_slot, Claim};
use crate::registry::{Filter, Patch, Registry};

pub struct MasterElection<'a, R: Registry + ?Sized> {
    registry: &'a R,
}

impl<'a, R: Registry + ?Sized> MasterElection<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self { registry }
    }

    pub fn is_master(&self, service: &str, instance_id: &str) -> Result<bool> {
        Ok(self.current_master(service)?.as_deref() == Some(instance_id))
    }

    /// Instance bound to `<service>-master`, if any. A vacant master slot
    /// yields `None`; more than one master record is an error.
    pub fn current_master(&self, service: &str) -> Result<Option<String>> {
        let hostname = master_hostname(service);
        let records = self.registry.find(&Filter::all().hostname(&hostname))?;
        match records.as_slice() {
            [] => Ok(None),
            [record] if record.instance_id.is_empty() => Ok(None),
            [record] => Ok(Some(record.instance_id.clone())),
            _ => {
                error!("multiple masters listed for service {service}, aborting");
                Err(Error::Inconsistency {
                    hostname,
                    count: records.len(),
                })
            }
        }
    }

    /// Moves `<service>-master` to `caller` and gives the displaced master a
    /// fresh name. Returns `false` without writing when the service is not
    /// masterful or the caller already is master.
    pub fn step_up(&self, service: &str, service_type: ServiceType, caller: &str) -> Result<bool> {
        if service_type != ServiceType::Masterful {
            return Ok(false);
        }
        if caller.is_empty() {
            return Err(Error::InvalidInput("instance id cannot be empty"));
        }
        if self.is_master(service, caller)? {
            return Ok(false);
        }
        if self.registry.count(&Filter::all().instance_id(caller))? == 0 {
            return Err(Error::NotRegistered(caller.to_string()));
        }

        let master = master_hostname(service);
        let previous = match self.current_master(service)? {
            Some(id) => self.registry.find_one(&Filter::all().instance_id(&id))?,
            None => None,
        };

        // Vacate the master slot, conditional on its holder not having
        // changed since it was read. A vacant master record has nobody to
        // relocate and is dropped.
        match &previous {
            Some(old) => {
                let vacated = self.registry.update(
                    &Filter::all().hostname(&master).instance_id(&old.instance_id),
                    &Patch::new().hostname(""),
                )?;
                if vacated == 0 {
                    return Err(Error::Conflict(master));
                }
            }
            None => {
                self.registry
                    .remove(&Filter::all().hostname(&master).instance_id(""))?;
            }
        }

        self.registry
            .update(&Filter::all().instance_id(caller), &Patch::new().hostname(""))?;
        let promoted = self.registry.update(
            &Filter::all().instance_id(caller).hostname(""),
            &Patch::new().hostname(&master),
        )?;
        if promoted == 0 {
            return Err(Error::Conflict(master));
        }
        info!("{caller} is now {master}");

        if let Some(old) = previous {
            let allocation = NameAllocator::new(self.registry)
                .allocate(service, service_type, &old.instance_id)?
                .ok_or_else(|| Error::Conflict(master.clone()))?;
            let claim = Claim {
                instance_id: &old.instance_id,
                ip: &old.ip,
                service,
                service_type,
                aliases: &old.aliases,
            };
            if !bind_slot(self.registry, &allocation, &claim)? {
                return Err(Error::Conflict(allocation.hostname));
            }
            info!("former master {} moved to {}", old.instance_id, allocation.hostname);
        }

        Ok(true)
    }
}
