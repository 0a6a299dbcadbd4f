#![allow(dead_code)]

use std::cell::RefCell;

use fleetname::hostname::LocalHostname;
use fleetname::{Error, HostRecord, Registry, Result, ServiceType};

/// Records every hostname applied instead of touching the machine.
#[derive(Default)]
pub struct RecordingHostname {
    pub applied: RefCell<Vec<String>>,
}

impl LocalHostname for RecordingHostname {
    fn apply(&self, hostname: &str) -> Result<()> {
        self.applied.borrow_mut().push(hostname.to_string());
        Ok(())
    }
}

/// Fails like an unprivileged `sethostname(2)`.
pub struct DeniedHostname;

impl LocalHostname for DeniedHostname {
    fn apply(&self, hostname: &str) -> Result<()> {
        Err(Error::LocalApply {
            hostname: hostname.to_string(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        })
    }
}

pub fn bound(
    hostname: &str,
    instance_id: &str,
    service: &str,
    service_type: ServiceType,
) -> HostRecord {
    HostRecord::new(hostname, instance_id, "10.0.0.1", service, service_type)
}

pub fn vacant(hostname: &str, service: &str, service_type: ServiceType) -> HostRecord {
    HostRecord::new(hostname, "", "", service, service_type)
}

pub fn hostname_of<R: Registry>(registry: &R, instance_id: &str) -> Option<String> {
    registry
        .find_one(&fleetname::Filter::all().instance_id(instance_id))
        .expect("find")
        .map(|r| r.hostname)
}
