//! Host records stored in the naming registry.
//!
//! One record exists per hostname slot. A slot whose `instance_id` is empty
//! is vacant: the name is reserved for reuse but nothing is bound to it.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Allocation policy of a service. Fixed once the service has a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// One `<service>-master` plus numbered `<service>-slave-<n>` hosts.
    Masterful,
    /// Plain `<service>-<n>` hosts.
    #[default]
    Iterative,
}

impl ServiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::Masterful => "masterful",
            ServiceType::Iterative => "iterative",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "masterful" => Ok(ServiceType::Masterful),
            "iterative" => Ok(ServiceType::Iterative),
            other => Err(Error::InvalidHostInfo(format!("unknown service type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub instance_id: String,
    pub hostname: String,
    pub ip: String,
    pub service: String,
    pub service_type: ServiceType,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
}

impl HostRecord {
    pub fn new(
        hostname: impl Into<String>,
        instance_id: impl Into<String>,
        ip: impl Into<String>,
        service: impl Into<String>,
        service_type: ServiceType,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            hostname: hostname.into(),
            ip: ip.into(),
            service: service.into(),
            service_type,
            aliases: BTreeSet::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_named(&self) -> bool {
        !self.hostname.is_empty()
    }

    /// A named slot with no bound instance.
    pub fn is_vacant(&self) -> bool {
        self.is_named() && self.instance_id.is_empty()
    }
}

/// The singleton master hostname of a masterful service.
pub fn master_hostname(service: &str) -> String {
    format!("{service}-master")
}

pub(crate) fn slave_hostname(service: &str, ordinal: usize) -> String {
    format!("{service}-slave-{ordinal}")
}

pub(crate) fn iterative_hostname(service: &str, ordinal: usize) -> String {
    format!("{service}-{ordinal}")
}
