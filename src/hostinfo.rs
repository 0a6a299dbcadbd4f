//! Host-type declaration file.
//!
//! Written once at first boot, a single line:
//!
//! ```text
//! <service> [<service_type> [<alias> ...]]
//! ```
//!
//! `service_type` is `masterful` or `iterative` and defaults to `iterative`.

use std::path::Path;
use std::str::FromStr;

use log::debug;

use crate::error::{Error, Result};
use crate::record::ServiceType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub service: String,
    pub service_type: ServiceType,
    pub aliases: Vec<String>,
}

impl HostInfo {
    pub fn load(path: &Path) -> Result<Self> {
        debug!("reading host info from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        contents.parse()
    }
}

impl FromStr for HostInfo {
    type Err = Error;

    fn from_str(contents: &str) -> Result<Self> {
        let mut fields = contents.split_whitespace();
        let service = fields
            .next()
            .ok_or_else(|| Error::InvalidHostInfo("missing service name".to_string()))?
            .to_string();
        let service_type = match fields.next() {
            Some(value) => value.parse()?,
            None => ServiceType::Iterative,
        };
        Ok(Self {
            service,
            service_type,
            aliases: fields.map(str::to_string).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_only_defaults_to_iterative() {
        let info: HostInfo = "web\n".parse().unwrap();
        assert_eq!(info.service, "web");
        assert_eq!(info.service_type, ServiceType::Iterative);
        assert!(info.aliases.is_empty());
    }

    #[test]
    fn test_masterful_with_aliases() {
        let info: HostInfo = "mongodb masterful db dbmaster".parse().unwrap();
        assert_eq!(info.service_type, ServiceType::Masterful);
        assert_eq!(info.aliases, vec!["db", "dbmaster"]);
    }

    #[test]
    fn test_empty_file_rejected() {
        assert!(matches!(
            "  \n".parse::<HostInfo>(),
            Err(Error::InvalidHostInfo(_))
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!("web primary".parse::<HostInfo>().is_err());
    }
}
