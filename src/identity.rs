//! Identity of the instance this process runs on.

use crate::error::Result;

pub const DEFAULT_METADATA_URL: &str = "http://169.254.169.254/latest/meta-data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub instance_id: String,
    pub local_ip: String,
}

pub trait IdentitySource {
    fn fetch(&self) -> Result<Identity>;
}

/// Fixed identity for tests and hosts outside the cloud.
#[derive(Debug, Clone)]
pub struct OfflineIdentity {
    identity: Identity,
}

impl OfflineIdentity {
    pub fn new(instance_id: impl Into<String>, local_ip: impl Into<String>) -> Self {
        Self {
            identity: Identity {
                instance_id: instance_id.into(),
                local_ip: local_ip.into(),
            },
        }
    }
}

impl Default for OfflineIdentity {
    fn default() -> Self {
        Self::new("test-instance", "test_local_ip")
    }
}

impl IdentitySource for OfflineIdentity {
    fn fetch(&self) -> Result<Identity> {
        Ok(self.identity.clone())
    }
}

#[cfg(feature = "metadata")]
pub use metadata::MetadataClient;

#[cfg(feature = "metadata")]
mod metadata {
    use std::time::Duration;

    use log::{debug, warn};

    use super::{Identity, IdentitySource};
    use crate::error::{Error, Result};

    /// Reads `instance-id` and `local-ipv4` from the cloud metadata service,
    /// polling until both are non-empty. The service is link-local, so proxy
    /// settings from the environment are ignored.
    #[derive(Debug, Clone)]
    pub struct MetadataClient {
        base_url: String,
        client: reqwest::blocking::Client,
        poll_interval: Duration,
        max_attempts: Option<usize>,
    }

    impl MetadataClient {
        pub fn new(base_url: impl Into<String>) -> Result<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(5))
                .no_proxy()
                .build()
                .map_err(|err| Error::Metadata(err.to_string()))?;
            Ok(Self {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                client,
                poll_interval: Duration::from_secs(1),
                max_attempts: None,
            })
        }

        pub fn with_poll_interval(mut self, interval: Duration) -> Self {
            self.poll_interval = interval;
            self
        }

        /// Caps polling; unlimited by default.
        pub fn with_max_attempts(mut self, attempts: usize) -> Self {
            self.max_attempts = Some(attempts);
            self
        }

        fn get(&self, key: &str) -> Result<String> {
            let url = format!("{}/{key}", self.base_url);
            let response = self
                .client
                .get(&url)
                .send()
                .and_then(|r| r.error_for_status())
                .map_err(|err| Error::Metadata(format!("{url}: {err}")))?;
            let body = response
                .text()
                .map_err(|err| Error::Metadata(format!("{url}: {err}")))?;
            Ok(body.trim().to_string())
        }
    }

    impl IdentitySource for MetadataClient {
        fn fetch(&self) -> Result<Identity> {
            let mut attempt = 0usize;
            loop {
                attempt += 1;
                let instance_id = self.get("instance-id")?;
                let local_ip = self.get("local-ipv4")?;
                debug!("metadata returned instance {instance_id:?} ip {local_ip:?}");
                if !instance_id.is_empty() && !local_ip.is_empty() {
                    return Ok(Identity {
                        instance_id,
                        local_ip,
                    });
                }
                if self.max_attempts.is_some_and(|max| attempt >= max) {
                    return Err(Error::Metadata(format!(
                        "identity still incomplete after {attempt} attempts"
                    )));
                }
                warn!("metadata identity incomplete, retrying");
                std::thread::sleep(self.poll_interval);
            }
        }
    }

}
