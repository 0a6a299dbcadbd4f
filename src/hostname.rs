//! Applying a hostname to the local machine.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Error, Result};

/// Longest hostname accepted by `sethostname(2)` on Linux.
pub const HOST_NAME_MAX: usize = 64;

pub trait LocalHostname {
    /// Sets and persists the machine's hostname. An error means the machine
    /// did not change name.
    fn apply(&self, hostname: &str) -> Result<()>;
}

/// Sets the kernel hostname and persists it to the hostname file.
/// Needs root.
#[derive(Debug, Clone)]
pub struct SystemHostname {
    hostname_file: PathBuf,
}

impl SystemHostname {
    pub fn new(hostname_file: impl Into<PathBuf>) -> Self {
        Self {
            hostname_file: hostname_file.into(),
        }
    }

    pub fn hostname_file(&self) -> &Path {
        &self.hostname_file
    }
}

impl Default for SystemHostname {
    fn default() -> Self {
        Self::new("/etc/hostname")
    }
}

impl LocalHostname for SystemHostname {
    fn apply(&self, hostname: &str) -> Result<()> {
        validate_hostname(hostname)?;
        let fail = |source: std::io::Error| Error::LocalApply {
            hostname: hostname.to_string(),
            source,
        };

        let res = unsafe { libc::sethostname(hostname.as_ptr().cast(), hostname.len() as _) };
        if res != 0 {
            return Err(fail(std::io::Error::last_os_error()));
        }
        persist_hostname(&self.hostname_file, hostname).map_err(fail)?;
        info!("local hostname set to {hostname}");
        Ok(())
    }
}

pub fn validate_hostname(hostname: &str) -> Result<()> {
    if hostname.is_empty() {
        return Err(Error::InvalidInput("hostname cannot be empty"));
    }
    if hostname.len() > HOST_NAME_MAX {
        return Err(Error::InvalidInput("hostname longer than 64 bytes"));
    }
    if hostname.contains(|c: char| c.is_whitespace() || c == '\0' || c == '/') {
        return Err(Error::InvalidInput("hostname contains invalid characters"));
    }
    Ok(())
}

fn persist_hostname(path: &Path, hostname: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = std::fs::File::create(&tmp)?;
    writeln!(file, "{hostname}")?;
    file.sync_all()?;
    std::fs::rename(tmp, path)
}
