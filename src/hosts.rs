//! `/etc/hosts` rendering from a registry snapshot.
//!
//! The managed block sits at the end of the file:
//!
//! ```text
//! <legacy lines>
//! # FLEETNAME
//! 127.0.0.1 localhost
//! <ip> <hostname>
//! <ip> <alias>
//! # /FLEETNAME
//! ```

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, error, info};

use crate::error::{Error, Result};
use crate::record::HostRecord;
use crate::registry::Registry;

pub const SECTION_BEGIN: &str = "# FLEETNAME";
pub const SECTION_END: &str = "# /FLEETNAME";
const LOCALHOST_LINE: &str = "127.0.0.1 localhost";

/// `ip name` lines for every record with an address, aliases included.
pub fn render_lines(records: &[HostRecord]) -> Vec<String> {
    let mut lines = vec![LOCALHOST_LINE.to_string()];
    for record in records.iter().filter(|r| !r.ip.is_empty()) {
        if record.is_named() {
            lines.push(format!("{} {}", record.ip, record.hostname));
        }
        for alias in &record.aliases {
            lines.push(format!("{} {alias}", record.ip));
        }
    }
    lines
}

/// Lines of `content` before the managed block, trimmed.
pub fn preceding_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .take_while(|line| *line != SECTION_BEGIN)
        .map(str::to_string)
        .collect()
}

pub fn compose(legacy: &str, records: &[HostRecord]) -> String {
    let mut lines = preceding_lines(legacy);
    lines.push(SECTION_BEGIN.to_string());
    lines.extend(render_lines(records));
    lines.push(SECTION_END.to_string());
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[derive(Debug, Clone)]
pub struct HostsUpdater {
    hosts_path: PathBuf,
    legacy_path: PathBuf,
    legacy_updater: Option<PathBuf>,
}

impl HostsUpdater {
    pub fn new(hosts_path: impl Into<PathBuf>, legacy_path: impl Into<PathBuf>) -> Self {
        Self {
            hosts_path: hosts_path.into(),
            legacy_path: legacy_path.into(),
            legacy_updater: None,
        }
    }

    /// Program run before every real update, for sites still migrating off
    /// an older naming tool. It may rewrite the hosts file; its output is
    /// replaced by the managed block right after.
    pub fn with_legacy_updater(mut self, program: impl Into<PathBuf>) -> Self {
        self.legacy_updater = Some(program.into());
        self
    }

    /// Renders the hosts file from `registry`. Unless `dry_run`, runs the
    /// legacy updater if one is set, backs up the current file to
    /// `<hosts>.bak` and replaces it atomically. Returns the rendered
    /// contents.
    pub fn update<R: Registry + ?Sized>(&self, registry: &R, dry_run: bool) -> Result<String> {
        if !dry_run {
            self.run_legacy_updater()?;
        }
        let records = registry.snapshot()?;
        let legacy = read_optional(&self.legacy_path)?;
        let contents = compose(&legacy, &records);
        if dry_run {
            debug!("dry run, hosts file would be:\n{contents}");
            return Ok(contents);
        }

        if self.hosts_path.exists() {
            std::fs::copy(&self.hosts_path, self.hosts_path.with_extension("bak"))?;
        }
        let tmp = self.hosts_path.with_extension("tmp");
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp, &self.hosts_path)?;
        info!(
            "wrote {} with {} registry records",
            self.hosts_path.display(),
            records.len()
        );
        Ok(contents)
    }

    fn run_legacy_updater(&self) -> Result<()> {
        let Some(program) = &self.legacy_updater else {
            return Ok(());
        };
        debug!("running legacy hosts updater {}", program.display());
        let status = Command::new(program).status()?;
        if !status.success() {
            error!("legacy hosts updater {} failed: {status}", program.display());
            return Err(Error::LegacyUpdater {
                program: program.display().to_string(),
                status,
            });
        }
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(err.into()),
    }
}
