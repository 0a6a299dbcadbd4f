//! Clearing bindings of instances that left the fleet.
//!
//! A stale record keeps its hostname and service so the slot can be
//! gap-filled; only `instance_id` and `ip` are cleared.

use std::collections::BTreeSet;
use std::io::BufRead;
use std::path::Path;

use log::{info, warn};

use crate::error::Result;
use crate::registry::{Filter, Patch, Registry};

/// Registry instance ids that are not in `live`. Vacant records are ignored.
pub fn stale_instances<'r, I>(registered: I, live: &BTreeSet<String>) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'r str>,
{
    registered
        .into_iter()
        .filter(|id| !id.is_empty() && !live.contains(*id))
        .map(str::to_string)
        .collect()
}

/// One instance id per line; blank lines and `#` comments are skipped.
pub fn read_live_ids(path: &Path) -> Result<BTreeSet<String>> {
    let file = std::fs::File::open(path)?;
    let mut ids = BTreeSet::new();
    for line in std::io::BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        ids.insert(line.to_string());
    }
    Ok(ids)
}

pub struct Reconciler<'a, R: Registry + ?Sized> {
    registry: &'a R,
}

impl<'a, R: Registry + ?Sized> Reconciler<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self { registry }
    }

    pub fn stale(&self, live: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        let records = self.registry.snapshot()?;
        Ok(stale_instances(
            records.iter().map(|r| r.instance_id.as_str()),
            live,
        ))
    }

    /// Returns the number of records vacated.
    pub fn vacate(&self, instance_ids: &BTreeSet<String>) -> Result<usize> {
        let mut vacated = 0;
        for id in instance_ids.iter().filter(|id| !id.is_empty()) {
            vacated += self.registry.update(
                &Filter::all().instance_id(id),
                &Patch::new().instance_id("").ip(""),
            )?;
        }
        Ok(vacated)
    }

    /// Vacates every binding whose instance is not live. An empty live set is
    /// treated as a failed fleet listing and changes nothing.
    pub fn run(&self, live: &BTreeSet<String>) -> Result<usize> {
        if live.is_empty() {
            warn!("live instance list is empty, skipping reconciliation");
            return Ok(0);
        }
        let stale = self.stale(live)?;
        if stale.is_empty() {
            return Ok(0);
        }
        let vacated = self.vacate(&stale)?;
        info!("vacated {vacated} records for departed instances {stale:?}");
        Ok(vacated)
    }
}
