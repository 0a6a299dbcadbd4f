//! Stable hostnames for ephemeral cloud instances.
//!
//! Instances register themselves in a shared naming registry at boot and get
//! a predictable name for their service: `<service>-master` and
//! `<service>-slave-<n>` for masterful services, `<service>-<n>` for
//! iterative ones. Vacated names are reused before new ones are minted.

pub mod allocator;
pub mod config;
pub mod election;
pub mod error;
pub mod guard;
pub mod hostinfo;
pub mod hostname;
pub mod hosts;
pub mod identity;
pub mod reconcile;
pub mod record;
pub mod registrar;
pub mod registry;

pub use allocator::{Allocation, NameAllocator};
pub use election::MasterElection;
pub use error::{Error, Result};
pub use guard::{Binding, DuplicateGuard};
pub use record::{master_hostname, HostRecord, ServiceType};
pub use registrar::{Registrar, Registration, SlotKey};
pub use registry::{FileRegistry, Filter, MemoryRegistry, Patch, Registry};
