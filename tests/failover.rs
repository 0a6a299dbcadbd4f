mod common;

use common::{bound, hostname_of, vacant, RecordingHostname};
use fleetname::allocator::pick_name;
use fleetname::{
    Error, Filter, MasterElection, MemoryRegistry, Patch, Registrar, Registry, ServiceType,
};

#[test]
fn master_moves_to_caller_and_old_master_gets_slave_name() {
    let registry = MemoryRegistry::with_records(vec![
        bound("svc-master", "i-10", "svc", ServiceType::Masterful),
        bound("svc-slave-1", "i-11", "svc", ServiceType::Masterful),
    ]);
    let election = MasterElection::new(&registry);

    assert!(election
        .step_up("svc", ServiceType::Masterful, "i-11")
        .expect("step up"));

    assert_eq!(election.current_master("svc").expect("master").as_deref(), Some("i-11"));
    assert!(election.is_master("svc", "i-11").expect("is master"));
    let old = hostname_of(&registry, "i-10").expect("old master record");
    assert_eq!(old, "svc-slave-1");
    assert_eq!(registry.count(&Filter::all().hostname("svc-master")).expect("count"), 1);
}

#[test]
fn displaced_master_gets_what_a_fresh_allocation_would() {
    let registry = MemoryRegistry::with_records(vec![
        bound("svc-master", "i-10", "svc", ServiceType::Masterful),
        bound("svc-slave-1", "i-11", "svc", ServiceType::Masterful),
        bound("svc-slave-2", "i-12", "svc", ServiceType::Masterful),
    ]);

    // State right after the master slot swap.
    let swapped = MemoryRegistry::with_records(registry.snapshot().expect("snapshot"));
    swapped
        .update(&Filter::all().instance_id("i-10"), &Patch::new().hostname(""))
        .expect("clear old");
    swapped
        .update(&Filter::all().instance_id("i-11"), &Patch::new().hostname("svc-master"))
        .expect("promote");
    let (expected, _) = pick_name(
        &swapped.find(&Filter::all().service("svc")).expect("find"),
        "svc",
        ServiceType::Masterful,
    );

    MasterElection::new(&registry)
        .step_up("svc", ServiceType::Masterful, "i-11")
        .expect("step up");

    assert_eq!(hostname_of(&registry, "i-10"), Some(expected.clone()));
    assert_eq!(expected, "svc-slave-3");
    assert_eq!(hostname_of(&registry, "i-11").as_deref(), Some("svc-master"));
    assert_eq!(hostname_of(&registry, "i-12").as_deref(), Some("svc-slave-2"));
}

#[test]
fn displaced_master_fills_a_vacant_slot() {
    let registry = MemoryRegistry::with_records(vec![
        bound("svc-master", "i-10", "svc", ServiceType::Masterful),
        bound("svc-slave-1", "i-11", "svc", ServiceType::Masterful),
        vacant("svc-slave-2", "svc", ServiceType::Masterful),
    ]);

    MasterElection::new(&registry)
        .step_up("svc", ServiceType::Masterful, "i-11")
        .expect("step up");

    assert_eq!(hostname_of(&registry, "i-10").as_deref(), Some("svc-slave-2"));
    assert_eq!(registry.count(&Filter::all().instance_id("i-10")).expect("count"), 1);
    // The old master's nameless record is gone, not left behind empty.
    assert_eq!(registry.count(&Filter::all().hostname("")).expect("count"), 0);
    assert_eq!(registry.count(&Filter::all()).expect("count"), 3);
    let moved = registry
        .find_one(&Filter::all().hostname("svc-slave-2"))
        .expect("find")
        .expect("slave-2");
    assert_eq!(moved.ip, "10.0.0.1");
}

#[test]
fn stepping_up_when_already_master_is_a_noop() {
    let registry = MemoryRegistry::with_records(vec![
        bound("svc-master", "i-10", "svc", ServiceType::Masterful),
        bound("svc-slave-1", "i-11", "svc", ServiceType::Masterful),
    ]);
    let before = registry.snapshot().expect("snapshot");
    let changed = MasterElection::new(&registry)
        .step_up("svc", ServiceType::Masterful, "i-10")
        .expect("step up");
    assert!(!changed);
    assert_eq!(registry.snapshot().expect("snapshot"), before);
}

#[test]
fn iterative_services_have_no_master() {
    let registry = MemoryRegistry::with_records(vec![
        bound("jobs-0", "i-1", "jobs", ServiceType::Iterative),
    ]);
    let changed = MasterElection::new(&registry)
        .step_up("jobs", ServiceType::Iterative, "i-1")
        .expect("step up");
    assert!(!changed);
    assert_eq!(hostname_of(&registry, "i-1").as_deref(), Some("jobs-0"));
}

#[test]
fn duplicate_master_records_abort() {
    let registry = MemoryRegistry::with_records(vec![
        bound("svc-master", "i-10", "svc", ServiceType::Masterful),
        bound("svc-master", "i-12", "svc", ServiceType::Masterful),
        bound("svc-slave-1", "i-11", "svc", ServiceType::Masterful),
    ]);
    let before = registry.snapshot().expect("snapshot");
    let election = MasterElection::new(&registry);

    let err = election.current_master("svc").unwrap_err();
    assert!(matches!(err, Error::Inconsistency { count: 2, .. }));
    let err = election
        .step_up("svc", ServiceType::Masterful, "i-11")
        .unwrap_err();
    assert!(matches!(err, Error::Inconsistency { .. }));
    assert_eq!(registry.snapshot().expect("snapshot"), before);
}

#[test]
fn vacant_master_slot_is_taken_without_duplicating_the_name() {
    let registry = MemoryRegistry::with_records(vec![
        vacant("svc-master", "svc", ServiceType::Masterful),
        bound("svc-slave-1", "i-11", "svc", ServiceType::Masterful),
    ]);
    let election = MasterElection::new(&registry);
    assert_eq!(election.current_master("svc").expect("master"), None);

    assert!(election
        .step_up("svc", ServiceType::Masterful, "i-11")
        .expect("step up"));
    assert_eq!(election.current_master("svc").expect("master").as_deref(), Some("i-11"));
    assert_eq!(registry.count(&Filter::all().hostname("svc-master")).expect("count"), 1);
    assert_eq!(registry.count(&Filter::all().hostname("")).expect("count"), 0);
    assert_eq!(registry.count(&Filter::all()).expect("count"), 1);
}

#[test]
fn unregistered_caller_cannot_step_up() {
    let registry = MemoryRegistry::with_records(vec![
        bound("svc-master", "i-10", "svc", ServiceType::Masterful),
    ]);
    let before = registry.snapshot().expect("snapshot");
    let err = MasterElection::new(&registry)
        .step_up("svc", ServiceType::Masterful, "i-99")
        .unwrap_err();
    assert!(matches!(err, Error::NotRegistered(ref id) if id == "i-99"));
    assert_eq!(registry.snapshot().expect("snapshot"), before);
}

#[test]
fn failover_after_register_through_registrar() {
    let registry = MemoryRegistry::new();
    let local = RecordingHostname::default();
    let registrar = Registrar::new(&registry, &local);
    for (id, ip) in [("i-10", "10.0.0.10"), ("i-11", "10.0.0.11")] {
        registrar
            .register("svc", ServiceType::Masterful, id, ip, Vec::<String>::new())
            .expect("register");
    }

    assert!(registrar
        .request_master_failover("svc", ServiceType::Masterful, "i-11")
        .expect("failover"));

    assert_eq!(hostname_of(&registry, "i-11").as_deref(), Some("svc-master"));
    assert_eq!(hostname_of(&registry, "i-10").as_deref(), Some("svc-slave-1"));
    let old = registry
        .find_one(&Filter::all().instance_id("i-10"))
        .expect("find")
        .expect("i-10");
    assert_eq!(old.ip, "10.0.0.10");
    // Failover only rewrites the registry; local names follow on next boot.
    assert_eq!(*local.applied.borrow(), vec!["svc-master", "svc-slave-1"]);
}
