mod common;

use std::collections::BTreeSet;
use std::thread;

use common::{bound, RecordingHostname};
use fleetname::{
    Error, FileRegistry, Filter, Patch, Registrar, Registration, Registry, ServiceType,
};
use tempfile::tempdir;

#[test]
fn records_survive_reopen() {
    let dir = tempdir().expect("tempdir");
    let registry = FileRegistry::open(dir.path()).expect("open");
    registry
        .insert(bound("web-0", "i-1", "web", ServiceType::Iterative).with_aliases(["www"]))
        .expect("insert");
    drop(registry);

    let reopened = FileRegistry::open(dir.path()).expect("reopen");
    let records = reopened.snapshot().expect("snapshot");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].hostname, "web-0");
    assert!(records[0].aliases.contains("www"));
    assert!(reopened.data_path().exists());
}

#[test]
fn hostname_index_rejects_second_holder() {
    let dir = tempdir().expect("tempdir");
    let registry = FileRegistry::open(dir.path()).expect("open");
    registry
        .insert(bound("web-0", "i-1", "web", ServiceType::Iterative))
        .expect("insert");

    let err = registry
        .insert(bound("web-0", "i-2", "web", ServiceType::Iterative))
        .unwrap_err();
    assert!(matches!(err, Error::HostnameTaken(ref name) if name == "web-0"));
    assert_eq!(registry.count(&Filter::all()).expect("count"), 1);
}

#[test]
fn conditional_update_reports_matches() {
    let dir = tempdir().expect("tempdir");
    let registry = FileRegistry::open(dir.path()).expect("open");
    registry
        .insert(bound("web-0", "", "web", ServiceType::Iterative))
        .expect("insert");

    let claim = Patch::new().instance_id("i-1");
    let expected = Filter::all().hostname("web-0").instance_id("");
    assert_eq!(registry.update(&expected, &claim).expect("first claim"), 1);
    assert_eq!(
        registry
            .update(&expected, &Patch::new().instance_id("i-2"))
            .expect("second claim"),
        0
    );
    let record = registry
        .find_one(&Filter::all().hostname("web-0"))
        .expect("find")
        .expect("web-0");
    assert_eq!(record.instance_id, "i-1");
}

#[test]
fn unknown_format_version_is_rejected() {
    let dir = tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("registry.json"),
        br#"{"version": 99, "records": []}"#,
    )
    .expect("write");
    let registry = FileRegistry::open(dir.path()).expect("open");
    let err = registry.snapshot().unwrap_err();
    assert!(matches!(err, Error::UnsupportedVersion(99)));
}

#[test]
fn concurrent_boots_get_distinct_names() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().to_path_buf();
    let instances = 8;

    let handles: Vec<_> = (0..instances)
        .map(|n| {
            let path = path.clone();
            thread::spawn(move || {
                let registry = FileRegistry::open(&path).expect("open");
                let local = RecordingHostname::default();
                let outcome = Registrar::new(&registry, &local)
                    .with_max_attempts(instances + 1)
                    .register(
                        "jobs",
                        ServiceType::Iterative,
                        &format!("i-{n}"),
                        &format!("10.0.0.{n}"),
                        Vec::<String>::new(),
                    )
                    .expect("register");
                match outcome {
                    Registration::Registered { hostname } => hostname,
                    Registration::Refused => panic!("i-{n} refused"),
                }
            })
        })
        .collect();

    let names: BTreeSet<String> = handles
        .into_iter()
        .map(|h| h.join().expect("join"))
        .collect();
    let expected: BTreeSet<String> = (0..instances).map(|n| format!("jobs-{n}")).collect();
    assert_eq!(names, expected);

    let registry = FileRegistry::open(&path).expect("open");
    assert_eq!(registry.count(&Filter::all()).expect("count"), instances);
}
