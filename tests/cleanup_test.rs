// tests/cleanup_test.rs
use chrono::{Duration, Utc};
use release_helper::analyzer::RetentionPolicy;
use release_helper::boundary::BoundaryWarning;
use release_helper::config::RegistryConfig;
use release_helper::domain::{CleanupPhase, PackageVersionRef};
use release_helper::git::MockRepository;
use release_helper::hosting::{MockRegistry, MockReleaseHost};
use release_helper::orchestrator::{CleanupOrchestrator, CleanupPlanner};

const APP: &str = "demo-hello_python";
const VERSIONS: [&str; 5] = ["v1.0.0", "v1.1.0", "v1.1.1", "v1.2.0", "v2.0.0"];

fn tag(version: &str) -> String {
    format!("{}.{}", APP, version)
}

struct Fixture {
    repo: MockRepository,
    host: MockReleaseHost,
    registry: MockRegistry,
    registry_config: RegistryConfig,
}

fn fixture() -> Fixture {
    let old = Utc::now() - Duration::days(30);
    let repo = MockRepository::new();
    let host = MockReleaseHost::new();
    let registry = MockRegistry::new();

    for version in VERSIONS {
        repo.add_tag(tag(version), format!("sha-{}", version), old);
        host.add_release(&format!("r-{}", version), &tag(version));
    }
    repo.add_tag("payments-ledger.v1.0.0", "sha-ledger", old);
    repo.add_tag("demo-broken.v1", "sha-broken", old);
    repo.add_tag("nightly", "sha-nightly", old);

    registry.add_version(APP, "p100", &["v1.0.0"], old);
    registry.add_version(APP, "p110", &["1.1.0"], old);
    registry.add_version(APP, "p111", &["v1.1.1", "latest"], old);
    registry.add_version(APP, "p120", &["v1.2.0"], old);
    registry.add_version(APP, "p200", &["v2.0.0"], old);

    Fixture {
        repo,
        host,
        registry,
        registry_config: RegistryConfig::default(),
    }
}

fn planner(f: &Fixture) -> CleanupPlanner<'_, MockRepository, MockReleaseHost, MockRegistry> {
    CleanupPlanner::new(
        &f.repo,
        &f.host,
        &f.registry,
        &f.registry_config,
        RetentionPolicy::new(2, 0),
    )
}

fn orchestrator(f: &Fixture) -> CleanupOrchestrator<'_, MockRepository, MockReleaseHost, MockRegistry> {
    CleanupOrchestrator::new(&f.repo, &f.host, &f.registry, "origin")
}

#[test]
fn test_plan_resolves_identifiers() {
    let f = fixture();
    let plan = planner(&f).plan("demo", Utc::now()).unwrap();
    let decision = &plan.decision;

    assert_eq!(decision.domain, "demo");
    assert_eq!(decision.keep, vec![tag("v2.0.0"), tag("v1.2.0")]);
    assert_eq!(
        decision.delete,
        vec![tag("v1.1.1"), tag("v1.1.0"), tag("v1.0.0")]
    );
    assert_eq!(decision.releases.len(), 3);
    assert_eq!(decision.releases[&tag("v1.0.0")], "r-v1.0.0");

    assert_eq!(
        decision.packages[&tag("v1.1.0")],
        vec![PackageVersionRef {
            package: APP.to_string(),
            id: "p110".to_string()
        }]
    );
    // p111 also carries `latest`
    assert!(!decision.packages.contains_key(&tag("v1.1.1")));
    assert!(decision.lookup_errors.is_empty());

    assert_eq!(plan.warnings.len(), 1);
    assert!(matches!(
        &plan.warnings[0],
        BoundaryWarning::UnparsableTag { tag, .. } if tag == "demo-broken.v1"
    ));
}

#[test]
fn test_registry_listing_is_cached() {
    let f = fixture();
    planner(&f).plan("demo", Utc::now()).unwrap();
    assert_eq!(f.registry.list_calls(), 1);
}

#[test]
fn test_execute_deletes_in_all_backends() {
    let f = fixture();
    let plan = planner(&f).plan("demo", Utc::now()).unwrap();
    let result = orchestrator(&f).execute(&plan.decision, false);

    assert!(result.success());
    assert_eq!(result.deleted_releases.len(), 3);
    assert_eq!(result.deleted_tags.len(), 3);
    assert_eq!(
        result.deleted_packages,
        vec!["demo-hello_python@p100", "demo-hello_python@p110"]
    );

    assert_eq!(f.host.release_tags(), vec![tag("v1.2.0"), tag("v2.0.0")]);
    let remote = f.repo.remote_tags();
    assert!(!remote.contains(&tag("v1.0.0")));
    assert!(remote.contains(&tag("v1.2.0")));
    assert!(!f.repo.local_tags().contains(&tag("v1.1.1")));
    assert_eq!(f.registry.version_ids(APP), vec!["p111", "p120", "p200"]);
}

#[test]
fn test_failures_do_not_stop_other_deletions() {
    let f = fixture();
    f.host.fail_delete("r-v1.1.0");
    f.repo.fail_remote_delete(&tag("v1.0.0"));
    f.registry.fail_delete("p100");

    let plan = planner(&f).plan("demo", Utc::now()).unwrap();
    let result = orchestrator(&f).execute(&plan.decision, false);

    assert!(!result.success());
    assert_eq!(result.errors.len(), 3);
    assert_eq!(result.errors[0].phase, CleanupPhase::Release);
    assert_eq!(result.errors[1].phase, CleanupPhase::Tag);
    assert_eq!(result.errors[1].item, tag("v1.0.0"));
    assert_eq!(result.errors[2].phase, CleanupPhase::Package);

    assert_eq!(result.deleted_releases, vec![tag("v1.0.0"), tag("v1.1.1")]);
    assert_eq!(result.deleted_tags, vec![tag("v1.1.1"), tag("v1.1.0")]);
    assert_eq!(result.deleted_packages, vec!["demo-hello_python@p110"]);

    assert!(f.repo.remote_tags().contains(&tag("v1.0.0")));
    assert!(f.host.release_tags().contains(&tag("v1.1.0")));
}

#[test]
fn test_dry_run_mutates_nothing() {
    let f = fixture();
    let plan = planner(&f).plan("demo", Utc::now()).unwrap();
    let result = orchestrator(&f).execute(&plan.decision, true);

    assert!(result.dry_run);
    assert!(result.success());
    assert_eq!(result.deleted_count(), 3 + 3 + 2);
    assert_eq!(f.host.release_tags().len(), 5);
    assert_eq!(f.registry.version_ids(APP).len(), 5);
    assert!(f.repo.remote_tags().contains(&tag("v1.0.0")));
}

#[test]
fn test_lookup_failures_are_reported_not_fatal() {
    let f = fixture();
    f.registry.fail_list(APP);
    f.repo.fail_tag_date(&tag("v1.0.0"));

    let plan = planner(&f).plan("demo", Utc::now()).unwrap();
    let decision = &plan.decision;

    // undated tags are kept
    assert!(decision.keep.contains(&tag("v1.0.0")));
    assert!(decision.packages.is_empty());
    assert_eq!(decision.lookup_errors.len(), 2);
    assert!(decision
        .lookup_errors
        .iter()
        .all(|e| e.phase == CleanupPhase::Lookup));

    let result = orchestrator(&f).execute(decision, false);
    assert_eq!(result.deleted_tags, vec![tag("v1.1.1"), tag("v1.1.0")]);
    assert!(!result.success());
}

#[test]
fn test_other_domains_untouched() {
    let f = fixture();
    let plan = planner(&f).plan("payments", Utc::now()).unwrap();
    assert_eq!(plan.decision.keep, vec!["payments-ledger.v1.0.0"]);
    assert!(plan.decision.delete.is_empty());
    assert!(plan.warnings.is_empty());
}

#[test]
fn test_shared_registry_version_deleted_once() {
    let old = Utc::now() - Duration::days(30);
    let repo = MockRepository::new();
    let host = MockReleaseHost::new();
    let registry = MockRegistry::new();
    for version in ["v1.0.0", "v1.0.1", "v1.1.0", "v1.2.0"] {
        repo.add_tag(format!("demo-web.{}", version), format!("sha-{}", version), old);
    }
    // a rebuild of the same image tagged for two patch releases
    registry.add_version("demo-web", "p10", &["v1.0.0", "v1.0.1"], old);
    registry.add_version("demo-web", "p12", &["v1.2.0"], old);

    let registry_config = RegistryConfig::default();
    let planner = CleanupPlanner::new(
        &repo,
        &host,
        &registry,
        &registry_config,
        RetentionPolicy::new(2, 0),
    );
    let plan = planner.plan("demo", Utc::now()).unwrap();
    assert_eq!(
        plan.decision.delete,
        vec!["demo-web.v1.0.1", "demo-web.v1.0.0"]
    );
    let scheduled: Vec<&PackageVersionRef> = plan.decision.packages.values().flatten().collect();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].id, "p10");

    let result = CleanupOrchestrator::new(&repo, &host, &registry, "origin")
        .execute(&plan.decision, false);
    assert!(result.success(), "{:?}", result.errors);
    assert_eq!(result.deleted_packages, vec!["demo-web@p10"]);
    assert_eq!(registry.version_ids("demo-web"), vec!["p12"]);
}
