//! Orchestrator tests against in-memory fakes.
//!
//! Each test runs a full plan through `guard`, so teardown is exercised
//! exactly as in production.

#![allow(clippy::expect_used)]

use std::path::PathBuf;
use std::time::Duration;

use rds_validator::application::interrupt::{Termination, guard};
use rds_validator::application::ledger::Ledger;
use rds_validator::application::poller::PollPolicy;
use rds_validator::application::ports::OperatorGate;
use rds_validator::application::services::provision::{Collaborators, Orchestrator};
use rds_validator::application::services::release::CloudReleaser;
use rds_validator::domain::exit::{
    EXIT_CLEANUP_INCOMPLETE, EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_OK,
};
use rds_validator::domain::{
    BastionRequest, ExistingProxy, ProvisionError, ProvisioningPlan, ProxyMode, RestoreSource,
    RunOutcome, Settings,
};
use tokio_util::sync::CancellationToken;

use crate::mocks::{
    CallLog, FakeCloud, FakeScripts, FakeSignals, FakeTunnels, ImmediateGate, SignallingGate,
    SilentReporter, snapshot,
};

pub struct Harness {
    pub log: CallLog,
    pub cloud: FakeCloud,
    pub scripts: FakeScripts,
    pub tunnels: FakeTunnels,
    pub reporter: SilentReporter,
    pub settings: Settings,
}

impl Harness {
    pub fn new() -> Self {
        let log = CallLog::default();
        Self {
            cloud: FakeCloud::new(&log),
            scripts: FakeScripts::new(&log),
            tunnels: FakeTunnels::new(&log),
            reporter: SilentReporter::default(),
            settings: Settings::default(),
            log,
        }
    }

    pub async fn run(
        &self,
        plan: &ProvisioningPlan,
        signals: FakeSignals,
        gate: &impl OperatorGate,
    ) -> Termination {
        let ledger = Ledger::new(CloudReleaser::new(
            &self.cloud,
            &self.tunnels,
            &self.reporter,
            PollPolicy::every(Duration::from_secs(1)),
        ));
        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(
            plan,
            &self.settings,
            Collaborators {
                cloud: &self.cloud,
                scripts: &self.scripts,
                tunnels: &self.tunnels,
                reporter: &self.reporter,
            },
            cancel.clone(),
        );
        let termination =
            guard(&ledger, &cancel, signals, orchestrator.run(&ledger, gate)).await;
        assert!(ledger.is_empty().await, "ledger must be empty after a run");
        termination
    }
}

pub fn plan(restore: RestoreSource, proxy: ProxyMode) -> ProvisioningPlan {
    ProvisioningPlan {
        restore,
        instance_class: "db.t3.medium".to_string(),
        proxy,
        pre_scripts: None,
        post_scripts: None,
        local_port: None,
        hold: false,
    }
}

pub fn bastion() -> ProxyMode {
    ProxyMode::Ephemeral(BastionRequest {
        vpc_id: "vpc-1".to_string(),
        subnet_id: "subnet-1".to_string(),
        ingress_cidr: "198.51.100.0/24".to_string(),
        user: "ubuntu".to_string(),
    })
}

fn instance() -> RestoreSource {
    RestoreSource::Instance("db-1".to_string())
}

pub fn before(log: &CallLog, first: &str, second: &str) -> bool {
    match (log.position(first), log.position(second)) {
        (Some(a), Some(b)) => a < b,
        _ => false,
    }
}

// ── Happy paths ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_restores_most_recent_snapshot_regardless_of_order() {
    let mut h = Harness::new();
    h.cloud.snapshots = vec![
        snapshot("snap-jan", "db-1", 1, "available"),
        snapshot("snap-mar", "db-1", 3, "available"),
        snapshot("snap-feb", "db-1", 2, "available"),
        snapshot("snap-apr", "db-1", 4, "creating"),
    ];

    let t = h.run(&plan(instance(), ProxyMode::Direct), FakeSignals::never(), &ImmediateGate).await;

    assert_eq!(t.outcome, RunOutcome::Completed);
    assert_eq!(t.exit_code(), EXIT_OK);
    assert_eq!(h.log.count("restore_instance"), 1);
    assert!(h.log.contains("restore_instance arn:aws:rds:snapshot:snap-mar"));
    assert!(h.log.contains("delete_db_instance db-1-"));
}

#[tokio::test(start_paused = true)]
async fn test_bastion_run_tears_down_in_reverse_order() {
    let mut h = Harness::new();
    h.cloud.pending = 2;
    let mut p = plan(instance(), bastion());
    p.post_scripts = Some(PathBuf::from("/post"));
    h.scripts.dirs.insert(PathBuf::from("/post"), vec!["10-check.sh"]);

    let t = h.run(&p, FakeSignals::never(), &ImmediateGate).await;

    assert_eq!(t.exit_code(), EXIT_OK, "{:?}", t.error);
    assert_eq!(t.report.released.len(), 5);
    assert!(h.log.contains("run_instance ami-new"));
    assert!(h.log.contains("authorize_ingress sg-1 198.51.100.0/24 22"));
    assert!(h.log.contains("launch 15432:db.internal:5432 via 203.0.113.10"));
    // Acquisition order
    assert!(before(&h.log, "create_keypair", "create_rule"));
    assert!(before(&h.log, "create_rule", "run_instance"));
    assert!(before(&h.log, "run_instance", "restore_instance"));
    assert!(before(&h.log, "restore_instance", "launch"));
    assert!(before(&h.log, "launch", "script 10-check.sh"));
    // Release order is the reverse
    assert!(before(&h.log, "terminate 4242", "delete_db_instance"));
    assert!(before(&h.log, "delete_db_instance", "terminate_instance i-1"));
    assert!(before(&h.log, "terminate_instance", "delete_rule sg-1"));
    assert!(before(&h.log, "delete_rule", "delete_keypair key-1"));
}

#[tokio::test(start_paused = true)]
async fn test_cluster_restore_releases_instance_before_cluster() {
    let h = Harness::new();
    let p = plan(RestoreSource::Cluster("c-1".to_string()), ProxyMode::Direct);

    let t = h.run(&p, FakeSignals::never(), &ImmediateGate).await;

    assert_eq!(t.exit_code(), EXIT_OK, "{:?}", t.error);
    assert!(h.log.contains("list_cluster_snapshots c-1"));
    assert!(before(&h.log, "restore_cluster", "create_cluster_instance"));
    assert!(before(&h.log, "delete_db_instance", "delete_cluster"));
    // The member is confirmed gone before its cluster is deleted.
    let deleted = h.log.position("delete_db_instance").expect("deleted");
    let entries = h.log.entries();
    let confirm = entries
        .iter()
        .skip(deleted)
        .position(|e| e.starts_with("describe_db_instance"));
    let cluster_deleted = h.log.position("delete_cluster").expect("cluster deleted");
    assert!(confirm.is_some_and(|offset| deleted + offset < cluster_deleted));
}

#[tokio::test(start_paused = true)]
async fn test_scripts_receive_tunnel_bindings() {
    let mut h = Harness::new();
    let mut p = plan(
        instance(),
        ProxyMode::Existing(ExistingProxy {
            host: "jump.example".to_string(),
            key_path: PathBuf::from("/keys/jump.pem"),
            user: "ec2-user".to_string(),
        }),
    );
    p.pre_scripts = Some(PathBuf::from("/pre"));
    p.post_scripts = Some(PathBuf::from("/post"));
    h.scripts.dirs.insert(PathBuf::from("/pre"), vec!["prepare.sh"]);
    h.scripts.dirs.insert(PathBuf::from("/post"), vec!["check.sh"]);
    h.tunnels.unreachable_probes = 3;

    let t = h.run(&p, FakeSignals::never(), &ImmediateGate).await;

    assert_eq!(t.exit_code(), EXIT_OK, "{:?}", t.error);
    assert!(h.scripts.env_of("prepare.sh").is_empty());
    let env = h.scripts.env_of("check.sh");
    let get = |k: &str| env.iter().find(|(key, _)| key == k).map(|(_, v)| v.clone());
    assert_eq!(get("DB_HOST").as_deref(), Some("localhost"));
    assert_eq!(get("DB_PORT").as_deref(), Some("15432"));
    assert_eq!(get("DB_USER").as_deref(), Some("admin"));
    assert_eq!(h.log.count("probe ec2-user@jump.example"), 4);
    assert!(before(&h.log, "script prepare.sh", "restore_instance"));
}

#[tokio::test(start_paused = true)]
async fn test_explicit_local_port_wins() {
    let mut h = Harness::new();
    h.settings.database.port_offset = 1;
    let mut p = plan(instance(), bastion());
    p.local_port = Some(6000);

    let t = h.run(&p, FakeSignals::never(), &ImmediateGate).await;

    assert_eq!(t.exit_code(), EXIT_OK, "{:?}", t.error);
    assert!(h.log.contains("launch 6000:db.internal:5432"));
}

// ── Failures ──────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_failed_restore_unwinds_bastion() {
    let mut h = Harness::new();
    h.cloud.db_status = Some("incompatible-restore".to_string());

    let t = h.run(&plan(instance(), bastion()), FakeSignals::never(), &ImmediateGate).await;

    assert_eq!(t.outcome, RunOutcome::Failed);
    assert_eq!(t.exit_code(), EXIT_FAILURE);
    let error = t.error.expect("error");
    assert!(format!("{error:#}").contains("incompatible-restore"));
    // The unconfirmed database is discarded, the bastion unwound.
    assert!(h.log.contains("delete_db_instance"));
    assert!(h.log.contains("terminate_instance i-1"));
    assert!(h.log.contains("delete_rule sg-1"));
    assert!(h.log.contains("delete_keypair key-1"));
    assert!(!h.log.contains("launch"));
}

#[tokio::test(start_paused = true)]
async fn test_no_snapshots_fails_before_creating_anything() {
    let mut h = Harness::new();
    h.cloud.snapshots = vec![snapshot("snap-1", "db-1", 1, "creating")];

    let t = h.run(&plan(instance(), ProxyMode::Direct), FakeSignals::never(), &ImmediateGate).await;

    assert_eq!(t.exit_code(), EXIT_FAILURE);
    let error = t.error.expect("error");
    assert!(matches!(
        error.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::NoSnapshots { .. })
    ));
    assert!(!h.log.contains("restore_instance"));
    assert!(t.report.released.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_release_failure_does_not_stop_teardown() {
    let mut h = Harness::new();
    h.cloud.failing.insert("delete_rule");

    let t = h.run(&plan(instance(), bastion()), FakeSignals::never(), &ImmediateGate).await;

    assert_eq!(t.outcome, RunOutcome::Completed);
    assert_eq!(t.exit_code(), EXIT_CLEANUP_INCOMPLETE);
    assert_eq!(t.report.failed.len(), 1);
    assert!(t.report.failed[0].error.contains("delete_rule failed"));
    assert!(h.log.contains("delete_keypair key-1"));
}

#[tokio::test(start_paused = true)]
async fn test_script_failure_skips_remaining_scripts() {
    let mut h = Harness::new();
    let mut p = plan(instance(), ProxyMode::Direct);
    p.post_scripts = Some(PathBuf::from("/post"));
    h.scripts
        .dirs
        .insert(PathBuf::from("/post"), vec!["a.sh", "b.sh", "c.sh"]);
    h.scripts.exit_codes.insert("b.sh", 2);

    let t = h.run(&p, FakeSignals::never(), &ImmediateGate).await;

    assert_eq!(t.exit_code(), EXIT_FAILURE);
    let error = t.error.expect("error");
    assert!(matches!(
        error.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::ScriptFailed { code: Some(2), .. })
    ));
    assert!(h.log.contains("script a.sh"));
    assert!(!h.log.contains("script c.sh"));
    assert!(h.log.contains("delete_db_instance"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_script_directory_fails_run() {
    let h = Harness::new();
    let mut p = plan(instance(), ProxyMode::Direct);
    p.pre_scripts = Some(PathBuf::from("/missing"));

    let t = h.run(&p, FakeSignals::never(), &ImmediateGate).await;

    assert_eq!(t.exit_code(), EXIT_FAILURE);
    assert!(!h.log.contains("list_instance_snapshots"));
}

#[tokio::test(start_paused = true)]
async fn test_poll_timeout_discards_unconfirmed_resource() {
    let mut h = Harness::new();
    h.cloud.pending = 100;
    h.settings.poll.timeout_secs = Some(10);

    let t = h.run(&plan(instance(), ProxyMode::Direct), FakeSignals::never(), &ImmediateGate).await;

    assert_eq!(t.exit_code(), EXIT_FAILURE);
    let error = t.error.expect("error");
    assert!(matches!(
        error.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::TimedOut { .. })
    ));
    assert!(h.log.contains("delete_db_instance"));
}

// ── Steady state ──────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_interrupt_while_holding_tears_down() {
    let h = Harness::new();
    let mut p = plan(instance(), ProxyMode::Direct);
    p.hold = true;
    let fire = CancellationToken::new();

    let t = h.run(&p, FakeSignals::new(&fire), &SignallingGate(fire.clone())).await;

    assert_eq!(t.outcome, RunOutcome::Interrupted);
    assert_eq!(t.exit_code(), EXIT_INTERRUPTED);
    assert_eq!(h.log.count("delete_db_instance"), 1);
}
