//! End-to-end runs against a scripted `aws` stand-in.

#![allow(clippy::expect_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use crate::cli_tests::rdsvalidator;

const FAKE_AWS: &str = r#"#!/bin/sh
echo "$*" >> "$FAKE_AWS_LOG"
if [ -n "$FAKE_AWS_FAIL" ] && [ "$2" = "$FAKE_AWS_FAIL" ]; then
  echo "An error occurred (InvalidParameterCombination) when calling the Fake operation: refused" >&2
  exit 254
fi
case "$2" in
  describe-db-clusters)
    echo '{"DBClusters":[{"DBClusterIdentifier":"orders","Status":"available","DBClusterMembers":[{"DBInstanceIdentifier":"orders-1","IsClusterWriter":true}]}]}'
    ;;
  describe-db-instances)
    echo '{"DBInstances":[{"DBInstanceIdentifier":"billing","DBInstanceStatus":"available","Engine":"postgres","DBName":"app","MasterUsername":"admin","Endpoint":{"Address":"billing.rds.example","Port":5432}},{"DBInstanceIdentifier":"orders-1","DBInstanceStatus":"available","DBClusterIdentifier":"orders"}]}'
    ;;
  describe-db-snapshots)
    if [ -n "$FAKE_AWS_NO_SNAPSHOTS" ]; then
      echo '{"DBSnapshots":[]}'
    else
      echo '{"DBSnapshots":[{"DBSnapshotIdentifier":"nightly","DBSnapshotArn":"arn:aws:rds:eu-west-1:1:snapshot:nightly","DBInstanceIdentifier":"billing","Engine":"postgres","Status":"available","SnapshotCreateTime":"2024-05-01T02:00:00+00:00"}]}'
    fi
    ;;
  restore-db-instance-from-db-snapshot|delete-db-instance)
    echo '{}'
    ;;
  *)
    echo "unexpected call: $*" >&2
    exit 255
    ;;
esac
"#;

struct FakeAws {
    dir: TempDir,
}

impl FakeAws {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        write_executable(&dir.path().join("bin").join("aws"), FAKE_AWS);
        Self { dir }
    }

    fn log_path(&self) -> PathBuf {
        self.dir.path().join("aws.log")
    }

    fn log(&self) -> String {
        std::fs::read_to_string(self.log_path()).unwrap_or_default()
    }

    fn command(&self) -> Command {
        let path = std::env::var("PATH").unwrap_or_default();
        let mut cmd = rdsvalidator();
        cmd.env(
            "PATH",
            format!("{}:{path}", self.dir.path().join("bin").display()),
        )
        .env("FAKE_AWS_LOG", self.log_path())
        .env("RV_CONFIG", self.dir.path().join("missing.yaml"))
        .env_remove("FAKE_AWS_FAIL")
        .env_remove("FAKE_AWS_NO_SNAPSHOTS");
        cmd
    }
}

fn write_executable(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(path, content).expect("write");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
}

#[test]
fn test_list_prints_clusters_and_standalone_instances() {
    let aws = FakeAws::new();

    let output = aws
        .command()
        .args(["--list", "--region", "eu-west-1"])
        .output()
        .expect("run");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(doc["clusters"][0]["identifier"], "orders");
    assert_eq!(doc["clusters"][0]["members"][0]["writer"], true);
    let instances = doc["instances"].as_array().expect("instances");
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0]["identifier"], "billing");
    assert!(aws.log().contains("--region eu-west-1"));
}

#[test]
fn test_validate_runs_post_scripts_and_tears_down() {
    let aws = FakeAws::new();
    let scripts = aws.dir.path().join("post");
    let captured = aws.dir.path().join("env.out");
    write_executable(
        &scripts.join("10-capture.sh"),
        "#!/bin/sh\nenv | grep '^DB_' | sort > \"$CAPTURE\"\n",
    );

    aws.command()
        .args(["--instance-id", "billing", "--yes", "--post"])
        .arg(&scripts)
        .env("CAPTURE", &captured)
        .assert()
        .code(0);

    let env = std::fs::read_to_string(&captured).expect("script ran");
    assert!(env.contains("DB_HOST=billing.rds.example"));
    assert!(env.contains("DB_PORT=5432"));
    assert!(env.contains("DB_USER=admin"));
    let log = aws.log();
    assert!(log.contains("restore-db-instance-from-db-snapshot"));
    assert!(log.contains("arn:aws:rds:eu-west-1:1:snapshot:nightly"));
    assert!(log.contains("delete-db-instance --db-instance-identifier billing-"));
}

#[test]
fn test_failing_post_script_exits_one_after_teardown() {
    let aws = FakeAws::new();
    let scripts = aws.dir.path().join("post");
    write_executable(&scripts.join("fail.sh"), "#!/bin/sh\nexit 3\n");

    aws.command()
        .args(["--instance-id", "billing", "--yes", "--post"])
        .arg(&scripts)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("fail.sh"));

    assert!(aws.log().contains("delete-db-instance"));
}

#[test]
fn test_no_snapshots_exits_one_without_restoring() {
    let aws = FakeAws::new();

    aws.command()
        .args(["--instance-id", "billing", "--yes"])
        .env("FAKE_AWS_NO_SNAPSHOTS", "1")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no snapshots found for billing"));

    assert!(!aws.log().contains("restore-db-instance"));
}

#[test]
fn test_failed_release_exits_three() {
    let aws = FakeAws::new();

    aws.command()
        .args(["--instance-id", "billing", "--yes"])
        .env("FAKE_AWS_FAIL", "delete-db-instance")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("manual cleanup"));
}
