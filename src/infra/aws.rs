//! Cloud adapter backed by the `aws` command line tool.
//!
//! `AwsCli<R>` routes every call through a `CommandRunner` with
//! `--output json` and maps a failed call to a [`CloudError`] parsed from
//! the tool's stderr. Listing calls disable the tool's own pagination so
//! the application layer sees (and drains) the markers.

use std::process::Output;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::application::ports::{
    ClusterInstanceSpec, ClusterRestore, CommandRunner, ComputeApi, ComputeStatus, CreatedKeypair,
    DatabaseApi, FirewallApi, Image, ImageFilter, InstanceRestore, KeypairApi, LaunchSpec,
};
use crate::domain::{
    ClusterMember, ClusterSummary, CloudError, DbCluster, DbInstance, InstanceSummary, Page,
    Snapshot,
};
use crate::infra::command_runner::{AWS_CALL_TIMEOUT, TokioCommandRunner};

const PROGRAM: &str = "aws";
const TAG_NAME: &str = "rdsvalidator";

/// Matches `An error occurred (Code) when calling the Op operation[ (retries)]: message`.
static CLI_ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: this is a compile-time constant pattern, cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(
        r"An error occurred \(([^)]+)\) when calling the (\w+) operation(?: \([^)]*\))?: (.*)",
    )
    .expect("valid regex")
});

/// Global options appended to every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsOptions {
    pub region: Option<String>,
    pub profile: Option<String>,
}

/// Cloud adapter over the `aws` CLI.
///
/// Generic over `R: CommandRunner` so tests can feed canned responses.
pub struct AwsCli<R: CommandRunner> {
    runner: R,
    options: AwsOptions,
}

impl<R: CommandRunner> AwsCli<R> {
    pub fn new(runner: R, options: AwsOptions) -> Self {
        Self { runner, options }
    }

    async fn invoke(&self, service: &str, command: &str, args: &[&str]) -> Result<Output> {
        let mut argv = vec![service, command];
        argv.extend_from_slice(args);
        argv.extend(["--output", "json"]);
        if let Some(region) = &self.options.region {
            argv.extend(["--region", region.as_str()]);
        }
        if let Some(profile) = &self.options.profile {
            argv.extend(["--profile", profile.as_str()]);
        }
        let output = self
            .runner
            .run(PROGRAM, &argv)
            .await
            .with_context(|| format!("aws {service} {command}"))?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(parse_cli_error(command, &output.stderr).into())
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        service: &str,
        command: &str,
        args: &[&str],
    ) -> Result<T> {
        let output = self.invoke(service, command, args).await?;
        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parsing aws {service} {command} output"))
    }

    async fn call_unit(&self, service: &str, command: &str, args: &[&str]) -> Result<()> {
        self.invoke(service, command, args).await.map(drop)
    }

    async fn list<T: DeserializeOwned>(
        &self,
        command: &str,
        args: &[&str],
        marker: Option<&str>,
    ) -> Result<T> {
        let mut argv = args.to_vec();
        argv.push("--no-paginate");
        if let Some(marker) = marker {
            argv.extend(["--marker", marker]);
        }
        self.call("rds", command, &argv).await
    }
}

impl AwsCli<TokioCommandRunner> {
    /// Convenience constructor for production use.
    #[must_use]
    pub fn default_runner(options: AwsOptions) -> Self {
        Self::new(TokioCommandRunner::new(AWS_CALL_TIMEOUT), options)
    }
}

/// Build a [`CloudError`] from the CLI's stderr.
#[must_use]
pub fn parse_cli_error(command: &str, stderr: &[u8]) -> CloudError {
    let text = String::from_utf8_lossy(stderr);
    match CLI_ERROR_RE.captures(&text) {
        Some(caps) => CloudError {
            operation: caps[2].to_string(),
            code: caps[1].to_string(),
            message: caps[3].trim().to_string(),
        },
        None => CloudError {
            operation: command.to_string(),
            code: "CliError".to_string(),
            message: text.trim().to_string(),
        },
    }
}

fn not_found(operation: &str, code: &str, id: &str) -> anyhow::Error {
    CloudError {
        operation: operation.to_string(),
        code: code.to_string(),
        message: format!("{id} not found"),
    }
    .into()
}

// ── EC2 response shapes ───────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyPairCreated {
    key_pair_id: String,
    key_name: String,
    key_material: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyPairList {
    #[serde(default)]
    key_pairs: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GroupCreated {
    group_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GroupList {
    #[serde(default)]
    security_groups: Vec<Group>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Group {
    #[serde(default)]
    ip_permissions_egress: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageList {
    #[serde(default)]
    images: Vec<ImageOut>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageOut {
    image_id: String,
    creation_date: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Launched {
    instances: Vec<InstanceOut>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservations {
    #[serde(default)]
    reservations: Vec<Launched>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceOut {
    instance_id: String,
    state: Option<StateOut>,
    public_ip_address: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StateOut {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Terminating {
    #[serde(default)]
    terminating_instances: Vec<StateChange>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StateChange {
    current_state: StateOut,
}

// ── RDS response shapes ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ClusterList {
    #[serde(rename = "DBClusters", default)]
    clusters: Vec<ClusterOut>,
    #[serde(rename = "Marker")]
    marker: Option<String>,
}

#[derive(Deserialize)]
struct ClusterOut {
    #[serde(rename = "DBClusterIdentifier")]
    identifier: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "DBClusterMembers", default)]
    members: Vec<MemberOut>,
}

#[derive(Deserialize)]
struct MemberOut {
    #[serde(rename = "DBInstanceIdentifier")]
    identifier: String,
    #[serde(rename = "IsClusterWriter", default)]
    writer: bool,
}

#[derive(Deserialize)]
struct InstanceList {
    #[serde(rename = "DBInstances", default)]
    instances: Vec<DbInstanceOut>,
    #[serde(rename = "Marker")]
    marker: Option<String>,
}

#[derive(Deserialize)]
struct DbInstanceOut {
    #[serde(rename = "DBInstanceIdentifier")]
    identifier: String,
    #[serde(rename = "DBInstanceStatus")]
    status: String,
    #[serde(rename = "Engine", default)]
    engine: String,
    #[serde(rename = "Endpoint")]
    endpoint: Option<EndpointOut>,
    #[serde(rename = "DBName")]
    db_name: Option<String>,
    #[serde(rename = "MasterUsername")]
    master_user: Option<String>,
    #[serde(rename = "DBClusterIdentifier")]
    cluster_id: Option<String>,
}

#[derive(Deserialize)]
struct EndpointOut {
    #[serde(rename = "Address")]
    address: Option<String>,
    #[serde(rename = "Port")]
    port: Option<u16>,
}

impl From<DbInstanceOut> for DbInstance {
    fn from(out: DbInstanceOut) -> Self {
        let (address, port) = out
            .endpoint
            .map_or((None, None), |e| (e.address, e.port));
        Self {
            identifier: out.identifier,
            status: out.status,
            engine: out.engine,
            address,
            port,
            db_name: out.db_name,
            master_user: out.master_user,
            cluster_id: out.cluster_id,
        }
    }
}

#[derive(Deserialize)]
struct ClusterSnapshotList {
    #[serde(rename = "DBClusterSnapshots", default)]
    snapshots: Vec<ClusterSnapshotOut>,
    #[serde(rename = "Marker")]
    marker: Option<String>,
}

#[derive(Deserialize)]
struct ClusterSnapshotOut {
    #[serde(rename = "DBClusterSnapshotIdentifier")]
    identifier: String,
    #[serde(rename = "DBClusterSnapshotArn")]
    arn: String,
    #[serde(rename = "DBClusterIdentifier")]
    source_id: String,
    #[serde(rename = "Engine", default)]
    engine: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "SnapshotCreateTime")]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct InstanceSnapshotList {
    #[serde(rename = "DBSnapshots", default)]
    snapshots: Vec<InstanceSnapshotOut>,
    #[serde(rename = "Marker")]
    marker: Option<String>,
}

#[derive(Deserialize)]
struct InstanceSnapshotOut {
    #[serde(rename = "DBSnapshotIdentifier")]
    identifier: String,
    #[serde(rename = "DBSnapshotArn")]
    arn: String,
    #[serde(rename = "DBInstanceIdentifier")]
    source_id: String,
    #[serde(rename = "Engine", default)]
    engine: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "SnapshotCreateTime")]
    created_at: Option<DateTime<Utc>>,
}

// Snapshots still being taken have no creation time yet and are skipped.
fn snapshot(
    identifier: String,
    arn: String,
    source_id: String,
    engine: String,
    status: String,
    created_at: Option<DateTime<Utc>>,
) -> Option<Snapshot> {
    Some(Snapshot {
        identifier,
        arn,
        source_id,
        engine,
        status,
        created_at: created_at?,
    })
}

// ── Port implementations ──────────────────────────────────────────────────────

impl<R: CommandRunner> KeypairApi for AwsCli<R> {
    async fn create_keypair(&self, name: &str) -> Result<CreatedKeypair> {
        let tags = format!("ResourceType=key-pair,Tags=[{{Key=Name,Value={TAG_NAME}}}]");
        let out: KeyPairCreated = self
            .call(
                "ec2",
                "create-key-pair",
                &[
                    "--key-name",
                    name,
                    "--key-type",
                    "ed25519",
                    "--tag-specifications",
                    &tags,
                ],
            )
            .await?;
        Ok(CreatedKeypair {
            id: out.key_pair_id,
            name: out.key_name,
            private_key: out.key_material,
        })
    }

    async fn keypair_visible(&self, name: &str) -> Result<bool> {
        let listed: Result<KeyPairList> = self
            .call("ec2", "describe-key-pairs", &["--key-names", name])
            .await;
        match listed {
            Ok(list) => Ok(!list.key_pairs.is_empty()),
            Err(e) if crate::domain::error::is_not_found(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete_keypair(&self, id: &str) -> Result<()> {
        self.call_unit("ec2", "delete-key-pair", &["--key-pair-id", id])
            .await
    }
}

impl<R: CommandRunner> FirewallApi for AwsCli<R> {
    async fn create_rule(&self, name: &str, vpc_id: &str, description: &str) -> Result<String> {
        let out: GroupCreated = self
            .call(
                "ec2",
                "create-security-group",
                &[
                    "--group-name",
                    name,
                    "--description",
                    description,
                    "--vpc-id",
                    vpc_id,
                ],
            )
            .await?;
        Ok(out.group_id)
    }

    async fn rule_ready(&self, group_id: &str) -> Result<bool> {
        let out: GroupList = self
            .call("ec2", "describe-security-groups", &["--group-ids", group_id])
            .await?;
        Ok(out
            .security_groups
            .first()
            .is_some_and(|g| !g.ip_permissions_egress.is_empty()))
    }

    async fn authorize_ingress(&self, group_id: &str, cidr: &str, port: u16) -> Result<()> {
        let port = port.to_string();
        self.call_unit(
            "ec2",
            "authorize-security-group-ingress",
            &[
                "--group-id",
                group_id,
                "--protocol",
                "tcp",
                "--port",
                &port,
                "--cidr",
                cidr,
            ],
        )
        .await
    }

    async fn delete_rule(&self, group_id: &str) -> Result<()> {
        self.call_unit("ec2", "delete-security-group", &["--group-id", group_id])
            .await
    }
}

impl<R: CommandRunner> ComputeApi for AwsCli<R> {
    async fn list_images(&self, filter: &ImageFilter<'_>) -> Result<Vec<Image>> {
        let name = format!("Name=name,Values={}", filter.name);
        let arch = format!("Name=architecture,Values={}", filter.architecture);
        let out: ImageList = self
            .call(
                "ec2",
                "describe-images",
                &[
                    "--owners",
                    filter.owner,
                    "--filters",
                    &name,
                    &arch,
                    "Name=state,Values=available",
                ],
            )
            .await?;
        Ok(out
            .images
            .into_iter()
            .map(|i| Image {
                id: i.image_id,
                created_at: i.creation_date,
            })
            .collect())
    }

    async fn run_instance(&self, spec: &LaunchSpec<'_>) -> Result<String> {
        let interfaces = serde_json::json!([{
            "DeviceIndex": 0,
            "SubnetId": spec.subnet_id,
            "Groups": [spec.group_id],
            "AssociatePublicIpAddress": true,
            "DeleteOnTermination": true,
        }])
        .to_string();
        let tags = format!("ResourceType=instance,Tags=[{{Key=Name,Value={TAG_NAME}}}]");
        let out: Launched = self
            .call(
                "ec2",
                "run-instances",
                &[
                    "--image-id",
                    spec.image_id,
                    "--instance-type",
                    spec.instance_type,
                    "--key-name",
                    spec.key_name,
                    "--count",
                    "1",
                    "--network-interfaces",
                    &interfaces,
                    "--tag-specifications",
                    &tags,
                ],
            )
            .await?;
        out.instances
            .into_iter()
            .next()
            .map(|i| i.instance_id)
            .context("run-instances returned no instance")
    }

    async fn describe_compute(&self, id: &str) -> Result<ComputeStatus> {
        let out: Reservations = self
            .call("ec2", "describe-instances", &["--instance-ids", id])
            .await?;
        let instance = out
            .reservations
            .into_iter()
            .flat_map(|r| r.instances)
            .next()
            .ok_or_else(|| not_found("DescribeInstances", "InvalidInstanceID.NotFound", id))?;
        Ok(ComputeStatus {
            state: instance.state.map(|s| s.name).unwrap_or_default(),
            public_ip: instance.public_ip_address,
        })
    }

    async fn terminate_instance(&self, id: &str) -> Result<String> {
        let out: Terminating = self
            .call("ec2", "terminate-instances", &["--instance-ids", id])
            .await?;
        Ok(out
            .terminating_instances
            .into_iter()
            .next()
            .map(|c| c.current_state.name)
            .unwrap_or_default())
    }
}

impl<R: CommandRunner> DatabaseApi for AwsCli<R> {
    async fn list_clusters(&self, marker: Option<&str>) -> Result<Page<ClusterSummary>> {
        // Shared clusters are listed alongside owned ones.
        let out: ClusterList = self
            .list("describe-db-clusters", &["--include-shared"], marker)
            .await?;
        Ok(Page {
            items: out
                .clusters
                .into_iter()
                .map(|c| ClusterSummary {
                    identifier: c.identifier,
                    status: c.status,
                    members: c
                        .members
                        .into_iter()
                        .map(|m| ClusterMember {
                            identifier: m.identifier,
                            writer: m.writer,
                        })
                        .collect(),
                })
                .collect(),
            marker: out.marker,
        })
    }

    async fn list_instances(&self, marker: Option<&str>) -> Result<Page<InstanceSummary>> {
        let out: InstanceList = self.list("describe-db-instances", &[], marker).await?;
        Ok(Page {
            items: out
                .instances
                .into_iter()
                .map(|i| InstanceSummary {
                    identifier: i.identifier,
                    status: i.status,
                    cluster_id: i.cluster_id,
                })
                .collect(),
            marker: out.marker,
        })
    }

    async fn list_cluster_snapshots(
        &self,
        cluster_id: &str,
        marker: Option<&str>,
    ) -> Result<Page<Snapshot>> {
        let out: ClusterSnapshotList = self
            .list(
                "describe-db-cluster-snapshots",
                &["--db-cluster-identifier", cluster_id],
                marker,
            )
            .await?;
        Ok(Page {
            items: out
                .snapshots
                .into_iter()
                .filter_map(|s| {
                    snapshot(s.identifier, s.arn, s.source_id, s.engine, s.status, s.created_at)
                })
                .collect(),
            marker: out.marker,
        })
    }

    async fn list_instance_snapshots(
        &self,
        instance_id: &str,
        marker: Option<&str>,
    ) -> Result<Page<Snapshot>> {
        let out: InstanceSnapshotList = self
            .list(
                "describe-db-snapshots",
                &["--db-instance-identifier", instance_id],
                marker,
            )
            .await?;
        Ok(Page {
            items: out
                .snapshots
                .into_iter()
                .filter_map(|s| {
                    snapshot(s.identifier, s.arn, s.source_id, s.engine, s.status, s.created_at)
                })
                .collect(),
            marker: out.marker,
        })
    }

    async fn restore_cluster(&self, request: &ClusterRestore<'_>) -> Result<()> {
        self.call_unit(
            "rds",
            "restore-db-cluster-from-snapshot",
            &[
                "--db-cluster-identifier",
                request.identifier,
                "--snapshot-identifier",
                request.snapshot_arn,
                "--engine",
                request.engine,
                "--no-deletion-protection",
            ],
        )
        .await
    }

    async fn describe_cluster(&self, id: &str) -> Result<DbCluster> {
        let out: ClusterList = self
            .call("rds", "describe-db-clusters", &["--db-cluster-identifier", id])
            .await?;
        out.clusters
            .into_iter()
            .next()
            .map(|c| DbCluster {
                identifier: c.identifier,
                status: c.status,
            })
            .ok_or_else(|| not_found("DescribeDBClusters", "DBClusterNotFoundFault", id))
    }

    async fn create_cluster_instance(&self, spec: &ClusterInstanceSpec<'_>) -> Result<()> {
        self.call_unit(
            "rds",
            "create-db-instance",
            &[
                "--db-instance-identifier",
                spec.identifier,
                "--db-cluster-identifier",
                spec.cluster_id,
                "--db-instance-class",
                spec.instance_class,
                "--engine",
                spec.engine,
                "--no-publicly-accessible",
                "--no-auto-minor-version-upgrade",
            ],
        )
        .await
    }

    async fn restore_instance(&self, request: &InstanceRestore<'_>) -> Result<()> {
        self.call_unit(
            "rds",
            "restore-db-instance-from-db-snapshot",
            &[
                "--db-instance-identifier",
                request.identifier,
                "--db-snapshot-identifier",
                request.snapshot_arn,
                "--db-instance-class",
                request.instance_class,
                "--engine",
                request.engine,
                "--no-multi-az",
                "--no-publicly-accessible",
                "--no-auto-minor-version-upgrade",
                "--backup-retention-period",
                "0",
            ],
        )
        .await
    }

    async fn describe_db_instance(&self, id: &str) -> Result<DbInstance> {
        let out: InstanceList = self
            .call("rds", "describe-db-instances", &["--db-instance-identifier", id])
            .await?;
        out.instances
            .into_iter()
            .next()
            .map(DbInstance::from)
            .ok_or_else(|| not_found("DescribeDBInstances", "DBInstanceNotFound", id))
    }

    async fn delete_db_instance(&self, id: &str) -> Result<()> {
        self.call_unit(
            "rds",
            "delete-db-instance",
            &[
                "--db-instance-identifier",
                id,
                "--skip-final-snapshot",
                "--delete-automated-backups",
            ],
        )
        .await
    }

    async fn delete_cluster(&self, id: &str) -> Result<()> {
        self.call_unit(
            "rds",
            "delete-db-cluster",
            &["--db-cluster-identifier", id, "--skip-final-snapshot"],
        )
        .await
    }
}
