//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser};

use crate::commands;
use crate::domain::exit::EXIT_OK;
use crate::domain::plan::{self, Mode, RunRequest};
use crate::infra::aws::{AwsCli, AwsOptions};
use crate::infra::config::YamlSettingsStore;
use crate::output::OutputContext;

/// Restore the latest RDS snapshot into a throwaway environment, run
/// validation scripts against it, then tear everything down.
#[derive(Parser)]
#[command(name = "rdsvalidator", version)]
pub struct Cli {
    /// List clusters and standalone instances as JSON
    #[arg(long, env = "RV_LIST")]
    pub list: bool,

    /// Restore the latest snapshot of this cluster
    #[arg(long, env = "RV_CLUSTER_ID", value_name = "ID")]
    pub cluster_id: Option<String>,

    /// Restore the latest snapshot of this instance
    #[arg(long, env = "RV_INSTANCE_ID", value_name = "ID")]
    pub instance_id: Option<String>,

    /// Instance class for the restored database
    #[arg(long, env = "RV_INSTANCE_TYPE", default_value = "db.t3.medium")]
    pub instance_type: String,

    /// Directory of scripts to run before provisioning
    #[arg(long, env = "RV_PRE", value_name = "DIR")]
    pub pre: Option<PathBuf>,

    /// Directory of scripts to run against the restored database
    #[arg(long, env = "RV_POST", value_name = "DIR")]
    pub post: Option<PathBuf>,

    /// Existing SSH host to tunnel through
    #[arg(long, env = "RV_PROXY", value_name = "HOST")]
    pub proxy: Option<String>,

    /// Private key for --proxy
    #[arg(long, env = "RV_PROXY_KEY", value_name = "FILE")]
    pub proxy_key: Option<PathBuf>,

    /// SSH user on the proxy host
    #[arg(long, env = "RV_PROXY_USER", default_value = "ubuntu")]
    pub proxy_user: String,

    /// Create a temporary bastion to tunnel through
    #[arg(long, env = "RV_PROXY_CREATE")]
    pub proxy_create: bool,

    /// VPC for the temporary bastion
    #[arg(long, env = "RV_PROXY_VPC", value_name = "VPC_ID")]
    pub proxy_vpc: Option<String>,

    /// Subnet for the temporary bastion
    #[arg(long, env = "RV_PROXY_SUBNET", value_name = "SUBNET_ID")]
    pub proxy_subnet: Option<String>,

    /// CIDR allowed to reach the temporary bastion over SSH
    #[arg(long, env = "RV_PROXY_INGRESS_CIDR", default_value = "0.0.0.0/0")]
    pub proxy_ingress_cidr: String,

    /// Local tunnel port [default: database port + 10000]
    #[arg(long, env = "RV_LOCAL_PORT", value_name = "PORT")]
    pub local_port: Option<u16>,

    /// AWS region passed to the aws CLI
    #[arg(long)]
    pub region: Option<String>,

    /// AWS profile passed to the aws CLI
    #[arg(long)]
    pub profile: Option<String>,

    /// Settings file [default: ~/.rdsvalidator/config.yaml]
    #[arg(long, env = "RV_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tear down as soon as post scripts finish
    #[arg(short, long, env = "RV_YES")]
    pub yes: bool,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Execute the selected mode and return the process exit code.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::domain::UsageError`] for invalid flag combinations,
    /// or any error raised before provisioning starts.
    pub async fn run(self) -> Result<i32> {
        let ctx = OutputContext::new(self.no_color, self.quiet);
        let options = AwsOptions {
            region: self.region.clone(),
            profile: self.profile.clone(),
        };
        let config = self.config.clone();
        let mode = plan::resolve(self.into_request())?;
        let cloud = AwsCli::default_runner(options);

        match mode {
            Mode::List => {
                commands::list::run(&cloud).await?;
                Ok(EXIT_OK)
            }
            Mode::Validate(plan) => {
                let settings = YamlSettingsStore::new(config).load()?;
                commands::validate::run(&ctx, &plan, &settings, &cloud).await
            }
        }
    }

    fn into_request(self) -> RunRequest {
        RunRequest {
            list: self.list,
            cluster_id: self.cluster_id,
            instance_id: self.instance_id,
            instance_class: self.instance_type,
            pre_scripts: self.pre,
            post_scripts: self.post,
            proxy: self.proxy,
            proxy_key: self.proxy_key,
            proxy_user: self.proxy_user,
            proxy_create: self.proxy_create,
            proxy_vpc: self.proxy_vpc,
            proxy_subnet: self.proxy_subnet,
            ingress_cidr: self.proxy_ingress_cidr,
            local_port: self.local_port,
            yes: self.yes,
        }
    }
}
