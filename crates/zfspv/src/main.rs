use clap::{Parser, Subcommand, ValueEnum};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use zfspv_core::{from_document, to_json_pretty, to_yaml, PersistentVolume};
use zfspv_provisioner::{
    DatasetGateway, PermissionStrategy, ProvisionRequest, ProvisionerConfig, ProvisionerError,
    ProvisioningState, VolumeProvisioner, ZfsDatasetGateway, ZfsProvisioner,
    DEFAULT_INSTANCE_NAME, DEFAULT_PARENT_DATASET,
};

#[derive(Parser)]
#[command(
    name = "zfspv",
    about = "Provision Kubernetes PersistentVolumes as ZFS datasets"
)]
struct Cli {
    /// Parent ZFS dataset for volume datasets
    #[arg(long, env = "ZFS_PARENT_DATASET", default_value = DEFAULT_PARENT_DATASET, global = true)]
    parent_dataset: String,
    /// Provisioner identity recorded on every dataset
    #[arg(long, env = "ZFS_PROVISIONER_INSTANCE", default_value = DEFAULT_INSTANCE_NAME, global = true)]
    provisioner_instance: String,
    /// Node hosting the pool; volumes are pinned to it
    #[arg(long, env = "ZFS_NODE_NAME", global = true)]
    node_name: Option<String>,
    /// Path to the zfs binary
    #[arg(long, env = "ZFS_BINARY", default_value = "zfs", global = true)]
    zfs_binary: String,
    /// Output format for PersistentVolumes
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml, global = true)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the dataset for a pending claim and print its PersistentVolume
    Provision {
        /// ProvisionRequest document (JSON or YAML), '-' for stdin
        #[arg(long, default_value = "-")]
        request: String,
    },
    /// Destroy the dataset behind a released PersistentVolume
    Delete {
        /// PersistentVolume document (JSON or YAML), '-' for stdin
        #[arg(long, default_value = "-")]
        volume: String,
    },
    /// Validate configuration and check that the parent dataset exists
    CheckConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[tokio::main]
async fn main() -> miette::Result<ExitCode> {
    // Logs go to stderr; stdout carries the PersistentVolume
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = ProvisionerConfig::new(
        &cli.parent_dataset,
        &cli.provisioner_instance,
        cli.node_name.clone().unwrap_or_default(),
    )?;
    let gateway = Arc::new(ZfsDatasetGateway::new().with_zfs_binary(&cli.zfs_binary));

    match cli.command {
        Commands::Provision { request } => {
            run_provision(gateway, config, &request, cli.output).await
        }
        Commands::Delete { volume } => run_delete(gateway, config, &volume).await,
        Commands::CheckConfig => run_check_config(gateway.as_ref(), &config).await,
    }
}

/// Provision a single claim; exit code 1 for a finished failure, 2 for no change
async fn run_provision(
    gateway: Arc<ZfsDatasetGateway>,
    config: ProvisionerConfig,
    source: &str,
    output: OutputFormat,
) -> miette::Result<ExitCode> {
    let request: ProvisionRequest = from_document(&read_input(source).await?)?;
    let provisioner = ZfsProvisioner::new(gateway, config);

    match provisioner.provision(&request).await {
        Ok(volume) => {
            let rendered = match output {
                OutputFormat::Json => to_json_pretty(&volume)?,
                OutputFormat::Yaml => to_yaml(&volume)?,
            };
            println!("{}", rendered);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let code: u8 = match e.state {
                ProvisioningState::Finished => 1,
                ProvisioningState::NoChange => 2,
            };
            error!(
                "Provisioning {} ended {} ({}, retryable: {})",
                e.pv_name,
                e.terminal,
                e.state,
                e.is_retryable()
            );
            eprintln!("{:?}", miette::Report::new(e));
            Ok(ExitCode::from(code))
        }
    }
}

async fn run_delete(
    gateway: Arc<ZfsDatasetGateway>,
    config: ProvisionerConfig,
    source: &str,
) -> miette::Result<ExitCode> {
    let volume: PersistentVolume = from_document(&read_input(source).await?)?;
    let provisioner = ZfsProvisioner::new(gateway, config);
    provisioner.delete(&volume).await?;
    Ok(ExitCode::SUCCESS)
}

async fn run_check_config(
    gateway: &ZfsDatasetGateway,
    config: &ProvisionerConfig,
) -> miette::Result<ExitCode> {
    info!(
        "Using parent dataset '{}', instance '{}', node '{}'",
        config.parent_dataset(),
        config.instance_name(),
        config.node_name()
    );

    match PermissionStrategy::detect() {
        PermissionStrategy::Helper(path) => {
            info!("Permissions will be updated by {}", path.display())
        }
        PermissionStrategy::GroupWrite => {
            info!("No permission helper on PATH, mountpoints get the group-write bit")
        }
    }

    let parent = gateway.get(config.parent_dataset()).await?;
    if parent.mountpoint.is_empty() {
        return Err(ProvisionerError::invalid_config(
            format!("parent dataset '{}' is not mounted", parent.name),
            "Volume datasets inherit their mountpoint from the parent. Mount it with `zfs mount`",
        )
        .into());
    }

    info!("Parent dataset {} mounted at {}", parent.name, parent.mountpoint);
    Ok(ExitCode::SUCCESS)
}

async fn read_input(source: &str) -> miette::Result<String> {
    let mut buf = String::new();
    if source == "-" {
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .map_err(|e| miette::miette!("Failed to read stdin: {}", e))?;
    } else {
        buf = tokio::fs::read_to_string(source)
            .await
            .map_err(|e| miette::miette!("Failed to read '{}': {}", source, e))?;
    }
    Ok(buf)
}
