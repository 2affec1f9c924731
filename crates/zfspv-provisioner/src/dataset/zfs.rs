use crate::command::{self, CommandOutput};
use crate::dataset::{Dataset, DatasetGateway, DatasetProperties, PermissionStrategy};
use crate::error::{ProvisionerError, Result};
use async_trait::async_trait;
use tracing::{debug, info};

const ALREADY_EXISTS: &str = "dataset already exists";
const DOES_NOT_EXIST: &str = "dataset does not exist";

/// Dataset gateway backed by the `zfs` command line tool
pub struct ZfsDatasetGateway {
    zfs: String,
    permissions: Option<PermissionStrategy>,
}

impl ZfsDatasetGateway {
    pub fn new() -> Self {
        Self {
            zfs: "zfs".to_string(),
            permissions: None,
        }
    }

    /// Use a specific `zfs` binary instead of the one on `PATH`
    pub fn with_zfs_binary(mut self, zfs: impl Into<String>) -> Self {
        self.zfs = zfs.into();
        self
    }

    /// Pin the permission strategy instead of probing `PATH` on every call
    pub fn with_permission_strategy(mut self, strategy: PermissionStrategy) -> Self {
        self.permissions = Some(strategy);
        self
    }

    /// Map well-known `zfs` failures onto typed errors
    fn classify(output: CommandOutput, dataset: &str) -> Result<CommandOutput> {
        if output.success() {
            return Ok(output);
        }
        if output.stderr.contains(DOES_NOT_EXIST) {
            return Err(ProvisionerError::dataset_not_found(dataset));
        }
        if output.stderr.contains(ALREADY_EXISTS) {
            return Err(ProvisionerError::dataset_already_exists(dataset));
        }
        output.check()
    }
}

impl Default for ZfsDatasetGateway {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `zfs get -H -p -o property,value,source all` output
fn parse_properties(name: &str, stdout: &str) -> Dataset {
    let mut mountpoint = String::new();
    let mut mounted = true;
    let mut properties = DatasetProperties::new();

    for line in stdout.lines() {
        let mut fields = line.splitn(3, '\t');
        let (Some(property), Some(value)) = (fields.next(), fields.next()) else {
            continue;
        };
        let source = fields.next().unwrap_or("-");

        match property {
            "mountpoint" => mountpoint = value.to_string(),
            "mounted" => mounted = value == "yes",
            _ => {}
        }
        if source == "local" {
            properties.insert(property.to_string(), value.to_string());
        }
    }

    if !mounted || matches!(mountpoint.as_str(), "none" | "legacy" | "-") {
        mountpoint.clear();
    }

    Dataset {
        name: name.to_string(),
        mountpoint,
        properties,
    }
}

#[async_trait]
impl DatasetGateway for ZfsDatasetGateway {
    async fn get(&self, name: &str) -> Result<Dataset> {
        let output = command::run_unchecked(
            &self.zfs,
            &["get", "-H", "-p", "-o", "property,value,source", "all", name],
        )
        .await?;
        let output = Self::classify(output, name)?;
        Ok(parse_properties(name, &output.stdout))
    }

    async fn create(&self, name: &str, properties: &DatasetProperties) -> Result<Dataset> {
        info!("Creating ZFS dataset: {}", name);

        let mut args = vec!["create".to_string()];
        for (key, value) in properties {
            args.push("-o".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(name.to_string());

        let output = command::run_unchecked(&self.zfs, &args).await?;
        Self::classify(output, name)?;

        let dataset = self.get(name).await?;
        debug!(
            "ZFS dataset {} created with mountpoint '{}'",
            dataset.name, dataset.mountpoint
        );
        Ok(dataset)
    }

    async fn destroy(&self, dataset: &Dataset, recursive: bool) -> Result<()> {
        dataset.validate()?;
        info!("Destroying ZFS dataset: {}", dataset.name);

        let mut args = vec!["destroy"];
        if recursive {
            args.push("-r");
        }
        args.push(&dataset.name);

        let output = command::run_unchecked(&self.zfs, &args).await?;
        Self::classify(output, &dataset.name)?;

        info!("ZFS dataset destroyed: {}", dataset.name);
        Ok(())
    }

    async fn set_permissions(&self, dataset: &Dataset) -> Result<()> {
        dataset.validate()?;
        if dataset.mountpoint.is_empty() {
            return Err(ProvisionerError::permissions_failed(
                "",
                format!("undefined mountpoint for dataset: {}", dataset.name),
            ));
        }

        let strategy = match &self.permissions {
            Some(strategy) => strategy.clone(),
            None => PermissionStrategy::detect(),
        };
        debug!("Using permission strategy {:?} for {}", strategy, dataset.name);
        strategy.apply(&dataset.mountpoint).await
    }
}
