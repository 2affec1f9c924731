use crate::dataset::{Dataset, DatasetGateway, DatasetProperties};
use crate::error::{ProvisionerError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const NUMERIC_PROPERTIES: [&str; 4] = ["quota", "refquota", "reservation", "refreservation"];

/// In-memory dataset gateway for tests
///
/// Keeps a dataset tree in memory and mimics the `zfs` rules the provisioner
/// relies on: parents must exist, names are unique, numeric properties must
/// parse, and non-recursive destroys refuse datasets with children.
/// Call counters let tests assert which operations were reached.
#[derive(Default)]
pub struct MockDatasetGateway {
    datasets: Arc<RwLock<BTreeMap<String, Dataset>>>,
    busy: Arc<RwLock<HashSet<String>>>,
    fail_permissions: AtomicBool,
    creates: AtomicUsize,
    destroys: AtomicUsize,
    permission_updates: AtomicUsize,
}

impl MockDatasetGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a dataset directly, bypassing parent checks and counters
    pub async fn seed(&self, name: &str) {
        self.datasets
            .write()
            .await
            .insert(name.to_string(), Self::mounted(name, DatasetProperties::new()));
    }

    /// Insert a dataset with explicit properties
    pub async fn seed_with_properties(&self, name: &str, properties: DatasetProperties) {
        self.datasets
            .write()
            .await
            .insert(name.to_string(), Self::mounted(name, properties));
    }

    /// Make destroys of `name` fail as if the dataset had open handles
    pub async fn mark_busy(&self, name: &str) {
        self.busy.write().await.insert(name.to_string());
    }

    /// Toggle failures of `set_permissions`
    pub fn fail_permissions(&self, fail: bool) {
        self.fail_permissions.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.datasets.read().await.contains_key(name)
    }

    pub async fn dataset(&self, name: &str) -> Option<Dataset> {
        self.datasets.read().await.get(name).cloned()
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    pub fn permission_calls(&self) -> usize {
        self.permission_updates.load(Ordering::SeqCst)
    }

    fn mounted(name: &str, properties: DatasetProperties) -> Dataset {
        Dataset {
            name: name.to_string(),
            mountpoint: format!("/{}", name),
            properties,
        }
    }

    fn is_descendant(candidate: &str, name: &str) -> bool {
        candidate
            .strip_prefix(name)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

#[async_trait]
impl DatasetGateway for MockDatasetGateway {
    async fn get(&self, name: &str) -> Result<Dataset> {
        self.datasets
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ProvisionerError::dataset_not_found(name))
    }

    async fn create(&self, name: &str, properties: &DatasetProperties) -> Result<Dataset> {
        self.creates.fetch_add(1, Ordering::SeqCst);

        for key in NUMERIC_PROPERTIES {
            if let Some(value) = properties.get(key) {
                if value.parse::<u64>().is_err() {
                    return Err(ProvisionerError::command_failed(
                        format!("zfs create {}", name),
                        1,
                        format!("cannot create '{}': bad numeric value '{}'", name, value),
                    ));
                }
            }
        }

        let mut datasets = self.datasets.write().await;
        if datasets.contains_key(name) {
            return Err(ProvisionerError::dataset_already_exists(name));
        }
        if let Some((parent, _)) = name.rsplit_once('/') {
            if !datasets.contains_key(parent) {
                return Err(ProvisionerError::command_failed(
                    format!("zfs create {}", name),
                    1,
                    format!("cannot create '{}': parent does not exist", name),
                ));
            }
        }

        let dataset = Self::mounted(name, properties.clone());
        datasets.insert(name.to_string(), dataset.clone());
        debug!("Mock: created dataset {}", name);
        Ok(dataset)
    }

    async fn destroy(&self, dataset: &Dataset, recursive: bool) -> Result<()> {
        dataset.validate()?;
        self.destroys.fetch_add(1, Ordering::SeqCst);

        if self.busy.read().await.contains(&dataset.name) {
            return Err(ProvisionerError::command_failed(
                format!("zfs destroy {}", dataset.name),
                1,
                format!("cannot destroy '{}': dataset is busy", dataset.name),
            ));
        }

        let mut datasets = self.datasets.write().await;
        if !datasets.contains_key(&dataset.name) {
            return Err(ProvisionerError::dataset_not_found(&dataset.name));
        }

        let children: Vec<String> = datasets
            .keys()
            .filter(|k| Self::is_descendant(k, &dataset.name))
            .cloned()
            .collect();
        if !children.is_empty() && !recursive {
            return Err(ProvisionerError::command_failed(
                format!("zfs destroy {}", dataset.name),
                1,
                format!(
                    "cannot destroy '{}': filesystem has children",
                    dataset.name
                ),
            ));
        }

        for child in children {
            datasets.remove(&child);
        }
        datasets.remove(&dataset.name);
        debug!("Mock: destroyed dataset {}", dataset.name);
        Ok(())
    }

    async fn set_permissions(&self, dataset: &Dataset) -> Result<()> {
        dataset.validate()?;
        self.permission_updates.fetch_add(1, Ordering::SeqCst);

        if dataset.mountpoint.is_empty() {
            return Err(ProvisionerError::permissions_failed(
                "",
                format!("undefined mountpoint for dataset: {}", dataset.name),
            ));
        }
        if self.fail_permissions.load(Ordering::SeqCst) {
            return Err(ProvisionerError::permissions_failed(
                &dataset.mountpoint,
                "operation not permitted",
            ));
        }
        debug!("Mock: updated permissions on {}", dataset.mountpoint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_dataset_lifecycle() {
        let gateway = MockDatasetGateway::new();
        gateway.seed("tank").await;

        let ds = gateway
            .create("tank/vol", &DatasetProperties::new())
            .await
            .unwrap();
        assert_eq!(ds.mountpoint, "/tank/vol");
        assert_eq!(gateway.get("tank/vol").await.unwrap(), ds);

        gateway.destroy(&ds, false).await.unwrap();
        assert!(!gateway.contains("tank/vol").await);
        assert!(matches!(
            gateway.get("tank/vol").await,
            Err(ProvisionerError::DatasetNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_mock_create_requires_parent() {
        let gateway = MockDatasetGateway::new();
        let result = gateway.create("tank/vol", &DatasetProperties::new()).await;
        assert!(matches!(result, Err(ProvisionerError::CommandFailed { .. })));
        assert_eq!(gateway.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_create_duplicate() {
        let gateway = MockDatasetGateway::new();
        gateway.seed("tank").await;
        gateway.create("tank/vol", &DatasetProperties::new()).await.unwrap();

        let result = gateway.create("tank/vol", &DatasetProperties::new()).await;
        assert!(matches!(
            result,
            Err(ProvisionerError::DatasetAlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_mock_rejects_malformed_quota() {
        let gateway = MockDatasetGateway::new();
        gateway.seed("tank").await;
        let mut props = DatasetProperties::new();
        props.insert("refquota".to_string(), "ten".to_string());

        let result = gateway.create("tank/vol", &props).await;
        assert!(matches!(result, Err(ProvisionerError::CommandFailed { .. })));
        assert!(!gateway.contains("tank/vol").await);
    }

    #[tokio::test]
    async fn test_mock_destroy_children() {
        let gateway = MockDatasetGateway::new();
        gateway.seed("tank").await;
        gateway.seed("tank/vol").await;
        gateway.seed("tank/vol/nested").await;
        gateway.seed("tank/volume-other").await;

        let vol = Dataset::named("tank/vol");
        assert!(gateway.destroy(&vol, false).await.is_err());
        assert!(gateway.contains("tank/vol/nested").await);

        gateway.destroy(&vol, true).await.unwrap();
        assert!(!gateway.contains("tank/vol").await);
        assert!(!gateway.contains("tank/vol/nested").await);
        assert!(gateway.contains("tank/volume-other").await);
    }

    #[tokio::test]
    async fn test_mock_busy_dataset() {
        let gateway = MockDatasetGateway::new();
        gateway.seed("tank/vol").await;
        gateway.mark_busy("tank/vol").await;

        let result = gateway.destroy(&Dataset::named("tank/vol"), true).await;
        assert!(result.unwrap_err().is_retryable());
        assert!(gateway.contains("tank/vol").await);
    }
}
