mod mock;
mod permissions;
mod zfs;

pub use mock::MockDatasetGateway;
pub use permissions::{PermissionStrategy, PERMISSION_HELPER};
pub use zfs::ZfsDatasetGateway;

use crate::error::{ProvisionerError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Property map applied to a dataset at creation time
pub type DatasetProperties = BTreeMap<String, String>;

/// A ZFS dataset as last observed by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    /// Fully-qualified dataset path, e.g. `tank/kubernetes/pvc-1234`
    pub name: String,
    /// Mount location; empty while the dataset is not mounted
    pub mountpoint: String,
    /// Locally-set properties, including user properties
    pub properties: DatasetProperties,
}

impl Dataset {
    /// Descriptor carrying only a name, enough to address the dataset
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ProvisionerError::zfs_error("undefined dataset name"));
        }
        Ok(())
    }
}

/// Narrow capability over the storage engine.
///
/// `ZfsDatasetGateway` drives the `zfs` CLI; `MockDatasetGateway` keeps an
/// in-memory dataset tree for tests. Every call reflects live engine state and
/// nothing is retried here.
#[async_trait]
pub trait DatasetGateway: Send + Sync {
    /// Look up an existing dataset. Fails with `DatasetNotFound` if absent.
    async fn get(&self, name: &str) -> Result<Dataset>;

    /// Create a dataset with `properties` applied atomically.
    async fn create(&self, name: &str, properties: &DatasetProperties) -> Result<Dataset>;

    /// Destroy a dataset, and all descendants when `recursive` is set.
    async fn destroy(&self, dataset: &Dataset, recursive: bool) -> Result<()>;

    /// Make the dataset's mountpoint writable for non-root workloads.
    async fn set_permissions(&self, dataset: &Dataset) -> Result<()>;
}
