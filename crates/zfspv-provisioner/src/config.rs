use crate::error::{ProvisionerError, Result};

pub const DEFAULT_PARENT_DATASET: &str = "tank/kubernetes";
pub const DEFAULT_INSTANCE_NAME: &str = "pv.kubernetes.io/zfs";

/// Process-wide provisioner settings, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerConfig {
    /// Dataset under which every volume dataset is created (e.g., "tank/kubernetes")
    parent_dataset: String,
    /// Provisioner identity, recorded on every dataset it creates
    instance_name: String,
    /// Node that owns the pool; volumes are pinned to it
    node_name: String,
}

impl ProvisionerConfig {
    pub fn new(
        parent_dataset: impl Into<String>,
        instance_name: impl Into<String>,
        node_name: impl Into<String>,
    ) -> Result<Self> {
        let parent_dataset = parent_dataset.into();
        let instance_name = instance_name.into();
        let node_name = node_name.into();

        if parent_dataset.is_empty() {
            return Err(ProvisionerError::invalid_config(
                "parentDataset must not be empty",
                format!("Set it to an existing dataset such as '{}'", DEFAULT_PARENT_DATASET),
            ));
        }
        if parent_dataset.starts_with('/') || parent_dataset.ends_with('/') {
            return Err(ProvisionerError::invalid_config(
                format!("parentDataset must not begin or end with '/': {}", parent_dataset),
                format!(
                    "Use a dataset name, not a mount path: '{}'",
                    parent_dataset.trim_matches('/')
                ),
            ));
        }
        if instance_name.trim().is_empty() {
            return Err(ProvisionerError::invalid_config(
                "provisioner instance name must not be empty",
                format!("The conventional name is '{}'", DEFAULT_INSTANCE_NAME),
            ));
        }
        if node_name.trim().is_empty() {
            return Err(ProvisionerError::invalid_config(
                "node name must not be empty",
                "Set ZFS_NODE_NAME to the name of the node that hosts the pool, e.g. from the downward API",
            ));
        }

        Ok(Self {
            parent_dataset,
            instance_name,
            node_name,
        })
    }

    pub fn parent_dataset(&self) -> &str {
        &self.parent_dataset
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Derive the full dataset path for a volume
    pub fn dataset_name(&self, pv_name: &str) -> String {
        dataset_name(&self.parent_dataset, pv_name)
    }
}

/// `parent + "/" + pv_name`; the caller guarantees `pv_name` is unique
pub fn dataset_name(parent: &str, pv_name: &str) -> String {
    format!("{}/{}", parent, pv_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = ProvisionerConfig::new("tank/kubernetes", "pv.kubernetes.io/zfs", "node1").unwrap();
        assert_eq!(config.parent_dataset(), "tank/kubernetes");
        assert_eq!(config.instance_name(), "pv.kubernetes.io/zfs");
        assert_eq!(config.node_name(), "node1");
    }

    #[test]
    fn test_parent_dataset_slashes_rejected() {
        for parent in ["/tank", "tank/", "/tank/volume/", ""] {
            let err = ProvisionerConfig::new(parent, "pv.kubernetes.io/zfs", "node1").unwrap_err();
            assert!(matches!(err, ProvisionerError::InvalidConfig { .. }));
            assert!(err.to_string().contains("parentDataset"));
        }
    }

    #[test]
    fn test_missing_identity_rejected() {
        assert!(ProvisionerConfig::new("tank", "", "node1").is_err());
        assert!(ProvisionerConfig::new("tank", "pv.kubernetes.io/zfs", " ").is_err());
    }

    #[test]
    fn test_dataset_name() {
        assert_eq!(dataset_name("tank", "pvc-1"), "tank/pvc-1");
        assert_eq!(
            dataset_name("tank/kubernetes", "pvc-1234-abcd"),
            "tank/kubernetes/pvc-1234-abcd"
        );

        let config = ProvisionerConfig::new("rpool/volumes", "zfs", "node1").unwrap();
        assert_eq!(config.dataset_name("pvc-9"), "rpool/volumes/pvc-9");
    }
}
