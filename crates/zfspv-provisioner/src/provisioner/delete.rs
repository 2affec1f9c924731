use super::ZfsProvisioner;
use crate::dataset::Dataset;
use crate::error::{ProvisionerError, Result};
use crate::types::{VolumePhase, DATASET_PATH_ANNOTATION};
use k8s_openapi::api::core::v1::PersistentVolume;
use tracing::{info, warn};

impl ZfsProvisioner {
    /// Destroy the dataset recorded on the volume, recursively.
    ///
    /// Only the dataset-path annotation is consulted. A dataset that is already
    /// gone counts as deleted.
    pub(super) async fn delete_volume(&self, volume: &PersistentVolume) -> Result<()> {
        let volume_name = volume.metadata.name.as_deref().unwrap_or("<unnamed>");

        let dataset_path = volume
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(DATASET_PATH_ANNOTATION))
            .filter(|path| !path.is_empty())
            .ok_or_else(|| {
                ProvisionerError::missing_annotation(DATASET_PATH_ANNOTATION, volume_name)
            })?;

        info!(
            "Volume {} is {}: dataset {}",
            volume_name,
            VolumePhase::Destroying,
            dataset_path
        );

        match self
            .gateway
            .destroy(&Dataset::named(dataset_path.as_str()), true)
            .await
        {
            Ok(()) => {}
            Err(ProvisionerError::DatasetNotFound { .. }) => {
                info!("Dataset {} already absent", dataset_path);
            }
            Err(e) => {
                warn!("Destroying dataset {} failed: {}", dataset_path, e);
                return Err(e);
            }
        }

        info!("Volume {} is {}", volume_name, VolumePhase::Destroyed);
        Ok(())
    }
}
