mod delete;
mod provision;

use crate::config::ProvisionerConfig;
use crate::dataset::DatasetGateway;
use crate::error::{ProvisionError, Result};
use crate::traits::VolumeProvisioner;
use crate::types::ProvisionRequest;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolume;
use std::sync::Arc;

/// Provisions PersistentVolumes as ZFS datasets below a single parent dataset
///
/// Holds no mutable state: every call works from the immutable configuration
/// and live engine state, so calls for distinct volumes can run concurrently.
pub struct ZfsProvisioner {
    gateway: Arc<dyn DatasetGateway>,
    config: ProvisionerConfig,
}

impl ZfsProvisioner {
    pub fn new(gateway: Arc<dyn DatasetGateway>, config: ProvisionerConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }
}

#[async_trait]
impl VolumeProvisioner for ZfsProvisioner {
    async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> std::result::Result<PersistentVolume, ProvisionError> {
        self.provision_volume(request).await
    }

    async fn delete(&self, volume: &PersistentVolume) -> Result<()> {
        self.delete_volume(volume).await
    }
}
