use crate::error::{ProvisionError, Result};
use crate::types::ProvisionRequest;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolume;

/// Protocol the external provisioning controller drives
///
/// The controller discovers pending claims and released volumes, then calls
/// into this trait. Retrying is its decision: a `ProvisionError` carries the
/// `ProvisioningState` and retryability it needs.
#[async_trait]
pub trait VolumeProvisioner: Send + Sync {
    /// Create backing storage for a claim and describe it as a PersistentVolume
    async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> std::result::Result<PersistentVolume, ProvisionError>;

    /// Tear down the storage behind a released PersistentVolume
    async fn delete(&self, volume: &PersistentVolume) -> Result<()>;
}
