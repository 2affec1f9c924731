use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::api::storage::v1::StorageClass;
use serde::{Deserialize, Serialize};

/// Annotation on the PersistentVolume recording the backing dataset
pub const DATASET_PATH_ANNOTATION: &str = "zfs.pv.kubernetes.io/zfs-dataset-path";

pub const REF_QUOTA_PROPERTY: &str = "refquota";
pub const REF_RESERVATION_PROPERTY: &str = "refreservation";
pub const MANAGED_BY_PROPERTY: &str = "io.kubernetes.pv.zfs:managed_by";
pub const RECLAIM_POLICY_PROPERTY: &str = "io.kubernetes.pv.zfs:reclaim_policy";

pub const ACCESS_MODE_READ_WRITE_ONCE: &str = "ReadWriteOnce";
pub const ACCESS_MODE_READ_WRITE_ONCE_POD: &str = "ReadWriteOncePod";

pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// Reclaim policy of a StorageClass / PersistentVolume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReclaimPolicy {
    Delete,
    Retain,
    Recycle,
}

impl ReclaimPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReclaimPolicy::Delete => "Delete",
            ReclaimPolicy::Retain => "Retain",
            ReclaimPolicy::Recycle => "Recycle",
        }
    }

    /// Parse the Kubernetes spelling of a reclaim policy
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Delete" => Some(ReclaimPolicy::Delete),
            "Retain" => Some(ReclaimPolicy::Retain),
            "Recycle" => Some(ReclaimPolicy::Recycle),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReclaimPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome reported to the external controller alongside a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    /// Nothing was changed; the controller may try again later
    NoChange,
    /// The call ran to completion, successfully or not
    Finished,
}

impl std::fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProvisioningState::NoChange => "no-change",
            ProvisioningState::Finished => "finished",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle of a single volume request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumePhase {
    Requested,
    Validating,
    Creating,
    PermissionsPending,
    Bound,
    Rejected,
    Failed,
    Destroying,
    Destroyed,
}

impl std::fmt::Display for VolumePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VolumePhase::Requested => "requested",
            VolumePhase::Validating => "validating",
            VolumePhase::Creating => "creating",
            VolumePhase::PermissionsPending => "permissions_pending",
            VolumePhase::Bound => "bound",
            VolumePhase::Rejected => "rejected",
            VolumePhase::Failed => "failed",
            VolumePhase::Destroying => "destroying",
            VolumePhase::Destroyed => "destroyed",
        };
        write!(f, "{}", s)
    }
}

/// A pending claim handed over by the external controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    /// Name the PersistentVolume must have; unique per claim
    pub pv_name: String,
    pub pvc: PersistentVolumeClaim,
    pub storage_class: StorageClass,
}

impl ProvisionRequest {
    pub fn new(pv_name: impl Into<String>, pvc: PersistentVolumeClaim, storage_class: StorageClass) -> Self {
        Self {
            pv_name: pv_name.into(),
            pvc,
            storage_class,
        }
    }

    /// Access modes requested on the claim
    pub fn access_modes(&self) -> &[String] {
        self.pvc
            .spec
            .as_ref()
            .and_then(|s| s.access_modes.as_deref())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reclaim_policy_parse() {
        assert_eq!(ReclaimPolicy::parse("Delete"), Some(ReclaimPolicy::Delete));
        assert_eq!(ReclaimPolicy::parse("Retain"), Some(ReclaimPolicy::Retain));
        assert_eq!(ReclaimPolicy::parse("Recycle"), Some(ReclaimPolicy::Recycle));
        assert_eq!(ReclaimPolicy::parse("delete"), None);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(VolumePhase::PermissionsPending.to_string(), "permissions_pending");
        assert_eq!(VolumePhase::Destroyed.to_string(), "destroyed");
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let doc = serde_json::json!({
            "pvName": "pvc-42",
            "pvc": {
                "apiVersion": "v1",
                "kind": "PersistentVolumeClaim",
                "metadata": { "name": "data" },
                "spec": { "accessModes": ["ReadWriteOnce"] }
            },
            "storageClass": {
                "apiVersion": "storage.k8s.io/v1",
                "kind": "StorageClass",
                "metadata": { "name": "zfs" },
                "provisioner": "pv.kubernetes.io/zfs"
            }
        });
        let request: ProvisionRequest = serde_json::from_value(doc).unwrap();
        assert_eq!(request.pv_name, "pvc-42");
        assert_eq!(request.access_modes(), ["ReadWriteOnce".to_string()]);
    }
}
