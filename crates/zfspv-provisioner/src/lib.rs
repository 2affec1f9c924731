// Allow unused assignments for diagnostic fields - they're used by the thiserror/miette macros
#![allow(unused_assignments)]

pub mod command;
pub mod config;
pub mod dataset;
pub mod error;
pub mod parameters;
pub mod provisioner;
pub mod traits;
pub mod types;

// Re-export primary types
pub use config::{dataset_name, ProvisionerConfig, DEFAULT_INSTANCE_NAME, DEFAULT_PARENT_DATASET};
pub use error::{ErrorKind, ProvisionError, ProvisionerError, Result};
pub use parameters::{Policy, RESERVE_SPACE_PARAMETER};
pub use provisioner::ZfsProvisioner;
pub use traits::VolumeProvisioner;
pub use types::{
    ProvisionRequest, ProvisioningState, ReclaimPolicy, VolumePhase, DATASET_PATH_ANNOTATION,
    MANAGED_BY_PROPERTY, RECLAIM_POLICY_PROPERTY, REF_QUOTA_PROPERTY, REF_RESERVATION_PROPERTY,
};

// Re-export dataset gateway types
pub use dataset::{
    Dataset, DatasetGateway, DatasetProperties, MockDatasetGateway, PermissionStrategy,
    ZfsDatasetGateway, PERMISSION_HELPER,
};
