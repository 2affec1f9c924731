use crate::types::{ProvisioningState, VolumePhase};
use miette::Diagnostic;
use thiserror::Error;

/// Coarse classification of provisioner failures.
///
/// The external controller only needs to know whether retrying can help;
/// the kind answers that without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad policy parameters, unsupported access mode or reclaim policy
    Validation,
    /// The dataset does not exist
    NotFound,
    /// The dataset already exists
    AlreadyExists,
    /// The storage engine or permission helper reported a failure
    Engine,
    /// Missing volume metadata or malformed startup configuration
    Configuration,
}

/// Provisioner error type for dataset and volume operations
#[derive(Error, Debug, Diagnostic)]
pub enum ProvisionerError {
    /// Storage class parameter failed validation
    #[error("invalid '{parameter}' parameter value: {value}")]
    #[diagnostic(
        code(zfspv::provisioner::invalid_parameter),
        help("Fix the StorageClass parameters. '{parameter}' accepts 'true' or 'false'")
    )]
    InvalidParameter {
        #[allow(unused)]
        parameter: String,
        #[allow(unused)]
        value: String,
    },

    /// Requested access modes require multi-writer semantics
    #[error("access modes [{modes}] are not supported by this provisioner")]
    #[diagnostic(
        code(zfspv::provisioner::unsupported_access_mode),
        help("Request ReadWriteOnce or ReadWriteOncePod. ReadOnlyMany and ReadWriteMany are not supported")
    )]
    UnsupportedAccessMode {
        #[allow(unused)]
        modes: String,
    },

    /// Storage class asks for a reclaim policy we cannot honour
    #[error("unsupported reclaim policy of this provisioner: {policy}")]
    #[diagnostic(
        code(zfspv::provisioner::unsupported_reclaim_policy),
        help("Use the 'Delete' or 'Retain' reclaim policy on the StorageClass")
    )]
    UnsupportedReclaimPolicy {
        #[allow(unused)]
        policy: String,
    },

    /// The claim itself is malformed
    #[error("invalid volume request '{pv_name}': {message}")]
    #[diagnostic(
        code(zfspv::provisioner::invalid_request),
        help("The claim must request a positive 'storage' capacity")
    )]
    InvalidRequest {
        #[allow(unused)]
        pv_name: String,
        #[allow(unused)]
        message: String,
    },

    /// Dataset not found
    #[error("dataset not found: {dataset}")]
    #[diagnostic(
        code(zfspv::provisioner::dataset_not_found),
        help("Verify the dataset exists with `zfs list {dataset}`")
    )]
    DatasetNotFound {
        #[allow(unused)]
        dataset: String,
    },

    /// Dataset already exists
    #[error("dataset already exists: {dataset}")]
    #[diagnostic(
        code(zfspv::provisioner::dataset_already_exists),
        help("A previous attempt may have created it. Inspect it with `zfs get all {dataset}`")
    )]
    DatasetAlreadyExists {
        #[allow(unused)]
        dataset: String,
    },

    /// An existing dataset does not match the volume being provisioned
    #[error("existing dataset '{dataset}' does not match the request: {message}")]
    #[diagnostic(
        code(zfspv::provisioner::dataset_conflict),
        help("The dataset was not created by this provisioner for this claim. Rename or destroy it manually")
    )]
    DatasetConflict {
        #[allow(unused)]
        dataset: String,
        #[allow(unused)]
        message: String,
    },

    /// ZFS error
    #[error("ZFS operation failed: {message}")]
    #[diagnostic(
        code(zfspv::provisioner::zfs_error),
        help("Verify the parent dataset exists with `zfs list`. Ensure sufficient disk space and proper permissions")
    )]
    ZfsError {
        #[allow(unused)]
        message: String,
    },

    /// Command execution failed
    #[error("Command '{command}' failed with exit code {exit_code}")]
    #[diagnostic(code(zfspv::provisioner::command_failed), help("stderr: {stderr}"))]
    CommandFailed {
        #[allow(unused)]
        command: String,
        #[allow(unused)]
        exit_code: i32,
        #[allow(unused)]
        stderr: String,
    },

    /// Mountpoint permissions could not be updated
    #[error("could not update permissions on '{mountpoint}': {message}")]
    #[diagnostic(
        code(zfspv::provisioner::permissions_failed),
        help("Check that the dataset is mounted and that the provisioner runs with enough privileges")
    )]
    PermissionsFailed {
        #[allow(unused)]
        mountpoint: String,
        #[allow(unused)]
        message: String,
    },

    /// Volume metadata needed for deletion is missing
    #[error("annotation '{annotation}' not found or empty on volume '{volume}', cannot determine which ZFS dataset to destroy")]
    #[diagnostic(
        code(zfspv::provisioner::missing_annotation),
        help("Restore the annotation on the PersistentVolume or destroy the dataset manually")
    )]
    MissingAnnotation {
        #[allow(unused)]
        annotation: String,
        #[allow(unused)]
        volume: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(zfspv::provisioner::invalid_config), help("{suggestion}"))]
    InvalidConfig {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        suggestion: String,
    },

    /// Core library error
    #[error(transparent)]
    #[diagnostic(transparent)]
    CoreError(#[from] zfspv_core::CoreError),
}

/// Result type alias for provisioner operations
pub type Result<T> = std::result::Result<T, ProvisionerError>;

impl ProvisionerError {
    pub fn invalid_parameter(parameter: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    pub fn unsupported_access_mode(modes: &[String]) -> Self {
        Self::UnsupportedAccessMode {
            modes: modes.join(", "),
        }
    }

    pub fn unsupported_reclaim_policy(policy: impl Into<String>) -> Self {
        Self::UnsupportedReclaimPolicy {
            policy: policy.into(),
        }
    }

    pub fn invalid_request(pv_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            pv_name: pv_name.into(),
            message: message.into(),
        }
    }

    pub fn dataset_not_found(dataset: impl Into<String>) -> Self {
        Self::DatasetNotFound {
            dataset: dataset.into(),
        }
    }

    pub fn dataset_already_exists(dataset: impl Into<String>) -> Self {
        Self::DatasetAlreadyExists {
            dataset: dataset.into(),
        }
    }

    pub fn dataset_conflict(dataset: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DatasetConflict {
            dataset: dataset.into(),
            message: message.into(),
        }
    }

    pub fn zfs_error(message: impl Into<String>) -> Self {
        Self::ZfsError {
            message: message.into(),
        }
    }

    pub fn command_failed(
        command: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    pub fn permissions_failed(mountpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PermissionsFailed {
            mountpoint: mountpoint.into(),
            message: message.into(),
        }
    }

    pub fn missing_annotation(annotation: impl Into<String>, volume: impl Into<String>) -> Self {
        Self::MissingAnnotation {
            annotation: annotation.into(),
            volume: volume.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter { .. }
            | Self::UnsupportedAccessMode { .. }
            | Self::UnsupportedReclaimPolicy { .. }
            | Self::InvalidRequest { .. } => ErrorKind::Validation,
            Self::DatasetNotFound { .. } => ErrorKind::NotFound,
            Self::DatasetAlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::ZfsError { .. } | Self::CommandFailed { .. } | Self::PermissionsFailed { .. } => {
                ErrorKind::Engine
            }
            Self::DatasetConflict { .. }
            | Self::MissingAnnotation { .. }
            | Self::InvalidConfig { .. } => ErrorKind::Configuration,
            Self::CoreError(zfspv_core::CoreError::InvalidQuantity { .. }) => ErrorKind::Validation,
            Self::CoreError(_) => ErrorKind::Configuration,
        }
    }

    /// Whether re-invoking the same call can succeed without outside intervention
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Engine | ErrorKind::AlreadyExists)
    }
}

/// Failure of a provision call, annotated with where in the lifecycle it stopped.
#[derive(Error, Debug, Diagnostic)]
#[error("provisioning volume '{pv_name}' {terminal} during {phase}: {source}")]
#[diagnostic(code(zfspv::provisioner::provision_failed))]
pub struct ProvisionError {
    pub pv_name: String,
    /// Phase that was in progress when the failure happened
    pub phase: VolumePhase,
    /// Either `Rejected` or `Failed`
    pub terminal: VolumePhase,
    pub state: ProvisioningState,
    #[source]
    #[diagnostic_source]
    pub source: ProvisionerError,
}

impl ProvisionError {
    /// Policy, access mode or reclaim policy problems; nothing was created.
    pub fn rejected(
        pv_name: impl Into<String>,
        phase: VolumePhase,
        state: ProvisioningState,
        source: ProvisionerError,
    ) -> Self {
        Self {
            pv_name: pv_name.into(),
            phase,
            terminal: VolumePhase::Rejected,
            state,
            source,
        }
    }

    /// Engine-side failures while creating or preparing the dataset.
    pub fn failed(pv_name: impl Into<String>, phase: VolumePhase, source: ProvisionerError) -> Self {
        Self {
            pv_name: pv_name.into(),
            phase,
            terminal: VolumePhase::Failed,
            state: ProvisioningState::Finished,
            source,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ProvisionerError::invalid_parameter("reserveSpace", "maybe").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ProvisionerError::dataset_not_found("tank/pv").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ProvisionerError::command_failed("zfs destroy -r tank/pv", 1, "dataset is busy").kind(),
            ErrorKind::Engine
        );
        assert_eq!(
            ProvisionerError::missing_annotation("a", "pv").kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_retryable() {
        assert!(ProvisionerError::zfs_error("busy").is_retryable());
        assert!(ProvisionerError::dataset_already_exists("tank/pv").is_retryable());
        assert!(!ProvisionerError::unsupported_reclaim_policy("Recycle").is_retryable());
        assert!(!ProvisionerError::invalid_config("bad", "fix it").is_retryable());
    }

    #[test]
    fn test_invalid_parameter_message_names_parameter() {
        let err = ProvisionerError::invalid_parameter("reserveSpace", "maybe");
        assert_eq!(
            err.to_string(),
            "invalid 'reserveSpace' parameter value: maybe"
        );
    }

    #[test]
    fn test_provision_error_carries_phase() {
        let err = ProvisionError::failed(
            "pv-1",
            VolumePhase::Creating,
            ProvisionerError::zfs_error("out of space"),
        );
        assert_eq!(err.phase, VolumePhase::Creating);
        assert_eq!(err.terminal, VolumePhase::Failed);
        assert_eq!(err.state, ProvisioningState::Finished);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("pv-1"));
    }
}
