use crate::command;
use crate::error::{ProvisionerError, Result};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tracing::{debug, info};

/// Executable that propagates permissions when installed on `PATH`
pub const PERMISSION_HELPER: &str = "update-permissions";

const GROUP_WRITE: u32 = 0o020;

/// How a freshly mounted dataset is opened up to non-root workloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionStrategy {
    /// Run an external helper with the mountpoint as its only argument
    Helper(PathBuf),
    /// Add the group-write bit to the mountpoint's current mode
    GroupWrite,
}

impl PermissionStrategy {
    /// Prefer the helper if it can be found on `PATH`
    pub fn detect() -> Self {
        match which::which(PERMISSION_HELPER) {
            Ok(path) => Self::Helper(path),
            Err(_) => Self::GroupWrite,
        }
    }

    pub async fn apply(&self, mountpoint: &str) -> Result<()> {
        if mountpoint.is_empty() {
            return Err(ProvisionerError::permissions_failed(
                mountpoint,
                "undefined mountpoint",
            ));
        }

        match self {
            Self::Helper(helper) => {
                debug!("Running {} on {}", helper.display(), mountpoint);
                let output = command::run_unchecked(helper, &[mountpoint]).await?;
                if !output.success() {
                    let combined = [output.stdout.trim(), output.stderr.trim()]
                        .into_iter()
                        .filter(|s| !s.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ");
                    return Err(ProvisionerError::permissions_failed(
                        mountpoint,
                        format!(
                            "{} exited with code {}: {}",
                            helper.display(),
                            output.exit_code,
                            combined
                        ),
                    ));
                }
            }
            Self::GroupWrite => {
                let metadata = tokio::fs::symlink_metadata(mountpoint)
                    .await
                    .map_err(|e| ProvisionerError::permissions_failed(mountpoint, e.to_string()))?;
                let mut perms = metadata.permissions();
                perms.set_mode(perms.mode() | GROUP_WRITE);
                tokio::fs::set_permissions(mountpoint, perms)
                    .await
                    .map_err(|e| ProvisionerError::permissions_failed(mountpoint, e.to_string()))?;
            }
        }

        info!("Permissions updated on {}", mountpoint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_group_write_adds_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap().to_string();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();

        PermissionStrategy::GroupWrite.apply(&path).await.unwrap();

        let mode = std::fs::metadata(dir.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o775);
    }

    #[tokio::test]
    async fn test_empty_mountpoint_rejected() {
        let result = PermissionStrategy::GroupWrite.apply("").await;
        assert!(matches!(
            result,
            Err(ProvisionerError::PermissionsFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_mountpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-mounted");
        let result = PermissionStrategy::GroupWrite
            .apply(missing.to_str().unwrap())
            .await;
        assert!(matches!(
            result,
            Err(ProvisionerError::PermissionsFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_failing_helper_reports_permissions_failed() {
        let Ok(helper) = which::which("false") else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let result = PermissionStrategy::Helper(helper)
            .apply(dir.path().to_str().unwrap())
            .await;
        assert!(matches!(
            result,
            Err(ProvisionerError::PermissionsFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_successful_helper() {
        let Ok(helper) = which::which("true") else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        PermissionStrategy::Helper(helper)
            .apply(dir.path().to_str().unwrap())
            .await
            .unwrap();
    }
}
