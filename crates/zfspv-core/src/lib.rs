//! zfspv Core - Shared types for the ZFS persistent volume provisioner
//!
//! This crate provides:
//! - Re-exports of the Kubernetes objects the provisioner consumes and produces
//! - Storage quantity parsing
//! - Error types with miette diagnostics
//! - Serialization helpers

pub mod error;
pub mod quantities;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use quantities::{parse_storage, quantity_bytes, STORAGE_RESOURCE};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
pub use k8s_openapi::api::storage::v1::StorageClass;
pub use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Serialize a resource to pretty JSON
pub fn to_json_pretty<T: serde::Serialize>(resource: &T) -> Result<String> {
    serde_json::to_string_pretty(resource).map_err(|e| {
        CoreError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Serialize a resource to YAML
pub fn to_yaml<T: serde::Serialize>(resource: &T) -> Result<String> {
    serde_yaml::to_string(resource).map_err(|e| {
        CoreError::serialization_error(
            format!("Failed to serialize to YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a resource from JSON or YAML.
///
/// Documents whose first non-blank character is `{` are read as JSON, everything
/// else as YAML.
pub fn from_document<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    if data.trim_start().starts_with('{') {
        serde_json::from_str(data).map_err(|e| {
            CoreError::serialization_error(
                format!("Failed to deserialize from JSON: {}", e),
                Some(Box::new(e)),
            )
        })
    } else {
        serde_yaml::from_str(data).map_err(|e| {
            CoreError::serialization_error(
                format!("Failed to deserialize from YAML: {}", e),
                Some(Box::new(e)),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_document() {
        let mut pv = PersistentVolume::default();
        pv.metadata.name = Some("pvc-1234".to_string());

        let json = to_json_pretty(&pv).unwrap();
        assert!(json.contains("pvc-1234"));

        let parsed: PersistentVolume = from_document(&json).unwrap();
        assert_eq!(parsed.metadata.name, Some("pvc-1234".to_string()));
    }

    #[test]
    fn test_yaml_document() {
        let doc = "apiVersion: v1\nkind: PersistentVolume\nmetadata:\n  name: pvc-5678\n";
        let parsed: PersistentVolume = from_document(doc).unwrap();
        assert_eq!(parsed.metadata.name, Some("pvc-5678".to_string()));

        let yaml = to_yaml(&parsed).unwrap();
        assert!(yaml.contains("pvc-5678"));
    }

    #[test]
    fn test_invalid_document() {
        let result: Result<PersistentVolume> = from_document("{ not json");
        assert!(matches!(result, Err(CoreError::SerializationError { .. })));
    }
}
