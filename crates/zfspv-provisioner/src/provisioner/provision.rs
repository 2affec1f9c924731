use super::ZfsProvisioner;
use crate::dataset::{Dataset, DatasetProperties};
use crate::error::{ProvisionError, ProvisionerError, Result};
use crate::parameters::Policy;
use crate::types::*;
use k8s_openapi::api::core::v1::{
    HostPathVolumeSource, NodeSelector, NodeSelectorRequirement, NodeSelectorTerm,
    PersistentVolume, PersistentVolumeSpec, VolumeNodeAffinity,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use zfspv_core::{quantity_bytes, STORAGE_RESOURCE};

/// Everything validation derives from a request before touching storage
struct ValidatedRequest {
    policy: Policy,
    reclaim_policy: ReclaimPolicy,
    capacity: Quantity,
    capacity_bytes: u64,
}

impl ZfsProvisioner {
    pub(super) async fn provision_volume(
        &self,
        request: &ProvisionRequest,
    ) -> std::result::Result<PersistentVolume, ProvisionError> {
        let pv_name = request.pv_name.as_str();
        info!("Provisioning volume {}", pv_name);

        debug!("Volume {} is {}", pv_name, VolumePhase::Validating);
        let validated = self.validate(request)?;

        debug!("Volume {} is {}", pv_name, VolumePhase::Creating);
        let dataset_name = self.config.dataset_name(pv_name);
        let properties = self.dataset_properties(&validated);
        let dataset = self
            .create_or_adopt(&dataset_name, &properties, validated.policy)
            .await
            .map_err(|e| {
                warn!("Creating dataset {} failed: {}", dataset_name, e);
                ProvisionError::failed(pv_name, VolumePhase::Creating, e)
            })?;
        info!("Dataset created: {}", dataset.name);

        debug!("Volume {} is {}", pv_name, VolumePhase::PermissionsPending);
        self.gateway.set_permissions(&dataset).await.map_err(|e| {
            warn!(
                "Updating permissions on {} failed, leaving dataset for retry: {}",
                dataset.name, e
            );
            ProvisionError::failed(pv_name, VolumePhase::PermissionsPending, e)
        })?;

        let volume = self.build_volume(request, &dataset, &validated);
        info!("Volume {} is {} to dataset {}", pv_name, VolumePhase::Bound, dataset.name);
        Ok(volume)
    }

    /// Reject anything that must not reach the engine
    fn validate(
        &self,
        request: &ProvisionRequest,
    ) -> std::result::Result<ValidatedRequest, ProvisionError> {
        let pv_name = request.pv_name.as_str();
        let reject = |state, e: ProvisionerError| {
            warn!("Rejecting volume {}: {}", pv_name, e);
            ProvisionError::rejected(pv_name, VolumePhase::Validating, state, e)
        };

        let parameters = request
            .storage_class
            .parameters
            .clone()
            .unwrap_or_default();
        let policy = Policy::from_parameters(&parameters)
            .map_err(|e| reject(ProvisioningState::NoChange, e))?;

        if pv_name.is_empty() || pv_name.contains('/') {
            return Err(reject(
                ProvisioningState::Finished,
                ProvisionerError::invalid_request(pv_name, "volume name must be a single path component"),
            ));
        }

        let access_modes = request.access_modes();
        if !access_modes
            .iter()
            .any(|m| m == ACCESS_MODE_READ_WRITE_ONCE || m == ACCESS_MODE_READ_WRITE_ONCE_POD)
        {
            return Err(reject(
                ProvisioningState::Finished,
                ProvisionerError::unsupported_access_mode(access_modes),
            ));
        }

        let reclaim_policy = match request.storage_class.reclaim_policy.as_deref() {
            // Kubernetes defaults an unset reclaim policy to Delete
            None => ReclaimPolicy::Delete,
            Some(raw) => match ReclaimPolicy::parse(raw) {
                Some(ReclaimPolicy::Recycle) | None => {
                    return Err(reject(
                        ProvisioningState::Finished,
                        ProvisionerError::unsupported_reclaim_policy(raw),
                    ))
                }
                Some(policy) => policy,
            },
        };

        let capacity = request
            .pvc
            .spec
            .as_ref()
            .and_then(|s| s.resources.as_ref())
            .and_then(|r| r.requests.as_ref())
            .and_then(|r| r.get(STORAGE_RESOURCE))
            .cloned()
            .ok_or_else(|| {
                reject(
                    ProvisioningState::Finished,
                    ProvisionerError::invalid_request(pv_name, "no storage capacity requested"),
                )
            })?;
        let capacity_bytes = quantity_bytes(&capacity)
            .map_err(|e| reject(ProvisioningState::Finished, e.into()))?;
        if capacity_bytes == 0 {
            return Err(reject(
                ProvisioningState::Finished,
                ProvisionerError::invalid_request(pv_name, "requested storage capacity is zero"),
            ));
        }

        Ok(ValidatedRequest {
            policy,
            reclaim_policy,
            capacity,
            capacity_bytes,
        })
    }

    fn dataset_properties(&self, validated: &ValidatedRequest) -> DatasetProperties {
        let bytes = validated.capacity_bytes.to_string();
        let mut properties = DatasetProperties::new();
        properties.insert(REF_QUOTA_PROPERTY.to_string(), bytes.clone());
        if validated.policy.reserve_space {
            properties.insert(REF_RESERVATION_PROPERTY.to_string(), bytes);
        }
        properties.insert(
            MANAGED_BY_PROPERTY.to_string(),
            self.config.instance_name().to_string(),
        );
        properties.insert(
            RECLAIM_POLICY_PROPERTY.to_string(),
            validated.reclaim_policy.to_string(),
        );
        properties
    }

    /// Create the dataset, or adopt one a previous attempt already created.
    ///
    /// The name mapping is deterministic, so an existing dataset carrying our
    /// identity and the same sizing is the leftover of an earlier try of this
    /// very request.
    async fn create_or_adopt(
        &self,
        name: &str,
        properties: &DatasetProperties,
        policy: Policy,
    ) -> Result<Dataset> {
        match self.gateway.create(name, properties).await {
            Ok(dataset) => Ok(dataset),
            Err(ProvisionerError::DatasetAlreadyExists { .. }) => {
                info!("Dataset {} already exists, reconciling", name);
                let existing = match self.gateway.get(name).await {
                    Ok(existing) => existing,
                    // Destroyed between the create and the lookup
                    Err(ProvisionerError::DatasetNotFound { .. }) => {
                        return Err(ProvisionerError::zfs_error(format!(
                            "dataset {} vanished while reconciling an existing create",
                            name
                        )));
                    }
                    Err(e) => return Err(e),
                };
                verify_existing(&existing, properties, policy)?;
                Ok(existing)
            }
            Err(e) => Err(e),
        }
    }

    fn build_volume(
        &self,
        request: &ProvisionRequest,
        dataset: &Dataset,
        validated: &ValidatedRequest,
    ) -> PersistentVolume {
        let mut annotations = request.pvc.metadata.annotations.clone().unwrap_or_default();
        annotations.insert(DATASET_PATH_ANNOTATION.to_string(), dataset.name.clone());

        let access_mode = if request
            .access_modes()
            .iter()
            .any(|m| m == ACCESS_MODE_READ_WRITE_ONCE_POD)
        {
            ACCESS_MODE_READ_WRITE_ONCE_POD
        } else {
            ACCESS_MODE_READ_WRITE_ONCE
        };

        PersistentVolume {
            metadata: ObjectMeta {
                name: Some(request.pv_name.clone()),
                labels: request.pvc.metadata.labels.clone(),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: Some(PersistentVolumeSpec {
                persistent_volume_reclaim_policy: Some(validated.reclaim_policy.to_string()),
                access_modes: Some(vec![access_mode.to_string()]),
                capacity: Some(BTreeMap::from([(
                    STORAGE_RESOURCE.to_string(),
                    validated.capacity.clone(),
                )])),
                host_path: Some(HostPathVolumeSource {
                    path: dataset.mountpoint.clone(),
                    type_: Some("Directory".to_string()),
                }),
                node_affinity: Some(self.node_affinity()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn node_affinity(&self) -> VolumeNodeAffinity {
        VolumeNodeAffinity {
            required: Some(NodeSelector {
                node_selector_terms: vec![NodeSelectorTerm {
                    match_expressions: Some(vec![NodeSelectorRequirement {
                        key: HOSTNAME_LABEL.to_string(),
                        operator: "In".to_string(),
                        values: Some(vec![self.config.node_name().to_string()]),
                    }]),
                    match_fields: None,
                }],
            }),
        }
    }
}

/// Check that an existing dataset is the one this request would have created
fn verify_existing(existing: &Dataset, expected: &DatasetProperties, policy: Policy) -> Result<()> {
    let owner = expected
        .get(MANAGED_BY_PROPERTY)
        .map(String::as_str)
        .unwrap_or_default();
    match existing.property(MANAGED_BY_PROPERTY) {
        Some(actual) if actual == owner => {}
        actual => {
            return Err(ProvisionerError::dataset_conflict(
                &existing.name,
                format!("managed by '{}', expected '{}'", actual.unwrap_or("nobody"), owner),
            ))
        }
    }

    let quota = expected
        .get(REF_QUOTA_PROPERTY)
        .map(String::as_str)
        .unwrap_or_default();
    if existing.property(REF_QUOTA_PROPERTY) != Some(quota) {
        return Err(ProvisionerError::dataset_conflict(
            &existing.name,
            format!(
                "{} is '{}', expected '{}'",
                REF_QUOTA_PROPERTY,
                existing.property(REF_QUOTA_PROPERTY).unwrap_or("none"),
                quota
            ),
        ));
    }

    let reservation = existing.property(REF_RESERVATION_PROPERTY);
    let reservation_matches = if policy.reserve_space {
        reservation == Some(quota)
    } else {
        matches!(reservation, None | Some("0") | Some("none"))
    };
    if !reservation_matches {
        return Err(ProvisionerError::dataset_conflict(
            &existing.name,
            format!(
                "{} is '{}' but reserveSpace is {}",
                REF_RESERVATION_PROPERTY,
                reservation.unwrap_or("none"),
                policy.reserve_space
            ),
        ));
    }

    Ok(())
}
