use crate::error::{ProvisionerError, Result};
use std::collections::BTreeMap;

/// StorageClass parameter controlling thick vs thin provisioning
pub const RESERVE_SPACE_PARAMETER: &str = "reserveSpace";

/// Provisioning policy resolved from StorageClass parameters.
///
/// Expected StorageClass schema:
///
/// ```yaml
/// parameters:
///   reserveSpace: "true" | "false"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Set a reservation equal to the quota so the capacity is guaranteed
    pub reserve_space: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            reserve_space: true,
        }
    }
}

impl Policy {
    /// Validate StorageClass parameters. Unknown keys are ignored.
    pub fn from_parameters(parameters: &BTreeMap<String, String>) -> Result<Self> {
        let reserve_space = match parameters.get(RESERVE_SPACE_PARAMETER) {
            None => true,
            Some(v) if v.eq_ignore_ascii_case("true") => true,
            Some(v) if v.eq_ignore_ascii_case("false") => false,
            Some(v) => {
                return Err(ProvisionerError::invalid_parameter(
                    RESERVE_SPACE_PARAMETER,
                    v,
                ))
            }
        };

        Ok(Self { reserve_space })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Option<&str>) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Some(v) = value {
            map.insert(RESERVE_SPACE_PARAMETER.to_string(), v.to_string());
        }
        map
    }

    #[test]
    fn test_reserve_space_defaults_to_true() {
        let policy = Policy::from_parameters(&params(None)).unwrap();
        assert!(policy.reserve_space);
        assert_eq!(policy, Policy::default());
    }

    #[test]
    fn test_reserve_space_case_insensitive() {
        for value in ["true", "TRUE", "True"] {
            assert!(Policy::from_parameters(&params(Some(value))).unwrap().reserve_space);
        }
        for value in ["false", "FALSE", "fAlSe"] {
            assert!(!Policy::from_parameters(&params(Some(value))).unwrap().reserve_space);
        }
    }

    #[test]
    fn test_invalid_value_names_parameter() {
        for value in ["yes", "1", "", " true"] {
            let err = Policy::from_parameters(&params(Some(value))).unwrap_err();
            assert!(err.to_string().contains(RESERVE_SPACE_PARAMETER));
            assert!(matches!(err, ProvisionerError::InvalidParameter { .. }));
        }
    }

    #[test]
    fn test_unknown_parameters_ignored() {
        let mut map = params(Some("false"));
        map.insert("fsType".to_string(), "zfs".to_string());
        assert!(!Policy::from_parameters(&map).unwrap().reserve_space);
    }
}
