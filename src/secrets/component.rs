//! Named component descriptors and per-store secret scopes.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::metadata::ComponentMetadata;

/// Default access policy of a secret scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    #[default]
    Allow,
    Deny,
}

/// Which secret names callers may read from a store.
///
/// Evaluation order:
/// 1. a non-empty `allowed_secrets` list allows exactly the listed names;
/// 2. otherwise a name in `denied_secrets` is refused;
/// 3. otherwise `default_access` decides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecretScope {
    pub default_access: Access,
    pub allowed_secrets: Vec<String>,
    pub denied_secrets: Vec<String>,
}

impl SecretScope {
    /// A scope that only allows the listed secrets
    pub fn allow_only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { allowed_secrets: names.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    pub fn is_secret_allowed(&self, name: &str) -> bool {
        if !self.allowed_secrets.is_empty() {
            return self.allowed_secrets.iter().any(|s| s == name);
        }

        if self.denied_secrets.iter().any(|s| s == name) {
            return false;
        }

        self.default_access == Access::Allow
    }

    /// True when the scope cannot refuse anything
    pub fn is_unrestricted(&self) -> bool {
        self.allowed_secrets.is_empty()
            && self.denied_secrets.is_empty()
            && self.default_access == Access::Allow
    }
}

/// Configuration of one named store instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ComponentDescriptor {
    /// User-chosen store name callers address
    #[validate(length(min = 1, message = "Component name cannot be empty"))]
    pub name: String,

    /// Registered backend type, e.g. `kubernetes` or `secretstores.local.file`
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "Component type cannot be empty"))]
    pub backend_type: String,

    #[serde(default)]
    pub metadata: ComponentMetadata,

    #[serde(default)]
    pub scope: SecretScope,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>, backend_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend_type: backend_type.into(),
            metadata: ComponentMetadata::default(),
            scope: SecretScope::default(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn with_scope(mut self, scope: SecretScope) -> Self {
        self.scope = scope;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_scope_allows_everything() {
        let scope = SecretScope::default();
        assert!(scope.is_unrestricted());
        assert!(scope.is_secret_allowed("anything"));
    }

    #[test]
    fn test_allowed_list_wins_over_default_deny() {
        let scope = SecretScope {
            default_access: Access::Deny,
            allowed_secrets: vec!["db".to_string()],
            denied_secrets: vec![],
        };
        assert!(scope.is_secret_allowed("db"));
        assert!(!scope.is_secret_allowed("api"));
    }

    #[test]
    fn test_denied_list_with_default_allow() {
        let scope = SecretScope {
            denied_secrets: vec!["root-token".to_string()],
            ..Default::default()
        };
        assert!(!scope.is_secret_allowed("root-token"));
        assert!(scope.is_secret_allowed("db"));
    }

    #[test]
    fn test_default_deny() {
        let scope = SecretScope { default_access: Access::Deny, ..Default::default() };
        assert!(!scope.is_secret_allowed("db"));
        assert!(!scope.is_unrestricted());
    }

    #[test]
    fn test_descriptor_deserialization() {
        let json = r#"{
            "name": "cluster",
            "type": "secretstores.kubernetes",
            "metadata": {"defaultNamespace": "prod"},
            "scope": {"defaultAccess": "deny", "allowedSecrets": ["db"]}
        }"#;
        let descriptor: ComponentDescriptor = serde_json::from_str(json).unwrap();

        assert_eq!(descriptor.backend_type, "secretstores.kubernetes");
        assert_eq!(descriptor.metadata.get("defaultNamespace"), Some("prod"));
        assert_eq!(descriptor.scope.default_access, Access::Deny);
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_descriptor_validation() {
        let descriptor = ComponentDescriptor::new("", "local.env");
        assert!(descriptor.validate().is_err());
    }

    proptest! {
        #[test]
        fn allowed_list_admits_only_members(
            allowed in proptest::collection::vec("[a-z]{1,6}", 1..5),
            probe in "[a-z]{1,6}",
        ) {
            let scope = SecretScope::allow_only(allowed.clone());
            prop_assert_eq!(scope.is_secret_allowed(&probe), allowed.contains(&probe));
        }
    }
}
