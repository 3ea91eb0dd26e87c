//! Small records exchanged with the server.

use serde::{Deserialize, Serialize};

/// A taxonomy type, e.g. "Browser" or "OS".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyType {
    /// Server id
    pub id: u64,
    /// Display name
    pub name: String,
}

impl TaxonomyType {
    /// Creates a new `TaxonomyType`.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Identifies the calling CI plugin when it polls the server for tasks.
///
/// # Examples
///
/// ```
/// use mqm_rest::model::AbridgedTaskPluginInfo;
///
/// let info = AbridgedTaskPluginInfo::default()
///     .with_self_identity("ci-1")
///     .with_api_version(1)
///     .with_plugin_version("5.0.1");
/// assert_eq!(info.self_identity.as_deref(), Some("ci-1"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbridgedTaskPluginInfo {
    /// Unique identity of the CI server instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_identity: Option<String>,
    /// CI server type, e.g. `jenkins`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_type: Option<String>,
    /// Public URL of the CI server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_location: Option<String>,
    /// Task API version spoken by the plugin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_version: Option<String>,
    /// User the CI server runs jobs as
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ci_server_user: Option<String>,
    /// User the plugin authenticates to the server as
    #[serde(skip_serializing_if = "Option::is_none")]
    pub octane_user: Option<String>,
}

impl AbridgedTaskPluginInfo {
    pub fn with_self_identity(mut self, value: impl Into<String>) -> Self {
        self.self_identity = Some(value.into());
        self
    }

    pub fn with_self_type(mut self, value: impl Into<String>) -> Self {
        self.self_type = Some(value.into());
        self
    }

    pub fn with_self_location(mut self, value: impl Into<String>) -> Self {
        self.self_location = Some(value.into());
        self
    }

    pub fn with_api_version(mut self, value: u32) -> Self {
        self.api_version = Some(value);
        self
    }

    pub fn with_sdk_version(mut self, value: impl Into<String>) -> Self {
        self.sdk_version = Some(value.into());
        self
    }

    pub fn with_plugin_version(mut self, value: impl Into<String>) -> Self {
        self.plugin_version = Some(value.into());
        self
    }

    pub fn with_ci_server_user(mut self, value: impl Into<String>) -> Self {
        self.ci_server_user = Some(value.into());
        self
    }

    pub fn with_octane_user(mut self, value: impl Into<String>) -> Self {
        self.octane_user = Some(value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{decode_paged_list, serde_factory};

    #[test]
    fn test_taxonomy_types_decode_as_page() {
        let page = decode_paged_list(
            r#"{"data":[{"id":1,"name":"Browser"},{"id":2,"name":"OS","type":"taxonomy_category"}],"total_count":7}"#,
            0,
            &serde_factory::<TaxonomyType>(),
        )
        .unwrap();

        assert_eq!(
            page.items,
            vec![TaxonomyType::new(1, "Browser"), TaxonomyType::new(2, "OS")]
        );
        assert_eq!(page.total_count, 7);
    }

    #[test]
    fn test_plugin_info_omits_unset_fields() {
        let info = AbridgedTaskPluginInfo::default()
            .with_self_type("jenkins")
            .with_ci_server_user("builder")
            .with_octane_user("sa@nga");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "self_type": "jenkins",
                "ci_server_user": "builder",
                "octane_user": "sa@nga"
            })
        );
    }
}
