use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An installed extension as reported by the frontend snapshot
/// (`rdctl api /v1/extensions`). Input only, never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledExtension {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

impl InstalledExtension {
    pub fn new(name: impl Into<String>, tag: Option<&str>) -> Self {
        Self {
            name: name.into(),
            tag: tag.map(str::to_string),
            labels: HashMap::new(),
        }
    }

    /// Canonical `name:tag` form used for the owner-installed comparison.
    /// A missing tag is treated as `latest`, matching the image default.
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.name, self.tag.as_deref().unwrap_or("latest"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_includes_tag() {
        let ext = InstalledExtension::new("ghcr.io/acme/fleet-gitops", Some("1.2.0"));
        assert_eq!(ext.full_name(), "ghcr.io/acme/fleet-gitops:1.2.0");
    }

    #[test]
    fn missing_tag_defaults_to_latest() {
        let ext = InstalledExtension::new("fleet-gitops", None);
        assert_eq!(ext.full_name(), "fleet-gitops:latest");
    }

    #[test]
    fn deserializes_from_frontend_json() {
        let ext: InstalledExtension = serde_json::from_str(
            r#"{"name":"fleet-gitops","tag":"1.0","labels":{"io.rancher-desktop.fleet.type":"base"}}"#,
        )
        .unwrap();
        assert_eq!(ext.full_name(), "fleet-gitops:1.0");
        assert_eq!(
            ext.labels.get("io.rancher-desktop.fleet.type").map(String::as_str),
            Some("base")
        );
    }
}
