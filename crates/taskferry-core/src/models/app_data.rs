//! Aggregate snapshot exchanged between replicas

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity::{Area, Project, Section, Task};
use super::settings::Settings;

/// The whole replica: four entity collections plus settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppData {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub areas: Vec<Area>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl AppData {
    /// Copy suitable for the remote replica.
    #[must_use]
    pub fn for_remote(&self) -> Self {
        Self {
            settings: self.settings.for_remote(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_collections_default_to_empty() {
        let data: AppData = serde_json::from_value(json!({"tasks": [], "settings": {}})).unwrap();
        assert!(data.projects.is_empty());
        assert!(data.areas.is_empty());
    }

    #[test]
    fn unknown_top_level_keys_survive() {
        let raw = json!({
            "tasks": [],
            "projects": [],
            "sections": [],
            "areas": [],
            "settings": {},
            "schemaVersion": 4
        });
        let data: AppData = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&data).unwrap(), raw);
    }
}
