//! External directory entries whose capabilities are advertised by this node

use serde::{Deserialize, Serialize};

/// An entity of the external context broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEntity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Advertisable capabilities, one directory service per name
    #[serde(default)]
    pub services: Vec<String>,
}

impl ExternalEntity {
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>, services: Vec<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            services,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_configured_entity() {
        let entity: ExternalEntity =
            serde_json::from_str(r#"{"id":"urn:room:1","type":"Room","services":["temperature"]}"#).unwrap();
        assert_eq!(entity.services, vec!["temperature"]);
        assert_eq!(entity, ExternalEntity::new("urn:room:1", "Room", vec!["temperature".to_string()]));

        let bare: ExternalEntity = serde_json::from_str(r#"{"id":"urn:door:4","type":"Door"}"#).unwrap();
        assert!(bare.services.is_empty());
    }
}
