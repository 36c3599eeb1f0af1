//! The current user, as known to the dispatch registry.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::facade::Identify;
use crate::path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserContext {
    id: Option<String>,
    traits: Value,
}

impl Default for UserContext {
    fn default() -> Self {
        Self::new(None, Map::new())
    }
}

impl UserContext {
    pub fn new(id: Option<String>, traits: Map<String, Value>) -> Self {
        Self {
            id,
            traits: Value::Object(traits),
        }
    }

    /// The user id, if present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn traits(&self) -> &Value {
        &self.traits
    }

    /// Dotted-path lookup into the trait mapping.
    pub fn trait_value(&self, trait_path: &str) -> Option<&Value> {
        path::get(&self.traits, trait_path)
    }

    /// Adopt the identify's user id (when present) and merge its traits over
    /// the existing ones.
    pub(crate) fn identify(&mut self, identify: &Identify) {
        if let Some(id) = identify.user_id() {
            self.id = Some(id.to_string());
        }
        if let (Value::Object(existing), Value::Object(incoming)) =
            (&mut self.traits, identify.traits())
        {
            for (key, value) in incoming {
                existing.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_id_is_absent() {
        let user = UserContext::new(Some(String::new()), Map::new());
        assert!(user.id().is_none());
    }

    #[test]
    fn test_identify_merges_traits() {
        let mut user = UserContext::default();
        user.identify(&Identify::new(Some("u-1"), json!({ "plan": "free", "age": 30 })));
        user.identify(&Identify::new(None, json!({ "plan": "pro" })));

        assert_eq!(user.id(), Some("u-1"));
        assert_eq!(user.trait_value("plan"), Some(&json!("pro")));
        assert_eq!(user.trait_value("age"), Some(&json!(30)));
    }

    #[test]
    fn test_trait_value_nested() {
        let traits = json!({ "company": { "name": "Acme" } });
        let user = UserContext::new(None, traits.as_object().unwrap().clone());
        assert_eq!(user.trait_value("company.name"), Some(&json!("Acme")));
        assert!(user.trait_value("company.size").is_none());
    }
}
