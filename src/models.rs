//! The static model listing served on `/v1/models`.
//!
//! Nothing here talks to the upstream. The listed ids are what clients may
//! put in `model`; every one of them is dispatched to the same upstream model.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Model ids listed when the config file does not provide its own list.
pub const DEFAULT_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4",
    "gpt-3.5-turbo",
    "deepseek-reasoner",
];

pub const OWNED_BY: &str = "completion-bridge";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

/// Build the listing for `ids`, stamped with the current time.
#[must_use]
pub fn list_models<S: AsRef<str>>(ids: &[S]) -> ModelList {
    let created = Utc::now().timestamp();
    ModelList {
        object: "list".to_string(),
        data: ids
            .iter()
            .map(|id| ModelEntry {
                id: id.as_ref().to_string(),
                object: "model".to_string(),
                created,
                owned_by: OWNED_BY.to_string(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_exactly_the_given_ids() {
        let list = list_models(DEFAULT_MODELS);
        assert_eq!(list.object, "list");

        let ids: Vec<&str> = list.data.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, DEFAULT_MODELS);
        assert!(list.data.iter().all(|m| m.object == "model" && m.created > 0));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(list_models(&["a"])).unwrap();
        assert_eq!(json["object"], "list");
        assert_eq!(json["data"][0]["id"], "a");
        assert_eq!(json["data"][0]["owned_by"], OWNED_BY);
        assert!(json["data"][0]["created"].is_i64());
    }
}
