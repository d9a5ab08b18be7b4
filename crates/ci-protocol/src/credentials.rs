use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_DATA_TABLE_NAME;

/// Connection parameters the backend uses to reach the process-mining store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCredentials {
    #[serde(rename = "celonis_base_url")]
    pub base_url: String,
    #[serde(rename = "celonis_data_pool_name")]
    pub data_pool_name: String,
    #[serde(rename = "celonis_data_model_name")]
    pub data_model_name: String,
    pub api_token: String,
    pub data_table_name: String,
}

impl BackendCredentials {
    /// Build credentials; a blank table name falls back to `ACTIVITIES`.
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        data_pool_name: impl Into<String>,
        data_model_name: impl Into<String>,
        data_table_name: Option<&str>,
    ) -> Self {
        let table = data_table_name
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_DATA_TABLE_NAME);
        Self {
            base_url: base_url.into(),
            data_pool_name: data_pool_name.into(),
            data_model_name: data_model_name.into(),
            api_token: api_token.into(),
            data_table_name: table.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_table_defaults_to_activities() {
        let c = BackendCredentials::new("https://x", "t", "pool", "model", Some("  "));
        assert_eq!(c.data_table_name, "ACTIVITIES");
        let c = BackendCredentials::new("https://x", "t", "pool", "model", None);
        assert_eq!(c.data_table_name, "ACTIVITIES");
    }

    #[test]
    fn serializes_with_backend_field_names() {
        let c = BackendCredentials::new("https://x", "t", "pool", "model", Some("EVENTS"));
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["celonis_base_url"], "https://x");
        assert_eq!(json["celonis_data_pool_name"], "pool");
        assert_eq!(json["data_table_name"], "EVENTS");
    }
}
