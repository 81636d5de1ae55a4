use std::collections::BTreeSet;
use std::time::Duration;

use flint_query::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Fields never written by a model update, compared case-insensitively.
pub const DEFAULT_SKIP_WHEN_UPDATING: &[&str] = &["id", "createdat", "updatedat"];

pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_UPDATED_AT_FIELD: &str = "updatedat";

/// Settings shared by every builder a [`Client`](crate::Client) hands out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub database: String,
    pub collection: String,
    pub query_timeout_ms: u64,
    pub page_size: i64,
    pub skip_when_updating: BTreeSet<String>,
    /// Field stamped with the server time on every model update. `None`
    /// disables the stamp.
    pub updated_at_field: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database: String::new(),
            collection: String::new(),
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            page_size: DEFAULT_PAGE_SIZE,
            skip_when_updating: DEFAULT_SKIP_WHEN_UPDATING
                .iter()
                .map(|s| s.to_string())
                .collect(),
            updated_at_field: Some(DEFAULT_UPDATED_AT_FIELD.to_string()),
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid client config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `FLINT_DATABASE`, `FLINT_COLLECTION`, `FLINT_QUERY_TIMEOUT_MS`,
    /// `FLINT_PAGE_SIZE`, and `FLINT_UPDATED_AT_FIELD`. Unset variables keep
    /// their defaults.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(db) = lookup("FLINT_DATABASE") {
            config.database = db;
        }
        if let Some(coll) = lookup("FLINT_COLLECTION") {
            config.collection = coll;
        }
        if let Some(ms) = lookup("FLINT_QUERY_TIMEOUT_MS") {
            config.query_timeout_ms = ms
                .parse()
                .map_err(|e| Error::Config(format!("FLINT_QUERY_TIMEOUT_MS={ms:?}: {e}")))?;
        }
        if let Some(size) = lookup("FLINT_PAGE_SIZE") {
            config.page_size = size
                .parse()
                .map_err(|e| Error::Config(format!("FLINT_PAGE_SIZE={size:?}: {e}")))?;
        }
        if let Some(field) = lookup("FLINT_UPDATED_AT_FIELD") {
            config.updated_at_field = (!field.is_empty()).then_some(field);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.page_size < 1 {
            return Err(Error::Config(format!(
                "page_size must be at least 1, got {}",
                self.page_size
            )));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// True if `field` must never be written by a model update.
    pub fn skips_on_update(&self, field: &str) -> bool {
        self.skip_when_updating.contains(&field.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.query_timeout(), Duration::from_secs(5));
        assert_eq!(config.page_size, 20);
        assert!(config.skips_on_update("CreatedAt"));
        assert!(config.skips_on_update("id"));
        assert!(!config.skips_on_update("name"));
        assert_eq!(config.updated_at_field.as_deref(), Some("updatedat"));
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config =
            ClientConfig::from_json(r#"{ "database": "shop", "collection": "orders", "page_size": 50 }"#)
                .unwrap();
        assert_eq!(config.database, "shop");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.query_timeout_ms, DEFAULT_QUERY_TIMEOUT_MS);
    }

    #[test]
    fn json_rejects_bad_page_size() {
        let err = ClientConfig::from_json(r#"{ "page_size": 0 }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(ClientConfig::from_json("not json").is_err());
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FLINT_DATABASE", "shop"),
            ("FLINT_QUERY_TIMEOUT_MS", "250"),
            ("FLINT_UPDATED_AT_FIELD", ""),
        ]
        .into_iter()
        .collect();
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.database, "shop");
        assert_eq!(config.collection, "");
        assert_eq!(config.query_timeout(), Duration::from_millis(250));
        assert_eq!(config.updated_at_field, None);
    }

    #[test]
    fn env_rejects_unparsable_numbers() {
        let err = ClientConfig::from_lookup(|k| (k == "FLINT_PAGE_SIZE").then(|| "ten".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("FLINT_PAGE_SIZE"));
    }
}
