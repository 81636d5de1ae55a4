use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::driver::Driver;
use crate::error::Error;
use crate::query::QueryBuilder;

/// Entry point: a shared driver handle plus the configuration every query
/// starts from. Cheap to clone.
pub struct Client<D: Driver> {
    driver: Arc<D>,
    config: Arc<ClientConfig>,
}

impl<D: Driver> Clone for Client<D> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            config: Arc::clone(&self.config),
        }
    }
}

impl<D: Driver> Client<D> {
    pub fn builder() -> ClientBuilder<D> {
        ClientBuilder::new()
    }

    /// A fresh query against the configured database and collection.
    pub fn query(&self) -> QueryBuilder<D> {
        QueryBuilder::new(Arc::clone(&self.driver), Arc::clone(&self.config))
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

pub struct ClientBuilder<D: Driver> {
    driver: Option<Arc<D>>,
    config: ClientConfig,
}

impl<D: Driver> Default for ClientBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Driver> ClientBuilder<D> {
    pub fn new() -> Self {
        Self {
            driver: None,
            config: ClientConfig::default(),
        }
    }

    pub fn driver(self, driver: D) -> Self {
        self.shared_driver(Arc::new(driver))
    }

    /// Use a driver handle that is also held elsewhere.
    pub fn shared_driver(mut self, driver: Arc<D>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Replace the whole configuration. Later setters still apply on top.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.database = database.into();
        self
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.config.collection = collection.into();
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn page_size(mut self, size: i64) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn build(self) -> Result<Client<D>, Error> {
        let driver = self
            .driver
            .ok_or_else(|| Error::Config("a driver is required".into()))?;
        if self.config.database.is_empty() {
            return Err(Error::Config("database name must not be empty".into()));
        }
        if self.config.collection.is_empty() {
            return Err(Error::Config("collection name must not be empty".into()));
        }
        self.config.validate()?;
        Ok(Client {
            driver,
            config: Arc::new(self.config),
        })
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::memory::MemoryDriver;

    #[test]
    fn build_requires_a_driver() {
        let err = Client::<MemoryDriver>::builder()
            .database("db")
            .collection("c")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(msg) if msg.contains("driver")));
    }

    #[test]
    fn build_requires_a_namespace() {
        let err = Client::builder()
            .driver(MemoryDriver::new())
            .database("db")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(msg) if msg.contains("collection")));
    }

    #[test]
    fn setters_apply_over_config() {
        let config = ClientConfig {
            database: "from-config".into(),
            collection: "c".into(),
            ..ClientConfig::default()
        };
        let client = Client::builder()
            .driver(MemoryDriver::new())
            .config(config)
            .database("db")
            .query_timeout(Duration::from_millis(1500))
            .build()
            .unwrap();
        assert_eq!(client.config().database, "db");
        assert_eq!(client.config().query_timeout_ms, 1500);
    }

    #[test]
    fn invalid_page_size_is_rejected() {
        let err = Client::builder()
            .driver(MemoryDriver::new())
            .database("db")
            .collection("c")
            .page_size(0)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
