//! Environment handed to user scripts.

use std::collections::BTreeMap;

use crate::domain::database::DatabaseEndpoint;

/// Logical name → value, injected into scripts as environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentBindings(BTreeMap<String, String>);

impl EnvironmentBindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings for a ready database.
    ///
    /// With a tunnel the scripts connect to `localhost:<local_port>`,
    /// otherwise straight to the database endpoint.
    #[must_use]
    pub fn for_database(endpoint: &DatabaseEndpoint, tunnel_port: Option<u16>) -> Self {
        let (host, port) = match tunnel_port {
            Some(local) => ("localhost".to_string(), local),
            None => (endpoint.address.clone(), endpoint.port),
        };
        let mut env = Self::new();
        env.insert("DB_HOST", host);
        env.insert("DB_PORT", port.to_string());
        env.insert("DB_NAME", endpoint.db_name.clone());
        env.insert("DB_USER", endpoint.user.clone());
        env.insert("DB_ENGINE", endpoint.engine.clone());
        env
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
