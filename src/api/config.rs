//! Purpose: Mapper configuration: store endpoint and serialization policy.
//! Exports: `MapperConfig`, `DEFAULT_HOST`, `DEFAULT_PORT`.
//! Role: Deserialized from JSON or built in code; turned into an `Endpoint` per mapper.
//! Invariants: Unknown keys are rejected; absent keys take the documented defaults.
#![allow(clippy::result_large_err)]

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::codec::SerializationPolicy;
use crate::core::error::{Error, ErrorKind};
use crate::core::store::Endpoint;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9160;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperConfig {
    pub host: String,
    pub port: u16,
    /// Overrides the namespace named by the record declaration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub serialization: SerializationPolicy,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            namespace: None,
            serialization: SerializationPolicy::Deny,
        }
    }
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid mapper config: {err}"))
                .with_source(err)
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read mapper config")
                .with_path(path)
                .with_source(err)
        })?;
        Self::from_json_str(&text).map_err(|err| err.with_path(path))
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_serialization(mut self, policy: SerializationPolicy) -> Self {
        self.serialization = policy;
        self
    }

    pub fn endpoint(&self, declared_namespace: &str) -> Endpoint {
        let namespace = self.namespace.as_deref().unwrap_or(declared_namespace);
        Endpoint::new(self.host.clone(), self.port, namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::MapperConfig;
    use crate::core::codec::SerializationPolicy;
    use crate::core::error::ErrorKind;

    #[test]
    fn empty_object_takes_defaults() {
        let config = MapperConfig::from_json_str("{}").expect("config");
        assert_eq!(config, MapperConfig::default());
        let endpoint = config.endpoint("app");
        assert_eq!(endpoint.host, "127.0.0.1");
        assert_eq!(endpoint.port, 9160);
        assert_eq!(endpoint.namespace, "app");
    }

    #[test]
    fn namespace_override_wins() {
        let config = MapperConfig::from_json_str(
            r#"{"port": 9999, "namespace": "staging", "serialization": "allow"}"#,
        )
        .expect("config");
        assert_eq!(config.serialization, SerializationPolicy::Allow);
        assert_eq!(config.endpoint("app").namespace, "staging");
        assert_eq!(config.endpoint("app").port, 9999);
    }

    #[test]
    fn unknown_keys_are_usage_errors() {
        let err = MapperConfig::from_json_str(r#"{"hosts": "x"}"#).expect_err("unknown key");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn load_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.json");
        let err = MapperConfig::load(&path).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.path(), Some(path.as_path()));
    }
}
