use std::path::Path;

use serde::{Deserialize, Serialize};

use bucketfs_path::Namespace;

use crate::error::{ClientError, ClientResult};

/// Connection and namespace settings for a [`Client`](crate::Client).
///
/// Loaded from TOML:
///
/// ```toml
/// endpoint = "localhost:9000"
/// access_key = "minio"
/// secret_key = "minio123"
/// bucket_name = "uploads"
/// base_dir_prefix = "app-data"       # optional
/// public_url = "https://cdn.example" # optional
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Identity of the storage endpoint (host:port, or a directory for the
    /// local backend).
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    /// TLS toggle for the storage transport. The client itself never reads
    /// it; whoever builds the [`ObjectClient`](bucketfs_store::ObjectClient)
    /// from this config does. The local-directory backend has no transport
    /// and ignores it.
    pub use_ssl: bool,
    /// Bucket every operation is scoped to.
    pub bucket_name: String,
    /// Namespace root inside the bucket. Empty means no confinement.
    pub base_dir_prefix: String,
    /// Base for [`Client::public_url`](crate::Client::public_url).
    pub public_url: Option<String>,
}

impl ClientConfig {
    pub fn new(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        bucket_name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            bucket_name: bucket_name.into(),
            ..Default::default()
        }
    }

    pub fn with_base_dir_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.base_dir_prefix = prefix.into();
        self
    }

    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into());
        self
    }

    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> ClientResult<Self> {
        toml::from_str(s).map_err(|e| ClientError::Config(format!("invalid TOML: {e}")))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check required fields and derive the namespace.
    pub fn validate(&self) -> ClientResult<Namespace> {
        let required = [
            ("endpoint", &self.endpoint),
            ("access key", &self.access_key),
            ("secret key", &self.secret_key),
            ("bucket name", &self.bucket_name),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ClientError::Config(format!("{name} is required")));
            }
        }
        Namespace::new(&self.base_dir_prefix).map_err(|e| ClientError::Config(e.to_string()))
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("use_ssl", &self.use_ssl)
            .field("bucket_name", &self.bucket_name)
            .field("base_dir_prefix", &self.base_dir_prefix)
            .field("public_url", &self.public_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ClientConfig {
        ClientConfig::new("localhost:9000", "ak", "sk", "uploads")
    }

    #[test]
    fn valid_config_yields_namespace() {
        let ns = valid().with_base_dir_prefix("/app-data/").validate().unwrap();
        assert_eq!(ns.base_prefix(), "app-data");
        assert!(!valid().validate().unwrap().is_confined());
    }

    #[test]
    fn each_required_field_is_checked() {
        let cases = [
            (ClientConfig { endpoint: String::new(), ..valid() }, "endpoint"),
            (ClientConfig { access_key: String::new(), ..valid() }, "access key"),
            (ClientConfig { secret_key: " ".into(), ..valid() }, "secret key"),
            (ClientConfig { bucket_name: String::new(), ..valid() }, "bucket name"),
        ];
        for (config, field) in cases {
            match config.validate() {
                Err(ClientError::Config(msg)) => assert!(msg.contains(field), "{msg}"),
                other => panic!("expected config error for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn traversal_in_base_prefix_is_a_config_error() {
        let err = valid().with_base_dir_prefix("a/../b").validate().unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn parse_toml() {
        let config = ClientConfig::from_toml_str(
            r#"
            endpoint = "localhost:9000"
            access_key = "ak"
            secret_key = "sk"
            bucket_name = "uploads"
            base_dir_prefix = "app-data"
            public_url = "http://localhost:9000"
            "#,
        )
        .unwrap();
        assert_eq!(config.bucket_name, "uploads");
        assert_eq!(config.base_dir_prefix, "app-data");
        assert_eq!(config.public_url.as_deref(), Some("http://localhost:9000"));
        assert!(!config.use_ssl);
    }

    #[test]
    fn missing_fields_parse_then_fail_validation() {
        let config = ClientConfig::from_toml_str("endpoint = \"x\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bucketfs.toml");
        std::fs::write(
            &path,
            "endpoint = \"e\"\naccess_key = \"a\"\nsecret_key = \"s\"\nbucket_name = \"b\"\n",
        )
        .unwrap();
        assert_eq!(ClientConfig::load(&path).unwrap().bucket_name, "b");
        assert!(ClientConfig::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn use_ssl_is_carried_for_the_transport() {
        let config = ClientConfig::from_toml_str("use_ssl = true").unwrap();
        assert!(config.use_ssl);
        assert!(valid().with_ssl(true).use_ssl);
    }

    #[test]
    fn debug_redacts_secret() {
        let debug = format!("{:?}", valid());
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("\"sk\""));
    }
}
