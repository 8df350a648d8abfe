use std::collections::BTreeMap;
use std::time::Duration;

use tracing::debug;

use bucketfs_path::validate_path;
use bucketfs_store::PresignMethod;

use crate::client::Client;
use crate::error::{ClientError, ClientResult};

impl Client {
    async fn presign(
        &self,
        method: PresignMethod,
        path: &str,
        expiry: Duration,
        params: &BTreeMap<String, String>,
    ) -> ClientResult<String> {
        validate_path(path)?;
        let key = self.namespace.build_key(path);
        debug!(
            bucket = %self.bucket,
            object = %key,
            %method,
            expiry_secs = expiry.as_secs(),
            "presigning url"
        );
        Ok(self
            .backend
            .presign(method, &self.bucket, &key, expiry, params)
            .await?)
    }

    /// Time-limited download URL. `params` become extra query parameters
    /// such as response header overrides.
    pub async fn presigned_get_url(
        &self,
        path: &str,
        expiry: Duration,
        params: &BTreeMap<String, String>,
    ) -> ClientResult<String> {
        self.presign(PresignMethod::Get, path, expiry, params).await
    }

    pub async fn presigned_put_url(&self, path: &str, expiry: Duration) -> ClientResult<String> {
        self.presign(PresignMethod::Put, path, expiry, &BTreeMap::new())
            .await
    }

    pub async fn presigned_head_url(
        &self,
        path: &str,
        expiry: Duration,
        params: &BTreeMap<String, String>,
    ) -> ClientResult<String> {
        self.presign(PresignMethod::Head, path, expiry, params).await
    }

    /// Unsigned URL under the configured public base:
    /// `<public_url>/<bucket>/<key>`.
    pub fn public_url(&self, path: &str) -> ClientResult<String> {
        let base = self
            .public_base_url
            .as_deref()
            .ok_or(ClientError::PublicUrlNotConfigured)?;
        validate_path(path)?;
        let key = self.namespace.build_key(path);
        Ok(format!(
            "{}/{}/{}",
            base.trim_end_matches('/'),
            self.bucket,
            key
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{client, BUCKET};
    use crate::ClientConfig;
    use bucketfs_store::InMemoryObjectClient;
    use std::sync::Arc;

    #[tokio::test]
    async fn public_url_joins_base_bucket_and_key() {
        let (_backend, c) = client("app-data").await;
        assert_eq!(
            c.public_url("documents/hello.txt").unwrap(),
            format!("http://localhost:9000/{BUCKET}/app-data/documents/hello.txt")
        );
    }

    #[tokio::test]
    async fn public_url_requires_configuration() {
        let backend = Arc::new(InMemoryObjectClient::new().with_bucket(BUCKET));
        let c = Client::new(ClientConfig::new("e", "a", "s", BUCKET), backend)
            .await
            .unwrap();
        assert!(matches!(
            c.public_url("x"),
            Err(ClientError::PublicUrlNotConfigured)
        ));
    }

    #[tokio::test]
    async fn presigned_urls_use_namespaced_key() {
        let (_backend, c) = client("app").await;
        let params = BTreeMap::from([(
            "response-content-type".to_string(),
            "text/plain".to_string(),
        )]);

        let get = c
            .presigned_get_url("a.txt", Duration::from_secs(60), &params)
            .await
            .unwrap();
        assert!(get.starts_with(&format!("memory://{BUCKET}/app/a.txt?")));
        assert!(get.contains("method=GET"));
        assert!(get.contains("expires=60"));
        assert!(get.contains("response-content-type=text/plain"));

        let put = c
            .presigned_put_url("a.txt", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(put.contains("method=PUT"));

        let head = c
            .presigned_head_url("a.txt", Duration::from_secs(5), &BTreeMap::new())
            .await
            .unwrap();
        assert!(head.contains("method=HEAD"));
    }

    #[tokio::test]
    async fn urls_reject_traversal() {
        let (_backend, c) = client("app").await;
        assert!(matches!(c.public_url("../x"), Err(ClientError::Path(_))));
        assert!(c
            .presigned_put_url("/abs", Duration::from_secs(1))
            .await
            .is_err());
    }
}
