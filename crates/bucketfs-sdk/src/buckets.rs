use tracing::debug;

use bucketfs_store::BucketInfo;

use crate::client::Client;
use crate::error::ClientResult;

/// Bucket-level calls. All of them target the configured bucket except
/// [`Client::list_buckets`], which reports every bucket the credentials see.
impl Client {
    pub async fn bucket_exists(&self) -> ClientResult<bool> {
        Ok(self.backend.bucket_exists(&self.bucket).await?)
    }

    pub async fn list_buckets(&self) -> ClientResult<Vec<BucketInfo>> {
        Ok(self.backend.list_buckets().await?)
    }

    pub async fn bucket_location(&self) -> ClientResult<String> {
        Ok(self.backend.bucket_location(&self.bucket).await?)
    }

    pub async fn bucket_policy(&self) -> ClientResult<String> {
        Ok(self.backend.bucket_policy(&self.bucket).await?)
    }

    pub async fn set_bucket_policy(&self, policy: &str) -> ClientResult<()> {
        debug!(bucket = %self.bucket, len = policy.len(), "setting bucket policy");
        Ok(self.backend.set_bucket_policy(&self.bucket, policy).await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{client, BUCKET};

    #[tokio::test]
    async fn targets_configured_bucket() {
        let (backend, c) = client("app").await;
        backend.create_bucket("zzz");

        assert!(c.bucket_exists().await.unwrap());
        let names: Vec<_> = c
            .list_buckets()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec![BUCKET.to_string(), "zzz".to_string()]);
        assert!(!c.bucket_location().await.unwrap().is_empty());

        assert_eq!(c.bucket_policy().await.unwrap(), "");
        c.set_bucket_policy(r#"{"Version":"2012-10-17"}"#).await.unwrap();
        assert_eq!(c.bucket_policy().await.unwrap(), r#"{"Version":"2012-10-17"}"#);
    }
}
