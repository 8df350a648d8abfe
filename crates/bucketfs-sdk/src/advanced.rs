//! Tagging, retention and legal-hold operations on namespaced objects.

use chrono::{DateTime, Utc};
use tracing::debug;

use bucketfs_path::validate_path;
use bucketfs_store::{
    LegalHoldOptions, LegalHoldStatus, PutLegalHoldOptions, PutRetentionOptions, RetentionMode,
    Tags, TaggingOptions,
};

use crate::client::Client;
use crate::error::ClientResult;

impl Client {
    fn object_key(&self, path: &str) -> ClientResult<String> {
        validate_path(path)?;
        Ok(self.namespace.build_key(path))
    }

    // ---- Tagging ----

    pub async fn get_object_tagging(&self, path: &str, opts: &TaggingOptions) -> ClientResult<Tags> {
        let key = self.object_key(path)?;
        debug!(bucket = %self.bucket, object = %key, "getting object tags");
        Ok(self
            .backend
            .get_object_tagging(&self.bucket, &key, opts)
            .await?)
    }

    pub async fn put_object_tagging(
        &self,
        path: &str,
        tags: &Tags,
        opts: &TaggingOptions,
    ) -> ClientResult<()> {
        let key = self.object_key(path)?;
        debug!(bucket = %self.bucket, object = %key, count = tags.len(), "setting object tags");
        Ok(self
            .backend
            .put_object_tagging(&self.bucket, &key, tags, opts)
            .await?)
    }

    pub async fn remove_object_tagging(&self, path: &str, opts: &TaggingOptions) -> ClientResult<()> {
        let key = self.object_key(path)?;
        debug!(bucket = %self.bucket, object = %key, "removing object tags");
        Ok(self
            .backend
            .remove_object_tagging(&self.bucket, &key, opts)
            .await?)
    }

    // ---- Retention ----

    /// Retention mode and retain-until date; both `None` when the object
    /// carries no retention.
    pub async fn get_object_retention(
        &self,
        path: &str,
        version_id: Option<&str>,
    ) -> ClientResult<(Option<RetentionMode>, Option<DateTime<Utc>>)> {
        let key = self.object_key(path)?;
        debug!(bucket = %self.bucket, object = %key, "getting object retention");
        let retention = self
            .backend
            .get_object_retention(&self.bucket, &key, version_id)
            .await?;
        Ok(match retention {
            Some(r) => (Some(r.mode), Some(r.retain_until)),
            None => (None, None),
        })
    }

    pub async fn put_object_retention(
        &self,
        path: &str,
        opts: &PutRetentionOptions,
    ) -> ClientResult<()> {
        let key = self.object_key(path)?;
        debug!(bucket = %self.bucket, object = %key, "setting object retention");
        Ok(self
            .backend
            .put_object_retention(&self.bucket, &key, opts)
            .await?)
    }

    // ---- Legal hold ----

    pub async fn get_object_legal_hold(
        &self,
        path: &str,
        opts: &LegalHoldOptions,
    ) -> ClientResult<LegalHoldStatus> {
        let key = self.object_key(path)?;
        debug!(bucket = %self.bucket, object = %key, "getting object legal hold");
        Ok(self
            .backend
            .get_object_legal_hold(&self.bucket, &key, opts)
            .await?)
    }

    pub async fn put_object_legal_hold(
        &self,
        path: &str,
        opts: &PutLegalHoldOptions,
    ) -> ClientResult<()> {
        let key = self.object_key(path)?;
        debug!(bucket = %self.bucket, object = %key, status = ?opts.status, "setting object legal hold");
        Ok(self
            .backend
            .put_object_legal_hold(&self.bucket, &key, opts)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ClientError;
    use crate::test_support::{client, BUCKET};
    use bucketfs_path::PathError;
    use bucketfs_store::{
        LegalHoldOptions, LegalHoldStatus, ObjectClient, PutLegalHoldOptions, PutOptions,
        PutRetentionOptions, RemoveOptions, Retention, RetentionMode, StoreError, Tags,
        TaggingOptions,
    };
    use bytes::Bytes;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn tags_round_trip_inside_namespace() {
        let (backend, c) = client("app").await;
        c.put_object("doc", Bytes::from_static(b"x"), &PutOptions::default())
            .await
            .unwrap();

        let tags = Tags::from([("team".to_string(), "storage".to_string())]);
        c.put_object_tagging("doc", &tags, &TaggingOptions::default())
            .await
            .unwrap();
        assert_eq!(
            c.get_object_tagging("doc", &TaggingOptions::default())
                .await
                .unwrap(),
            tags
        );
        // The tags landed on the namespaced key.
        assert_eq!(
            backend
                .get_object_tagging(BUCKET, "app/doc", &TaggingOptions::default())
                .await
                .unwrap(),
            tags
        );

        c.remove_object_tagging("doc", &TaggingOptions::default())
            .await
            .unwrap();
        assert!(c
            .get_object_tagging("doc", &TaggingOptions::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn retention_without_lock_is_none() {
        let (_backend, c) = client("app").await;
        c.put_object("doc", Bytes::new(), &PutOptions::default())
            .await
            .unwrap();
        assert_eq!(c.get_object_retention("doc", None).await.unwrap(), (None, None));
    }

    #[tokio::test]
    async fn compliance_retention_blocks_removal() {
        let (_backend, c) = client("app").await;
        c.put_object("doc", Bytes::new(), &PutOptions::default())
            .await
            .unwrap();
        let until = Utc::now() + Duration::days(1);
        c.put_object_retention(
            "doc",
            &PutRetentionOptions {
                retention: Some(Retention {
                    mode: RetentionMode::Compliance,
                    retain_until: until,
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let (mode, date) = c.get_object_retention("doc", None).await.unwrap();
        assert_eq!(mode, Some(RetentionMode::Compliance));
        assert_eq!(date, Some(until));

        let err = c
            .remove_object("doc", &RemoveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Store(StoreError::AccessDenied { .. })
        ));
    }

    #[tokio::test]
    async fn legal_hold_toggles() {
        let (_backend, c) = client("").await;
        c.put_object("doc", Bytes::new(), &PutOptions::default())
            .await
            .unwrap();
        assert_eq!(
            c.get_object_legal_hold("doc", &LegalHoldOptions::default())
                .await
                .unwrap(),
            LegalHoldStatus::Off
        );

        c.put_object_legal_hold(
            "doc",
            &PutLegalHoldOptions {
                status: LegalHoldStatus::On,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(
            c.get_object_legal_hold("doc", &LegalHoldOptions::default())
                .await
                .unwrap(),
            LegalHoldStatus::On
        );
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let (_backend, c) = client("app").await;
        let err = c
            .get_object_tagging("../x", &TaggingOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Path(PathError::Traversal { .. })));
    }
}
