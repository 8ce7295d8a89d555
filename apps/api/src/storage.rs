//! Application file storage on the S3-compatible bucket.
//!
//! Keys are `applications/{application_id}/{unix_millis}-{file_name}`; the key
//! is what gets recorded as a file's `storage_path`.

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// Builds the object key for a file. Path separators in the name are replaced
/// so a file can never escape its application prefix.
pub fn storage_key(application_id: Uuid, file_name: &str, unix_millis: i64) -> String {
    let safe_name: String = file_name
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let safe_name = if safe_name.is_empty() {
        "upload".to_string()
    } else {
        safe_name
    };
    format!("applications/{application_id}/{unix_millis}-{safe_name}")
}

/// Uploads a file and returns its storage path.
pub async fn save_file(
    s3: &S3Client,
    bucket: &str,
    body: Bytes,
    file_name: &str,
    content_type: &str,
    application_id: Uuid,
) -> Result<String> {
    let key = storage_key(application_id, file_name, Utc::now().timestamp_millis());
    s3.put_object()
        .bucket(bucket)
        .key(&key)
        .body(ByteStream::from(body))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("S3 upload failed: {e}"))?;

    info!("Stored file at s3://{bucket}/{key}");
    Ok(key)
}

/// Downloads a previously stored file.
pub async fn load_file(s3: &S3Client, bucket: &str, key: &str) -> Result<Bytes> {
    let object = s3
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("S3 download of '{key}' failed: {e}"))?;

    let data = object
        .body
        .collect()
        .await
        .with_context(|| format!("Reading S3 object '{key}'"))?;
    Ok(data.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            storage_key(id, "resume.pdf", 1_700_000_000_000),
            "applications/00000000-0000-0000-0000-000000000000/1700000000000-resume.pdf"
        );
    }

    #[test]
    fn test_key_cannot_escape_prefix() {
        let key = storage_key(Uuid::nil(), "../../etc/passwd", 1);
        assert!(key.ends_with("/1-.._.._etc_passwd"));
        assert_eq!(key.matches('/').count(), 2);
    }

    #[test]
    fn test_blank_name_gets_placeholder() {
        assert!(storage_key(Uuid::nil(), "  ", 5).ends_with("/5-upload"));
    }
}
