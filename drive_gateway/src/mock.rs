//! In-memory drive used when no usable credentials are configured.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::backend::DriveBackend;
use crate::error::{DriveError, Result};
use crate::models::{FileRecord, DEFAULT_MIME_TYPE};

/// A drive that keeps file metadata in memory, in insertion order.
///
/// File contents are not kept; downloads return a synthetic payload.
pub struct MockDrive {
    files: RwLock<Vec<FileRecord>>,
}

fn view_link(id: &str) -> String {
    format!("https://drive.google.com/file/d/{}/view", id)
}

fn sample(
    id: &str,
    name: &str,
    mime_type: &str,
    size: u64,
    created: DateTime<Utc>,
) -> FileRecord {
    FileRecord {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        size: Some(size),
        created_time: Some(created),
        modified_time: Some(created),
        web_view_link: Some(view_link(id)),
    }
}

impl MockDrive {
    /// A drive seeded with four sample files.
    pub fn new() -> Self {
        let at = |day, hour, min| {
            Utc.with_ymd_and_hms(2024, 1, day, hour, min, 0)
                .single()
                .unwrap_or_default()
        };

        Self::with_files(vec![
            sample("1", "Sample Image.jpg", "image/jpeg", 1_024_000, at(15, 10, 30)),
            sample("2", "Report.pdf", "application/pdf", 2_048_000, at(14, 14, 20)),
            sample("3", "Video.mp4", "video/mp4", 15_728_640, at(13, 9, 15)),
            sample(
                "4",
                "Document.docx",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                512_000,
                at(12, 16, 45),
            ),
        ])
    }

    /// A drive holding nothing.
    pub fn empty() -> Self {
        Self::with_files(Vec::new())
    }

    pub fn with_files(files: Vec<FileRecord>) -> Self {
        Self {
            files: RwLock::new(files),
        }
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

impl Default for MockDrive {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DriveBackend for MockDrive {
    async fn upload(&self, content: &[u8], name: &str, mime_type: Option<&str>) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let record = FileRecord {
            id: id.clone(),
            name: name.to_string(),
            mime_type: mime_type.unwrap_or(DEFAULT_MIME_TYPE).to_string(),
            size: Some(content.len() as u64),
            created_time: Some(now),
            modified_time: Some(now),
            web_view_link: Some(view_link(&id)),
        };

        self.files.write().await.push(record);
        Ok(id)
    }

    async fn get_info(&self, file_id: &str) -> Result<FileRecord> {
        self.files
            .read()
            .await
            .iter()
            .find(|f| f.id == file_id)
            .cloned()
            .ok_or_else(|| DriveError::NotFound(file_id.to_string()))
    }

    async fn list(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<(Vec<FileRecord>, Option<String>)> {
        let files = self.files.read().await;

        let start = page_token
            .and_then(|token| token.parse::<usize>().ok())
            .unwrap_or(0);
        let end = start.saturating_add(page_size as usize);

        let page = files
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();
        let next_page_token = (end < files.len()).then(|| end.to_string());

        Ok((page, next_page_token))
    }

    async fn delete(&self, file_id: &str) -> Result<bool> {
        let mut files = self.files.write().await;
        let index = files
            .iter()
            .position(|f| f.id == file_id)
            .ok_or_else(|| DriveError::NotFound(file_id.to_string()))?;
        files.remove(index);
        Ok(true)
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let record = self.get_info(file_id).await?;
        Ok(format!("Mock content for {}", record.name).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect_all(drive: &MockDrive, page_size: u32) -> Vec<FileRecord> {
        let mut all = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let (page, next) = drive.list(page_size, token.as_deref()).await.unwrap();
            all.extend(page);
            match next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        all
    }

    #[tokio::test]
    async fn test_upload_records_size_and_name() {
        let drive = MockDrive::empty();
        let id = drive
            .upload(b"hello world", "greeting.txt", Some("text/plain"))
            .await
            .unwrap();

        let record = drive.get_info(&id).await.unwrap();
        assert_eq!(record.name, "greeting.txt");
        assert_eq!(record.size, Some(11));
        assert_eq!(record.mime_type, "text/plain");
        assert_eq!(record.created_time, record.modified_time);
        assert!(record.web_view_link.unwrap().contains(&id));
    }

    #[tokio::test]
    async fn test_upload_without_mime_type_defaults() {
        let drive = MockDrive::empty();
        let id = drive.upload(b"\x00\x01", "blob", None).await.unwrap();

        let record = drive.get_info(&id).await.unwrap();
        assert_eq!(record.mime_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_uploads_get_distinct_ids() {
        let drive = MockDrive::empty();
        let a = drive.upload(b"a", "a.txt", None).await.unwrap();
        let b = drive.upload(b"b", "a.txt", None).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(drive.len().await, 2);
    }

    #[tokio::test]
    async fn test_empty_store_lists_nothing() {
        let drive = MockDrive::empty();
        let (files, token) = drive.list(10, None).await.unwrap();
        assert!(files.is_empty());
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn test_seeded_store_pages_by_two() {
        let drive = MockDrive::new();

        let (first, token) = drive.list(2, None).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id, "1");
        assert_eq!(first[1].id, "2");
        assert_eq!(token.as_deref(), Some("2"));

        let (second, token) = drive.list(2, token.as_deref()).await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].id, "3");
        assert_eq!(second[1].id, "4");
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn test_following_tokens_yields_every_record_once_in_order() {
        let drive = MockDrive::new();
        for i in 0..7 {
            drive
                .upload(format!("payload {i}").as_bytes(), &format!("file-{i}.txt"), None)
                .await
                .unwrap();
        }
        let expected: Vec<String> = drive
            .list(100, None)
            .await
            .unwrap()
            .0
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(expected.len(), 11);

        for page_size in [1, 3, 4, 11, 50] {
            let ids: Vec<String> = collect_all(&drive, page_size)
                .await
                .into_iter()
                .map(|f| f.id)
                .collect();
            assert_eq!(ids, expected, "page size {page_size}");
        }
    }

    #[tokio::test]
    async fn test_unparseable_token_starts_from_beginning() {
        let drive = MockDrive::new();
        let (files, _) = drive.list(1, Some("not-a-number")).await.unwrap();
        assert_eq!(files[0].id, "1");
    }

    #[tokio::test]
    async fn test_token_past_end_yields_empty_page() {
        let drive = MockDrive::new();
        let (files, token) = drive.list(10, Some("40")).await.unwrap();
        assert!(files.is_empty());
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let drive = MockDrive::new();
        assert!(drive.delete("2").await.unwrap());

        let err = drive.get_info("2").await.unwrap_err();
        assert!(matches!(err, DriveError::NotFound(_)));

        let (files, _) = drive.list(10, None).await.unwrap();
        let ids: Vec<&str> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3", "4"]);
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_found() {
        let drive = MockDrive::new();
        assert!(matches!(
            drive.get_info("missing").await,
            Err(DriveError::NotFound(_))
        ));
        assert!(matches!(
            drive.delete("missing").await,
            Err(DriveError::NotFound(_))
        ));
        assert!(matches!(
            drive.download("missing").await,
            Err(DriveError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_download_returns_synthetic_payload() {
        let drive = MockDrive::new();
        let bytes = drive.download("2").await.unwrap();
        assert_eq!(bytes, b"Mock content for Report.pdf");
    }
}
