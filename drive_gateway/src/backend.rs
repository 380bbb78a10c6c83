//! The storage operations every backend offers, and the choice between them.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::client::DriveClient;
use crate::config::DriveSettings;
use crate::error::Result;
use crate::mock::MockDrive;
use crate::models::FileRecord;

/// File storage operations shared by the real and the mock drive.
#[async_trait]
pub trait DriveBackend: Send + Sync {
    /// Store `content` as a new file and return its id.
    async fn upload(&self, content: &[u8], name: &str, mime_type: Option<&str>) -> Result<String>;

    async fn get_info(&self, file_id: &str) -> Result<FileRecord>;

    /// One page of files plus the token for the next page, if any.
    async fn list(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<(Vec<FileRecord>, Option<String>)>;

    async fn delete(&self, file_id: &str) -> Result<bool>;

    async fn download(&self, file_id: &str) -> Result<Vec<u8>>;
}

/// The backend in use for the lifetime of the process.
pub enum Backend {
    Real(DriveClient),
    Mock(MockDrive),
}

impl Backend {
    /// Pick a backend: the real drive when the credentials file exists and
    /// authentication succeeds, the mock drive otherwise.
    pub async fn select(settings: &DriveSettings) -> Self {
        if !settings.credentials_file.exists() {
            info!(
                path = %settings.credentials_file.display(),
                "no credentials file found, using mock drive"
            );
            return Backend::Mock(MockDrive::new());
        }

        match DriveClient::connect(settings).await {
            Ok(client) => Backend::Real(client),
            Err(e) => {
                warn!(error = %e, "could not connect to Google Drive, using mock drive");
                Backend::Mock(MockDrive::new())
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Real(_) => "google_drive",
            Backend::Mock(_) => "mock",
        }
    }

    fn inner(&self) -> &dyn DriveBackend {
        match self {
            Backend::Real(client) => client,
            Backend::Mock(mock) => mock,
        }
    }

    /// Public link to the upload folder. Only the real drive has one.
    pub async fn folder_link(&self) -> Option<String> {
        match self {
            Backend::Real(client) => client.folder_link().await,
            Backend::Mock(_) => None,
        }
    }
}

#[async_trait]
impl DriveBackend for Backend {
    async fn upload(&self, content: &[u8], name: &str, mime_type: Option<&str>) -> Result<String> {
        self.inner().upload(content, name, mime_type).await
    }

    async fn get_info(&self, file_id: &str) -> Result<FileRecord> {
        self.inner().get_info(file_id).await
    }

    async fn list(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<(Vec<FileRecord>, Option<String>)> {
        self.inner().list(page_size, page_token).await
    }

    async fn delete(&self, file_id: &str) -> Result<bool> {
        self.inner().delete(file_id).await
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        self.inner().download(file_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn settings_with(credentials_file: PathBuf, token_file: PathBuf) -> DriveSettings {
        DriveSettings {
            credentials_file,
            token_file,
            token_uri: "http://127.0.0.1:1/token".to_string(),
            api_base_url: "http://127.0.0.1:1".to_string(),
            ..DriveSettings::default()
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_selects_mock() {
        let settings = settings_with(
            PathBuf::from("/nonexistent/credentials.json"),
            PathBuf::from("/nonexistent/token.json"),
        );
        let backend = Backend::select(&settings).await;
        assert_eq!(backend.kind(), "mock");
    }

    #[tokio::test]
    async fn test_unusable_credentials_fall_back_to_mock() {
        let mut credentials = tempfile::NamedTempFile::new().unwrap();
        credentials.write_all(b"{\"installed\": {}}").unwrap();

        let settings = settings_with(
            credentials.path().to_path_buf(),
            PathBuf::from("/nonexistent/token.json"),
        );
        let backend = Backend::select(&settings).await;
        assert_eq!(backend.kind(), "mock");
        assert!(backend.folder_link().await.is_none());
    }

    #[tokio::test]
    async fn test_valid_service_account_key_selects_real_drive() {
        let dir = tempfile::TempDir::new().unwrap();
        let credentials = dir.path().join("credentials.json");
        let key = serde_json::json!({
            "type": "service_account",
            "client_email": "gateway@test-project.iam.gserviceaccount.com",
            "private_key": include_str!("../tests/fixtures/test_service_account_key.pem"),
            "token_uri": "http://127.0.0.1:1/token",
        });
        std::fs::write(&credentials, key.to_string()).unwrap();

        // Nothing listens on port 1, so selection must not need the network.
        let settings = settings_with(credentials, PathBuf::from("/nonexistent/token.json"));
        let backend = Backend::select(&settings).await;
        assert_eq!(backend.kind(), "google_drive");
        assert!(matches!(backend, Backend::Real(_)));
    }

    #[tokio::test]
    async fn test_dispatch_reaches_mock() {
        let backend = Backend::Mock(MockDrive::new());
        let (files, token) = backend.list(3, None).await.unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(token.as_deref(), Some("3"));
    }
}
