//! Single entry point for file operations, independent of the backend in use.

use tracing::{info, warn};

use crate::backend::{Backend, DriveBackend};
use crate::config::DriveSettings;
use crate::error::{DriveError, OperationError};
use crate::models::{FileListPage, FileRecord, UploadOutcome};

/// Largest page a backend is asked for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Wraps the chosen backend and turns its failures into uniform results.
///
/// A missing file is reported as `None`/`false` rather than an error, so
/// callers need no backend-specific knowledge to tell "absent" from "broken".
pub struct DriveManager {
    backend: Backend,
}

impl DriveManager {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Select the backend for `settings` and wrap it.
    pub async fn from_settings(settings: &DriveSettings) -> Self {
        let backend = Backend::select(settings).await;
        info!(backend = backend.kind(), "drive manager ready");
        Self::new(backend)
    }

    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    /// Upload a file. Never fails; failures are reported in the outcome.
    pub async fn upload_file(
        &self,
        content: &[u8],
        file_name: &str,
        mime_type: Option<&str>,
    ) -> UploadOutcome {
        match self.backend.upload(content, file_name, mime_type).await {
            Ok(file_id) => UploadOutcome::uploaded(file_id, file_name.to_string()),
            Err(e) => {
                warn!(file_name, error = %e, "upload failed");
                let message = match e {
                    DriveError::UploadRejected(detail) => format!("Upload failed: {}", detail),
                    DriveError::AuthenticationError(detail)
                    | DriveError::TokenRefreshError(detail) => {
                        format!("Authentication failed: {}", detail)
                    }
                    DriveError::PermissionDenied(_) => e.to_string(),
                    other => format!("Unexpected error: {}", other),
                };
                UploadOutcome::failed(message)
            }
        }
    }

    pub async fn get_file_info(&self, file_id: &str) -> Result<Option<FileRecord>, OperationError> {
        match self.backend.get_info(file_id).await {
            Ok(record) => Ok(Some(record)),
            Err(DriveError::NotFound(_)) => Ok(None),
            Err(e) => Err(OperationError::new("Error getting file info", e)),
        }
    }

    /// One page of the listing. `page_size` is clamped to `1..=MAX_PAGE_SIZE`.
    pub async fn list_files(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FileListPage, OperationError> {
        let (files, next_page_token) = self
            .backend
            .list(page_size.clamp(1, MAX_PAGE_SIZE), page_token)
            .await
            .map_err(|e| OperationError::new("Error listing files", e))?;
        Ok(FileListPage::new(files, next_page_token))
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<bool, OperationError> {
        match self.backend.delete(file_id).await {
            Ok(deleted) => Ok(deleted),
            Err(DriveError::NotFound(_)) => Ok(false),
            Err(e) => Err(OperationError::new("Error deleting file", e)),
        }
    }

    pub async fn download_file(&self, file_id: &str) -> Result<Option<Vec<u8>>, OperationError> {
        match self.backend.download(file_id).await {
            Ok(content) => Ok(Some(content)),
            Err(DriveError::NotFound(_)) => Ok(None),
            Err(e) => Err(OperationError::new("Error downloading file", e)),
        }
    }

    /// Case-insensitive name filter over the first page of the listing only.
    pub async fn search_files(
        &self,
        query: &str,
        page_size: u32,
    ) -> Result<FileListPage, OperationError> {
        let (files, next_page_token) = self
            .backend
            .list(page_size.clamp(1, MAX_PAGE_SIZE), None)
            .await
            .map_err(|e| OperationError::new("Error searching files", e))?;

        let needle = query.to_lowercase();
        let matches = files
            .into_iter()
            .filter(|f| f.name.to_lowercase().contains(&needle))
            .collect();

        Ok(FileListPage::new(matches, next_page_token))
    }

    pub async fn folder_link(&self) -> Option<String> {
        self.backend.folder_link().await
    }
}
