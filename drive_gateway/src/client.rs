//! Google Drive API client scoped to a single upload folder.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::auth::{authenticate, AuthStrategy, Authenticator};
use crate::backend::DriveBackend;
use crate::config::DriveSettings;
use crate::error::{DriveError, Result};
use crate::models::{
    ApiErrorResponse, DriveFile, DriveFileList, FileRecord, DEFAULT_MIME_TYPE, FOLDER_MIME_TYPE,
};

/// Payloads above this size go through a resumable upload session (5 MiB).
const RESUMABLE_THRESHOLD: usize = 5 * 1024 * 1024;

/// Fields requested for every file.
const FILE_FIELDS: &str = "id, name, mimeType, size, createdTime, modifiedTime, webViewLink";

/// Whether a request carried file content, which decides how a 400 is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Upload,
    Other,
}

/// Turn a non-success status into the matching domain error.
fn classify(status: u16, message: String, operation: Operation, subject: &str) -> DriveError {
    match status {
        404 => DriveError::NotFound(subject.to_string()),
        403 => DriveError::PermissionDenied(message),
        400 if operation == Operation::Upload => DriveError::UploadRejected(message),
        _ => DriveError::ApiError { status, message },
    }
}

/// Pass successful responses through; map failures with [`classify`].
async fn check(response: Response, operation: Operation, subject: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorResponse>(&error_body) {
        Ok(api_error) => api_error.error.message,
        Err(_) => error_body,
    };
    Err(classify(status.as_u16(), message, operation, subject))
}

/// Quote a value for use inside a Drive query string literal.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Client for the real Google Drive backend.
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    api_base: String,
    upload_base: String,
    folder_name: String,
    folder_id: OnceCell<String>,
}

impl DriveClient {
    /// Authenticate with the configured strategies and build a client.
    pub async fn connect(settings: &DriveSettings) -> Result<Self> {
        let http = Client::new();
        let auth = authenticate(
            &AuthStrategy::defaults(settings),
            &http,
            &settings.token_uri,
        )
        .await?;
        Ok(Self::new(auth, http, settings))
    }

    pub fn new(auth: Authenticator, http: Client, settings: &DriveSettings) -> Self {
        let base = settings.api_base_url.trim_end_matches('/');
        Self {
            auth,
            http,
            api_base: format!("{}/drive/v3", base),
            upload_base: format!("{}/upload/drive/v3", base),
            folder_name: settings.folder_name.clone(),
            folder_id: OnceCell::new(),
        }
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.api_base, urlencoding::encode(file_id))
    }

    /// The id of the upload folder, looked up or created on first use.
    pub async fn folder_id(&self) -> Result<&str> {
        self.folder_id
            .get_or_try_init(|| self.find_or_create_folder())
            .await
            .map(String::as_str)
    }

    async fn find_or_create_folder(&self) -> Result<String> {
        let token = self.auth.get_access_token().await?;
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            escape_query_value(&self.folder_name),
            FOLDER_MIME_TYPE
        );

        let response = self
            .http
            .get(format!("{}/files", self.api_base))
            .bearer_auth(&token)
            .query(&[("q", query.as_str()), ("fields", "files(id, name)")])
            .send()
            .await?;
        let list: DriveFileList = check(response, Operation::Other, &self.folder_name)
            .await?
            .json()
            .await?;

        if let Some(folder) = list.files.into_iter().next() {
            debug!(folder_id = %folder.id, folder_name = %self.folder_name, "found upload folder");
            return Ok(folder.id);
        }

        let metadata = serde_json::json!({
            "name": self.folder_name,
            "mimeType": FOLDER_MIME_TYPE,
        });
        let response = self
            .http
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&token)
            .query(&[("fields", "id, name")])
            .json(&metadata)
            .send()
            .await?;
        let folder: DriveFile = check(response, Operation::Other, &self.folder_name)
            .await?
            .json()
            .await?;

        info!(folder_id = %folder.id, folder_name = %self.folder_name, "created upload folder");
        self.share_publicly(&folder.id).await;
        Ok(folder.id)
    }

    /// Grant anyone-with-the-link read access. Failures are logged and dropped.
    async fn share_publicly(&self, file_id: &str) {
        if let Err(e) = self.grant_public_read(file_id).await {
            warn!(file_id, error = %e, "could not grant public read permission");
        }
    }

    async fn grant_public_read(&self, file_id: &str) -> Result<()> {
        let token = self.auth.get_access_token().await?;
        let response = self
            .http
            .post(format!("{}/permissions", self.file_url(file_id)))
            .bearer_auth(&token)
            .query(&[("fields", "id")])
            .json(&serde_json::json!({ "type": "anyone", "role": "reader" }))
            .send()
            .await?;
        check(response, Operation::Other, file_id).await?;
        Ok(())
    }

    /// Public link to the upload folder, or `None` if it cannot be resolved.
    pub async fn folder_link(&self) -> Option<String> {
        let folder_id = match self.folder_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "could not resolve upload folder");
                return None;
            }
        };
        self.share_publicly(folder_id).await;
        Some(format!("https://drive.google.com/drive/folders/{}", folder_id))
    }

    /// Upload using a single multipart request (for smaller payloads).
    async fn upload_multipart(
        &self,
        content: &[u8],
        name: &str,
        mime_type: &str,
        parent_id: &str,
    ) -> Result<DriveFile> {
        let token = self.auth.get_access_token().await?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id]
        });

        let metadata_part = Part::text(metadata.to_string()).mime_str("application/json")?;
        let file_part = Part::bytes(content.to_vec())
            .file_name(name.to_string())
            .mime_str(mime_type)
            .map_err(|e| DriveError::UploadRejected(format!("invalid mime type: {}", e)))?;

        let form = Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .multipart(form)
            .send()
            .await?;

        Ok(check(response, Operation::Upload, name).await?.json().await?)
    }

    /// Upload through a resumable session (for larger payloads).
    async fn upload_resumable(
        &self,
        content: &[u8],
        name: &str,
        mime_type: &str,
        parent_id: &str,
    ) -> Result<DriveFile> {
        let token = self.auth.get_access_token().await?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id]
        });

        // Step 1: Initiate resumable upload
        let init_response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[("uploadType", "resumable")])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", content.len().to_string())
            .json(&metadata)
            .send()
            .await?;
        let init_response = check(init_response, Operation::Upload, name).await?;

        let upload_url = init_response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DriveError::ApiError {
                status: 500,
                message: "No upload URL in response".to_string(),
            })?
            .to_string();

        // Step 2: Upload the content
        let upload_response = self
            .http
            .put(&upload_url)
            .header("Content-Type", mime_type)
            .query(&[("fields", FILE_FIELDS)])
            .body(content.to_vec())
            .send()
            .await?;

        Ok(check(upload_response, Operation::Upload, name)
            .await?
            .json()
            .await?)
    }
}

#[async_trait]
impl DriveBackend for DriveClient {
    async fn upload(&self, content: &[u8], name: &str, mime_type: Option<&str>) -> Result<String> {
        let mime_type = mime_type.unwrap_or(DEFAULT_MIME_TYPE);
        let parent_id = self.folder_id().await?;

        let file = if content.len() > RESUMABLE_THRESHOLD {
            self.upload_resumable(content, name, mime_type, parent_id)
                .await?
        } else {
            self.upload_multipart(content, name, mime_type, parent_id)
                .await?
        };

        info!(file_id = %file.id, file_name = name, size = content.len(), "uploaded file");
        self.share_publicly(&file.id).await;
        Ok(file.id)
    }

    async fn get_info(&self, file_id: &str) -> Result<FileRecord> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(self.file_url(file_id))
            .bearer_auth(&token)
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await?;

        let file: DriveFile = check(response, Operation::Other, file_id)
            .await?
            .json()
            .await?;
        Ok(file.into())
    }

    async fn list(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<(Vec<FileRecord>, Option<String>)> {
        let parent_id = self.folder_id().await?;
        let token = self.auth.get_access_token().await?;
        let query = format!("'{}' in parents and trashed = false", parent_id);
        let fields = format!("nextPageToken, files({})", FILE_FIELDS);

        let mut request = self
            .http
            .get(format!("{}/files", self.api_base))
            .bearer_auth(&token)
            .query(&[
                ("q", query.as_str()),
                ("pageSize", page_size.to_string().as_str()),
                ("fields", fields.as_str()),
            ]);

        if let Some(page_token) = page_token {
            request = request.query(&[("pageToken", page_token)]);
        }

        let response = request.send().await?;
        let list: DriveFileList = check(response, Operation::Other, parent_id)
            .await?
            .json()
            .await?;

        Ok((
            list.files.into_iter().map(FileRecord::from).collect(),
            list.next_page_token,
        ))
    }

    async fn delete(&self, file_id: &str) -> Result<bool> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .delete(self.file_url(file_id))
            .bearer_auth(&token)
            .send()
            .await?;

        check(response, Operation::Other, file_id).await?;
        info!(file_id, "deleted file");
        Ok(true)
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(self.file_url(file_id))
            .bearer_auth(&token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        let response = check(response, Operation::Other, file_id).await?;

        let mut content = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            content.extend_from_slice(&chunk?);
        }

        Ok(content)
    }
}
