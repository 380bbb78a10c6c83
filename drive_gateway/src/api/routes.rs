use axum::{
    extract::{
        rejection::QueryRejection,
        Multipart, Path, Query, State,
    },
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::warn;

use super::{error::ApiError, state::AppState};
use crate::manager::MAX_PAGE_SIZE;
use crate::models::{FileListPage, FileRecord, UploadOutcome, DEFAULT_MIME_TYPE};

const DEFAULT_PAGE_SIZE: u32 = 10;

/// Name used for downloads whose metadata cannot be looked up.
const FALLBACK_DOWNLOAD_NAME: &str = "download";

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default, rename = "pageSize", alias = "page_size")]
    page_size: Option<u32>,
    #[serde(default, rename = "pageToken", alias = "page_token")]
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    query: Option<String>,
    #[serde(default, rename = "pageSize", alias = "page_size")]
    page_size: Option<u32>,
}

fn page_size(requested: Option<u32>) -> Result<u32, ApiError> {
    let size = requested.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&size) {
        return Err(ApiError::BadRequest(format!(
            "pageSize must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    Ok(size)
}

/// `attachment` disposition with an ASCII fallback name and the exact UTF-8 name.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}

/// Upload a file via multipart form data.
/// Fields: `file` (binary), optional `name` and `mime_type` (text)
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadOutcome>, ApiError> {
    let mut file_data: Option<(Option<String>, Option<String>, Vec<u8>)> = None; // (filename, content_type, bytes)
    let mut name_override: Option<String> = None;
    let mut mime_override: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
                file_data = Some((file_name, content_type, bytes.to_vec()));
            }
            "name" | "mime_type" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read field: {}", e)))?;
                if field_name == "name" {
                    name_override = Some(text);
                } else {
                    mime_override = Some(text);
                }
            }
            _ => {}
        }
    }

    let (file_name, content_type, bytes) =
        file_data.ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;

    let name = name_override
        .or(file_name)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing file name".to_string()))?;

    let mime_type = mime_override
        .or(content_type)
        .filter(|m| !m.trim().is_empty())
        .or_else(|| mime_guess::from_path(&name).first().map(|m| m.to_string()));

    let outcome = state
        .manager
        .upload_file(&bytes, &name, mime_type.as_deref())
        .await;

    if !outcome.success {
        return Err(ApiError::Internal(outcome.message));
    }
    Ok(Json(outcome))
}

pub async fn list(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<FileListPage>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let page_size = page_size(params.page_size)?;

    let page = state
        .manager
        .list_files(page_size, params.page_token.as_deref())
        .await?;
    Ok(Json(page))
}

pub async fn get(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<FileRecord>, ApiError> {
    state
        .manager
        .get_file_info(&file_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("File not found".to_string()))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.manager.delete_file(&file_id).await? {
        return Err(ApiError::NotFound("File not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "message": "File deleted successfully" })))
}

pub async fn download(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let content = state
        .manager
        .download_file(&file_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("File not found".to_string()))?;

    let record = match state.manager.get_file_info(&file_id).await {
        Ok(record) => record,
        Err(e) => {
            warn!(file_id = %file_id, error = %e, "could not look up name for download");
            None
        }
    };
    let (file_name, mime_type) = record
        .map(|r| (r.name, r.mime_type))
        .unwrap_or_else(|| {
            (
                FALLBACK_DOWNLOAD_NAME.to_string(),
                DEFAULT_MIME_TYPE.to_string(),
            )
        });

    Ok((
        [
            (header::CONTENT_TYPE, mime_type),
            (header::CONTENT_DISPOSITION, content_disposition(&file_name)),
        ],
        content,
    )
        .into_response())
}

pub async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<FileListPage>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let query = params
        .query
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("query must not be empty".to_string()))?;
    let page_size = page_size(params.page_size)?;

    let page = state.manager.search_files(&query, page_size).await?;
    Ok(Json(page))
}

pub async fn folder(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .manager
        .folder_link()
        .await
        .map(|link| Json(serde_json::json!({ "link": link })))
        .ok_or_else(|| ApiError::NotFound("Folder link unavailable".to_string()))
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "Google Drive API",
        "backend": state.manager.backend_kind(),
    }))
}
