// Google Drive v3 client: folder resolution, listing, resumable uploads

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;

use super::auth::TokenProvider;
use super::errors::{check_status, ApiError};
use super::pagination::{collect_pages, Page};
use crate::backup::traits::RemoteMirror;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const PAGE_SIZE: &str = "1000";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<FileEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

/// Escape a value for use inside a single-quoted Drive query literal
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn folder_query(name: &str, parent_id: Option<&str>) -> String {
    format!(
        "mimeType='{}' and trashed=false and name='{}' and '{}' in parents",
        FOLDER_MIME,
        escape_query_value(name),
        escape_query_value(parent_id.unwrap_or("root"))
    )
}

/// Content type for an uploaded media file, from its extension
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        Some("flv") => "video/x-flv",
        Some("3gp") => "video/3gpp",
        Some("m4a") => "audio/mp4",
        Some("mp3") => "audio/mpeg",
        Some("opus") | Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}

pub struct DriveClient {
    http: reqwest::Client,
    api_base: String,
    upload_base: String,
    tokens: Arc<dyn TokenProvider>,
}

impl DriveClient {
    pub fn new(http: reqwest::Client, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            tokens,
        }
    }

    pub fn with_base_urls(mut self, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.upload_base = upload_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch_file_page(&self, query: &str, page_token: Option<String>) -> Result<Page<FileEntry>, ApiError> {
        let token = self.tokens.access_token().await?;
        let mut request = self
            .http
            .get(format!("{}/files", self.api_base))
            .bearer_auth(token)
            .query(&[
                ("q", query),
                ("fields", "nextPageToken, files(id, name)"),
                ("pageSize", PAGE_SIZE),
                ("spaces", "drive"),
            ]);
        if let Some(page_token) = page_token.as_deref() {
            request = request.query(&[("pageToken", page_token)]);
        }

        let response = check_status("drive/files.list", request.send().await?).await?;
        let list: FileList = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("drive/files.list: {}", e)))?;

        Ok(Page {
            items: list.files,
            next_page_token: list.next_page_token,
        })
    }

    async fn list_files(&self, query: &str) -> Result<Vec<FileEntry>, ApiError> {
        collect_pages(|page_token| self.fetch_file_page(query, page_token)).await
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String, ApiError> {
        let token = self.tokens.access_token().await?;
        let metadata = json!({
            "name": name,
            "mimeType": FOLDER_MIME,
            "parents": [parent_id.unwrap_or("root")],
        });

        let response = self
            .http
            .post(format!("{}/files", self.api_base))
            .bearer_auth(token)
            .query(&[("fields", "id")])
            .json(&metadata)
            .send()
            .await?;
        let response = check_status("drive/files.create", response).await?;
        let created: CreatedFile = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("drive/files.create: {}", e)))?;

        Ok(created.id)
    }

    /// Open a resumable upload session and return its URL
    async fn start_upload_session(
        &self,
        folder_id: &str,
        name: &str,
        mime: &str,
        size: u64,
    ) -> Result<String, ApiError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(token)
            .query(&[("uploadType", "resumable"), ("fields", "id")])
            .header("X-Upload-Content-Type", mime)
            .header("X-Upload-Content-Length", size.to_string())
            .json(&json!({ "name": name, "parents": [folder_id] }))
            .send()
            .await?;
        let response = check_status("drive/upload.session", response).await?;

        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ApiError::Decode("upload session response has no Location header".to_string()))
    }
}

#[async_trait]
impl RemoteMirror for DriveClient {
    async fn ensure_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String, ApiError> {
        let existing = self.list_files(&folder_query(name, parent_id)).await?;

        if let Some(first) = existing.first() {
            if existing.len() > 1 {
                tracing::warn!(folder = name, count = existing.len(), "several folders share this name, using the first");
            }
            return Ok(first.id.clone());
        }

        let id = self.create_folder(name, parent_id).await?;
        tracing::info!(folder = name, id = %id, "created folder");
        Ok(id)
    }

    async fn list_object_names(&self, folder_id: &str) -> Result<Vec<String>, ApiError> {
        let query = format!("'{}' in parents and trashed=false", escape_query_value(folder_id));
        let files = self.list_files(&query).await?;
        Ok(files.into_iter().map(|f| f.name).collect())
    }

    async fn upload(&self, folder_id: &str, local_path: &Path) -> Result<String, ApiError> {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ApiError::Decode(format!("not a file path: {}", local_path.display())))?;
        let mime = guess_mime(local_path);

        let file = tokio::fs::File::open(local_path).await?;
        let size = file.metadata().await?.len();

        let session_url = self.start_upload_session(folder_id, &name, mime, size).await?;
        tracing::debug!(file = %name, bytes = size, "upload session opened");

        let token = self.tokens.access_token().await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let response = self
            .http
            .put(&session_url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, mime)
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(body)
            .send()
            .await?;
        let response = check_status("drive/upload.put", response).await?;
        let created: CreatedFile = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("drive/upload.put: {}", e)))?;

        Ok(created.id)
    }
}
