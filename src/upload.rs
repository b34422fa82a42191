use std::path::Path;

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::api::ApiClient;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    ProfileImage,
    Resume,
    ForumMedia,
}

impl UploadKind {
    pub fn path(&self) -> &'static str {
        match self {
            UploadKind::ProfileImage => "/api/upload/profile-image",
            UploadKind::Resume => "/api/upload/resume",
            UploadKind::ForumMedia => "/api/upload/forum-media",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "profile-image" | "avatar" => Some(UploadKind::ProfileImage),
            "resume" | "cv" => Some(UploadKind::Resume),
            "forum-media" | "media" => Some(UploadKind::ForumMedia),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(alias = "secure_url", alias = "fileUrl")]
    url: String,
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

impl ApiClient {
    /// Sends `bytes` as the multipart field `file` and returns the hosted URL
    /// the backend reports.
    pub async fn upload_bytes(&self, kind: UploadKind, file_name: &str, bytes: Vec<u8>) -> Result<String, ApiError> {
        let path = kind.path();
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))
            .map_err(|source| ApiError::Network {
                path: path.to_string(),
                source,
            })?;
        let form = Form::new().part("file", part);

        let response = self.send(path, self.request(Method::POST, path).multipart(form)).await?;
        let body: UploadResponse = Self::decode(path, response).await?;
        tracing::info!(kind = ?kind, url = %body.url, "Upload complete");
        Ok(body.url)
    }

    pub async fn upload_file(&self, kind: UploadKind, file: &Path) -> Result<String, ApiError> {
        let bytes = tokio::fs::read(file).await.map_err(|source| ApiError::File {
            path: file.display().to_string(),
            source,
        })?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        self.upload_bytes(kind, &file_name, bytes).await
    }
}
