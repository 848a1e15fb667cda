//! YouTube upload
//!
//! Uses the YouTube Data API v3 resumable protocol: an access token is
//! obtained from the configured OAuth refresh token, a session is opened
//! with the video metadata, and the file is sent with a single `PUT`.
//! When a transfer is interrupted the client asks the server how many
//! bytes it committed and resumes from there.

pub mod retry;

use std::path::Path;

use bytes::Bytes;
use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::{UploadConfig, VideoMetadata};
use crate::error::UploadError;

use retry::RetryState;

type Result<T> = std::result::Result<T, UploadError>;

/// Request body of `videos.insert`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VideoInsert {
    pub snippet: Snippet,
    pub status: VideoStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    pub privacy_status: String,
    pub self_declared_made_for_kids: bool,
}

impl VideoInsert {
    pub fn new(metadata: &VideoMetadata, privacy_status: &str) -> Self {
        Self {
            snippet: Snippet {
                title: metadata.title.clone(),
                description: metadata.description.clone(),
                tags: metadata.tags.clone(),
                category_id: metadata.category.clone(),
            },
            status: VideoStatus {
                privacy_status: privacy_status.to_string(),
                self_declared_made_for_kids: metadata.for_kids,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: Option<String>,
}

/// Where a transfer stands after one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStep {
    /// The upload finished; carries the new video id
    Done(String),
    /// The server holds this many bytes and wants the rest
    Incomplete(u64),
}

/// Committed byte count from a `Range: bytes=0-N` header
pub fn parse_range_header(value: &str) -> Option<u64> {
    let range = value.trim().strip_prefix("bytes=")?;
    let (start, end) = range.split_once('-')?;
    if start.trim() != "0" {
        return None;
    }
    end.trim().parse::<u64>().ok().map(|last| last + 1)
}

/// Offset to resume from after the server committed `committed` bytes of a
/// send that started at `offset`. No progress is a `Stalled` error.
pub fn next_offset(offset: u64, committed: u64, total: u64) -> Result<u64> {
    let committed = committed.min(total);
    if committed > offset {
        Ok(committed)
    } else {
        Err(UploadError::Stalled { committed, total })
    }
}

/// Interpret the response to an upload request.
pub fn classify_response(status: u16, range: Option<&str>, body: &str) -> Result<TransferStep> {
    match status {
        200 | 201 => {
            let parsed: Option<InsertResponse> = serde_json::from_str(body).ok();
            match parsed.and_then(|r| r.id) {
                Some(id) => Ok(TransferStep::Done(id)),
                None => Err(UploadError::UnexpectedResponse(body.to_string())),
            }
        }
        308 => Ok(TransferStep::Incomplete(
            range.and_then(parse_range_header).unwrap_or(0),
        )),
        _ => Err(UploadError::Status {
            status,
            body: body.to_string(),
        }),
    }
}

pub struct YouTubeUploader {
    client: reqwest::Client,
    config: UploadConfig,
}

impl YouTubeUploader {
    pub fn new(config: UploadConfig) -> Result<Self> {
        // 308 means "resume incomplete" here, not a redirect.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client, config })
    }

    /// Upload `video` and return its YouTube id.
    pub async fn upload(&self, video: &Path, metadata: &VideoMetadata) -> Result<String> {
        let data = Bytes::from(tokio::fs::read(video).await?);
        let total = data.len() as u64;
        let body = VideoInsert::new(metadata, &self.config.privacy_status);
        let mut retries = RetryState::new(self.config.max_retries);

        tracing::info!(
            file = %video.display(),
            bytes = total,
            "Uploading video to YouTube"
        );

        let token = self.access_token().await?;
        let session = loop {
            match self.start_session(&token, &body, total).await {
                Ok(url) => break url,
                Err(e) => tokio::time::sleep(retries.record(e)?).await,
            }
        };

        let mut offset = 0u64;
        loop {
            let step = match self.send_from(&session, &token, &data, offset).await {
                Ok(step) => step,
                Err(e) => {
                    tokio::time::sleep(retries.record(e)?).await;
                    match self.query_offset(&session, &token, total).await {
                        Ok(TransferStep::Incomplete(committed)) => {
                            offset = committed.min(total);
                            continue;
                        }
                        Ok(done) => done,
                        Err(e) => {
                            tracing::warn!("Could not query upload status: {}", e);
                            continue;
                        }
                    }
                }
            };

            match step {
                TransferStep::Done(id) => {
                    tracing::info!("Video id '{}' was successfully uploaded", id);
                    return Ok(id);
                }
                TransferStep::Incomplete(committed) => {
                    match next_offset(offset, committed, total) {
                        Ok(next) => {
                            offset = next;
                            tracing::info!(
                                "Upload at {:.1}%",
                                offset as f64 * 100.0 / total.max(1) as f64
                            );
                        }
                        Err(stalled) => tokio::time::sleep(retries.record(stalled)?).await,
                    }
                }
            }
        }
    }

    async fn access_token(&self) -> Result<String> {
        let response = self
            .client
            .post(&self.config.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Auth(format!("{}: {}", status, body)));
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    async fn start_session(&self, token: &str, body: &VideoInsert, total: u64) -> Result<String> {
        let response = self
            .client
            .post(&self.config.upload_uri)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(token)
            .header("X-Upload-Content-Length", total)
            .header("X-Upload-Content-Type", "video/*")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or(UploadError::MissingSessionUrl)
    }

    async fn send_from(
        &self,
        session: &str,
        token: &str,
        data: &Bytes,
        offset: u64,
    ) -> Result<TransferStep> {
        let total = data.len() as u64;
        let content_range = if offset >= total {
            format!("bytes */{}", total)
        } else {
            format!("bytes {}-{}/{}", offset, total - 1, total)
        };
        let response = self
            .client
            .put(session)
            .bearer_auth(token)
            .header(CONTENT_RANGE, content_range)
            .body(data.slice(offset as usize..))
            .send()
            .await?;
        read_step(response).await
    }

    async fn query_offset(&self, session: &str, token: &str, total: u64) -> Result<TransferStep> {
        let response = self
            .client
            .put(session)
            .bearer_auth(token)
            .header(CONTENT_RANGE, format!("bytes */{}", total))
            .body(Bytes::new())
            .send()
            .await?;
        read_step(response).await
    }
}

async fn read_step(response: reqwest::Response) -> Result<TransferStep> {
    let status = response.status();
    let range = response
        .headers()
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let body = if status == StatusCode::PERMANENT_REDIRECT {
        String::new()
    } else {
        response.text().await?
    };
    classify_response(status.as_u16(), range.as_deref(), &body)
}
