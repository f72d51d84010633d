use crate::config::ServerConfig;
use crate::types::{MediaReference, MediaSource, RecognizeResponse, UploadTopic};
use crate::upload_backend::{UploadBackend, UploadError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;

/// MIMEタイプ不明時に multipart パートへ付ける値
const FALLBACK_MIME: &str = "application/octet-stream";

/// 音声認識アップロードAPI バックエンド
///
/// `POST {base_url}/auth/recognize-url` に multipart で
/// `topic`（テキスト）と `media`（音声ファイル）を送信する。
pub struct RecognizeApiBackend {
    url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl RecognizeApiBackend {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("アップロードAPI HTTPクライアント作成失敗")?;

        Ok(Self {
            url: config.recognize_url(),
            access_token: config.access_token.clone(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `media` パートを作成
    ///
    /// ファイルはメモリに読み込まずストリーミングで送る
    async fn media_part(media: &MediaReference) -> Result<multipart::Part, UploadError> {
        let part = match &media.source {
            MediaSource::File(path) => {
                let file = tokio::fs::File::open(path).await?;
                let len = file.metadata().await?.len();
                multipart::Part::stream_with_length(reqwest::Body::from(file), len)
            }
            MediaSource::Memory(bytes) => multipart::Part::bytes(bytes.clone()),
        };

        let mime = media.mime_type.as_deref().unwrap_or(FALLBACK_MIME);
        part.file_name(media.name.clone())
            .mime_str(mime)
            .map_err(|e| UploadError::InvalidInput(format!("不正なMIMEタイプ {}: {}", mime, e)))
    }
}

#[async_trait]
impl UploadBackend for RecognizeApiBackend {
    async fn recognize(
        &self,
        topic: UploadTopic,
        media: &MediaReference,
    ) -> Result<RecognizeResponse, UploadError> {
        let form = multipart::Form::new()
            .text("topic", topic.label())
            .part("media", Self::media_part(media).await?);

        log::debug!(
            "アップロードAPI: {} を送信中 (topic={}, {:?} バイト)",
            media.name,
            topic.key(),
            media.size
        );

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(ref token) = self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        serde_json::from_str::<RecognizeResponse>(&body)
            .map_err(|e| UploadError::Decode(e.to_string()))
    }
}
