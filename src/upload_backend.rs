use crate::types::{MediaReference, RecognizeResponse, UploadTopic};
use async_trait::async_trait;
use thiserror::Error;

/// リモート呼び出しの失敗
///
/// 種類ごとに分けて保持するが、状態機械ではメッセージ1つの
/// `Error` に畳み込まれる。
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("通信エラー: {0}")]
    Transport(String),

    #[error("サーバーエラー: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("レスポンスの解析に失敗: {0}")]
    Decode(String),

    #[error("送信内容が不正です: {0}")]
    InvalidInput(String),

    #[error("音声ファイルの読み込みに失敗: {0}")]
    Io(#[from] std::io::Error),
}

/// 音声アップロードバックエンドの共通トレイト
#[async_trait]
pub trait UploadBackend: Send + Sync {
    /// 音声とトピックを送信し、認識結果を受け取る
    async fn recognize(
        &self,
        topic: UploadTopic,
        media: &MediaReference,
    ) -> Result<RecognizeResponse, UploadError>;
}
