use crate::config::UploadConfig;
use crate::types::MediaReference;
use thiserror::Error;

/// `audio/` で始まるMIMEタイプはすべて音声として受け付ける
const AUDIO_MIME_PREFIX: &str = "audio/";

/// アップロード前検査で弾かれた理由
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("MIMEタイプが不明です")]
    MissingMimeType,

    #[error("音声ファイルではありません: {0}")]
    UnsupportedMimeType(String),

    #[error("ファイルサイズが上限を超えています: {size} バイト (上限 {limit} バイト)")]
    TooLarge { size: u64, limit: u64 },
}

/// 検査を通過した音声リソース
///
/// [`AudioValidator::validate`] からしか生成できない。
/// アップロードセッションはこの型しか受け取らないため、
/// 未検査のファイルが送信されることはない。
#[derive(Clone, Debug)]
pub struct ValidatedMedia(MediaReference);

impl ValidatedMedia {
    pub fn media(&self) -> &MediaReference {
        &self.0
    }

    pub fn into_inner(self) -> MediaReference {
        self.0
    }
}

/// 音声ファイルのアップロード前検査
///
/// 外部から与えられたメタデータ（MIMEタイプ、サイズ）だけで判定する純粋関数。
/// ファイルヘッダーの中身は見ない。
///
/// # 判定ルール
///
/// 1. MIMEタイプがなければ拒否
/// 2. `audio/*` または許可リストのMIMEタイプのみ受け付ける
///    (大文字小文字は無視、`;` 以降のパラメータは無視)
/// 3. サイズが上限を超えていれば拒否 (サイズ不明の場合は通す)
///
/// # Examples
///
/// ```
/// # use reap_upload::validator::AudioValidator;
/// # use reap_upload::types::MediaReference;
/// let validator = AudioValidator::new(50 * 1024 * 1024, Vec::<String>::new());
///
/// let ok = MediaReference::from_bytes("a.mp3", Some("audio/mpeg".into()), vec![0; 16]);
/// assert!(validator.check(&ok).is_ok());
///
/// let ng = MediaReference::from_bytes("a.txt", Some("text/plain".into()), vec![0; 16]);
/// assert!(validator.check(&ng).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct AudioValidator {
    /// 受け付ける最大バイト数
    max_size_bytes: u64,

    /// `audio/` 以外に受け付けるMIMEタイプ（小文字に正規化済み）
    extra_mime_types: Vec<String>,
}

impl AudioValidator {
    pub fn new<I, S>(max_size_bytes: u64, extra_mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            max_size_bytes,
            extra_mime_types: extra_mime_types
                .into_iter()
                .map(|m| m.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.max_size_bytes, &config.extra_mime_types)
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// 判定のみ行う
    pub fn check(&self, media: &MediaReference) -> Result<(), Rejection> {
        let mime = match media.mime_type.as_deref().map(essence) {
            Some(m) if !m.is_empty() => m,
            _ => return Err(Rejection::MissingMimeType),
        };

        if !self.is_audio_mime(&mime) {
            return Err(Rejection::UnsupportedMimeType(mime));
        }

        match media.size {
            Some(size) if size > self.max_size_bytes => Err(Rejection::TooLarge {
                size,
                limit: self.max_size_bytes,
            }),
            Some(_) => Ok(()),
            None => {
                log::warn!("ファイルサイズ不明のため上限チェックを省略: {}", media.name);
                Ok(())
            }
        }
    }

    /// 判定し、通過したものを [`ValidatedMedia`] として返す
    pub fn validate(&self, media: MediaReference) -> Result<ValidatedMedia, Rejection> {
        match self.check(&media) {
            Ok(()) => {
                log::debug!(
                    "音声ファイル検査OK: {} ({:?}, {:?} バイト)",
                    media.name,
                    media.mime_type,
                    media.size
                );
                Ok(ValidatedMedia(media))
            }
            Err(e) => {
                log::info!("音声ファイル検査NG: {} - {}", media.name, e);
                Err(e)
            }
        }
    }

    fn is_audio_mime(&self, mime: &str) -> bool {
        mime.starts_with(AUDIO_MIME_PREFIX) || self.extra_mime_types.iter().any(|m| m == mime)
    }
}

/// "Audio/MP4; codecs=mp4a" → "audio/mp4"
fn essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}
