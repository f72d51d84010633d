use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// アップロード対象の音声リソース
///
/// ユーザーが選択した音声ファイルへのハンドル。
/// バリデーション判定のためのメタデータ（MIMEタイプ、サイズ）と
/// 実データの取得元を保持する。永続化はしない。
///
/// # Examples
///
/// ```
/// # use reap_upload::types::MediaReference;
/// let media = MediaReference::from_bytes(
///     "memo.m4a",
///     Some("audio/mp4".to_string()),
///     vec![0u8; 1024],
/// );
/// assert_eq!(media.size, Some(1024));
/// ```
#[derive(Clone, Debug)]
pub struct MediaReference {
    /// 表示用のファイル名（multipart の filename にも使う）
    pub name: String,

    /// 宣言されたMIMEタイプ
    ///
    /// 判定できなかった場合は `None`
    pub mime_type: Option<String>,

    /// バイトサイズ
    ///
    /// 取得できなかった場合は `None`
    pub size: Option<u64>,

    /// 実データの取得元
    pub source: MediaSource,
}

/// 音声データの取得元
#[derive(Clone, Debug)]
pub enum MediaSource {
    /// ディスク上のファイル（送信時にストリーミングで読み出す）
    File(PathBuf),

    /// メモリ上のバイト列
    Memory(Vec<u8>),
}

impl MediaReference {
    /// メモリ上のバイト列から作成
    pub fn from_bytes(name: impl Into<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type,
            size: Some(bytes.len() as u64),
            source: MediaSource::Memory(bytes),
        }
    }
}

/// アップロードのトピック（分類タグ）
///
/// サーバーには韓国語ラベルがそのまま `topic` フィールドとして送られる。
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum UploadTopic {
    /// 日常 ("일상")
    #[default]
    #[serde(alias = "일상")]
    Daily,
    /// 講義 ("강의")
    #[serde(alias = "강의")]
    Lecture,
    /// 会話 ("대화")
    #[serde(alias = "대화")]
    Conversation,
    /// 会議 ("회의")
    #[serde(alias = "회의")]
    Meeting,
}

impl UploadTopic {
    /// 選択可能な全トピック（表示順）
    pub const ALL: [UploadTopic; 4] = [
        UploadTopic::Daily,
        UploadTopic::Lecture,
        UploadTopic::Conversation,
        UploadTopic::Meeting,
    ];

    /// 設定ファイル等で使う英語キー
    pub fn key(self) -> &'static str {
        match self {
            UploadTopic::Daily => "daily",
            UploadTopic::Lecture => "lecture",
            UploadTopic::Conversation => "conversation",
            UploadTopic::Meeting => "meeting",
        }
    }

    /// サーバーに送る韓国語ラベル
    pub fn label(self) -> &'static str {
        match self {
            UploadTopic::Daily => "일상",
            UploadTopic::Lecture => "강의",
            UploadTopic::Conversation => "대화",
            UploadTopic::Meeting => "회의",
        }
    }
}

impl fmt::Display for UploadTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for UploadTopic {
    type Err = anyhow::Error;

    /// 英語キー（大文字小文字を区別しない）または韓国語ラベルを受け付ける
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        UploadTopic::ALL
            .into_iter()
            .find(|t| t.key().eq_ignore_ascii_case(s) || t.label() == s)
            .ok_or_else(|| anyhow::anyhow!("不明なトピック: {}", s))
    }
}

/// サーバーが発行したファイルID
///
/// サーバーは数値・文字列のどちらでも返しうるため、文字列に正規化して保持する。
#[derive(Clone, Debug, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct FileId(pub String);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        FileId(s.to_string())
    }
}

impl From<i64> for FileId {
    fn from(n: i64) -> Self {
        FileId(n.to_string())
    }
}

impl<'de> Deserialize<'de> for FileId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => FileId(n.to_string()),
            Raw::Text(s) => FileId(s),
        })
    }
}

/// 音声認識アップロードAPIのレスポンス
///
/// # JSON例
///
/// ```json
/// { "success": true, "fileId": 42, "message": null }
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeResponse {
    /// 処理成功フラグ
    pub success: bool,

    /// 成功時に発行されるファイルID
    #[serde(default)]
    pub file_id: Option<FileId>,

    /// 失敗時のメッセージ
    #[serde(default)]
    pub message: Option<String>,
}

/// アップロードの状態
///
/// 1セッションにつき常にどれか1つの値を取る。
/// `Success` / `Error` は明示的にリセットされるまで終端状態。
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum UploadState {
    /// 待機中
    #[default]
    Idle,

    /// アップロード中
    Uploading,

    /// 成功（サーバー発行のファイルID付き）
    Success { file_id: FileId },

    /// 失敗（ユーザー向けメッセージ付き）
    Error { message: String },
}

impl UploadState {
    /// 終端状態（Success / Error）かどうか
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Success { .. } | UploadState::Error { .. })
    }

    /// ログ用の状態名
    pub fn name(&self) -> &'static str {
        match self {
            UploadState::Idle => "idle",
            UploadState::Uploading => "uploading",
            UploadState::Success { .. } => "success",
            UploadState::Error { .. } => "error",
        }
    }
}

/// アップロード成功イベント
///
/// 成功した試行ごとにちょうど1回発行される。
/// 受信側は最近の録音一覧の再取得などに使う。
#[derive(Clone, Debug, Serialize)]
pub struct UploadedFile {
    /// サーバー発行のファイルID
    pub file_id: FileId,

    /// 送信したトピック
    pub topic: UploadTopic,

    /// 送信したファイル名
    pub file_name: String,

    /// 完了時刻（ISO 8601）
    pub completed_at: String,
}

impl UploadedFile {
    pub fn new(file_id: FileId, topic: UploadTopic, file_name: String) -> Self {
        Self {
            file_id,
            topic,
            file_name,
            completed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_parse_accepts_key_and_label() {
        assert_eq!("lecture".parse::<UploadTopic>().unwrap(), UploadTopic::Lecture);
        assert_eq!("MEETING".parse::<UploadTopic>().unwrap(), UploadTopic::Meeting);
        assert_eq!("대화".parse::<UploadTopic>().unwrap(), UploadTopic::Conversation);
        assert_eq!(" 일상 ".parse::<UploadTopic>().unwrap(), UploadTopic::Daily);
        assert!("podcast".parse::<UploadTopic>().is_err());
    }

    #[test]
    fn test_topic_serialization() {
        let json = serde_json::to_string(&UploadTopic::Conversation).unwrap();
        assert_eq!(json, r#""conversation""#);
        assert_eq!(UploadTopic::Conversation.to_string(), "대화");
    }

    #[test]
    fn test_topic_deserializes_from_label() {
        let topic: UploadTopic = serde_json::from_str(r#""회의""#).unwrap();
        assert_eq!(topic, UploadTopic::Meeting);
        let topic: UploadTopic = serde_json::from_str(r#""daily""#).unwrap();
        assert_eq!(topic, UploadTopic::Daily);
    }

    #[test]
    fn test_recognize_response_numeric_file_id() {
        let resp: RecognizeResponse =
            serde_json::from_str(r#"{"success": true, "fileId": 42}"#).unwrap();
        assert!(resp.success);
        assert_eq!(resp.file_id, Some(FileId::from(42i64)));
        assert_eq!(resp.message, None);
    }

    #[test]
    fn test_recognize_response_string_file_id_and_failure() {
        let resp: RecognizeResponse =
            serde_json::from_str(r#"{"success": true, "fileId": "f-7"}"#).unwrap();
        assert_eq!(resp.file_id, Some(FileId::from("f-7")));

        let resp: RecognizeResponse =
            serde_json::from_str(r#"{"success": false, "message": "quota exceeded"}"#).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.file_id, None);
        assert_eq!(resp.message.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn test_upload_state_terminal() {
        assert!(!UploadState::Idle.is_terminal());
        assert!(!UploadState::Uploading.is_terminal());
        assert!(UploadState::Success { file_id: FileId::from(1i64) }.is_terminal());
        assert!(UploadState::Error { message: "x".to_string() }.is_terminal());
        assert_eq!(UploadState::default(), UploadState::Idle);
    }

    #[test]
    fn test_uploaded_file_json_serialization() {
        let event = UploadedFile::new(FileId::from(9i64), UploadTopic::Meeting, "a.mp3".to_string());
        let json = serde_json::to_string(&event).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["file_id"], "9");
        assert_eq!(parsed["topic"], "meeting");
        assert_eq!(parsed["file_name"], "a.mp3");
        assert!(!event.completed_at.is_empty());
    }
}
