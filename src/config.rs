use crate::types::UploadTopic;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// サーバー接続設定
///
/// 音声認識アップロードAPIの接続先に関する設定。
///
/// # デフォルト値
///
/// - `base_url`: "http://localhost:8080"
/// - `recognize_path`: "/auth/recognize-url"
/// - `access_token`: なし
/// - `timeout_seconds`: 120 秒 (大きめの音声ファイルを想定)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_recognize_path")]
    pub recognize_path: String,
    /// ログイン後に発行されるアクセストークン。省略可能
    pub access_token: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// アップロード前検査の設定
///
/// # デフォルト値
///
/// - `max_size_bytes`: 52428800 (50 MiB)
/// - `extra_mime_types`: ["audio/mp4", "audio/x-m4a"]
/// - `default_topic`: "daily" (韓国語ラベル "일상" でも可)
///
/// `extra_mime_types` に `audio/` 以外の形式（例: "application/ogg",
/// "video/3gpp"）を加えると、受け付ける範囲が広がる。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
    /// `audio/` 以外で受け付けるコンテナ形式のMIMEタイプ
    #[serde(default = "default_extra_mime_types")]
    pub extra_mime_types: Vec<String>,
    #[serde(default)]
    pub default_topic: UploadTopic,
}

/// 出力設定
///
/// # デフォルト値
///
/// - `log_level`: "info"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default functions
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_recognize_path() -> String {
    "/auth/recognize-url".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_max_size_bytes() -> u64 {
    50 * 1024 * 1024 // 50 MiB
}

fn default_extra_mime_types() -> Vec<String> {
    vec!["audio/mp4".to_string(), "audio/x-m4a".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            recognize_path: default_recognize_path(),
            access_token: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            extra_mime_types: default_extra_mime_types(),
            default_topic: UploadTopic::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// アップロード先の完全なURL
    pub fn recognize_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.recognize_path.trim_start_matches('/')
        )
    }
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// TOML形式の設定ファイルをパースしてConfig構造体を生成する。
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use reap_upload::config::Config;
    /// let config = Config::from_file("config.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// 既存のファイルは上書きされる。
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込み、なければデフォルトを使用
    ///
    /// # Errors
    ///
    /// ファイルが存在するがパースに失敗した場合にエラーを返す。
    /// ファイルが存在しない場合はエラーにならず、デフォルト設定を返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
                path.as_ref()
            );
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.base_url, "http://localhost:8080");
        assert_eq!(config.server.recognize_path, "/auth/recognize-url");
        assert!(config.server.access_token.is_none());
        assert_eq!(config.upload.max_size_bytes, 52_428_800);
        assert_eq!(config.upload.default_topic, UploadTopic::Daily);
        assert_eq!(config.output.log_level, "info");
    }

    #[test]
    fn test_write_and_read_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        // デフォルト設定を書き込み
        Config::write_default(path).unwrap();

        // 読み込み
        let config = Config::from_file(path).unwrap();
        assert_eq!(config.server.timeout_seconds, 120);
        assert_eq!(config.upload.extra_mime_types.len(), 2);
    }

    #[test]
    fn test_custom_config() {
        let toml_content = r#"
[server]
base_url = "https://api.example.com/"
recognize_path = "/v2/recognize"
access_token = "secret"
timeout_seconds = 30

[upload]
max_size_bytes = 10485760
extra_mime_types = ["application/ogg"]
default_topic = "meeting"

[output]
log_level = "debug"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.server.access_token.as_deref(), Some("secret"));
        assert_eq!(config.server.timeout_seconds, 30);
        assert_eq!(
            config.server.recognize_url(),
            "https://api.example.com/v2/recognize"
        );
        assert_eq!(config.upload.max_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.upload.extra_mime_types, vec!["application/ogg"]);
        assert_eq!(config.upload.default_topic, UploadTopic::Meeting);
        assert_eq!(config.output.log_level, "debug");
    }

    #[test]
    fn test_load_or_default_nonexistent() {
        let config = Config::load_or_default("nonexistent_file.toml").unwrap();
        // デフォルト設定が返されることを確認
        assert_eq!(config.upload.max_size_bytes, 52_428_800);
    }

    #[test]
    fn test_partial_config() {
        // 一部の設定のみ記述した場合、残りはデフォルト値が使われる
        let toml_content = r#"
[server]
base_url = "http://10.0.2.2:8080"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        // 指定した値
        assert_eq!(config.server.base_url, "http://10.0.2.2:8080");

        // デフォルト値
        assert_eq!(config.server.recognize_url(), "http://10.0.2.2:8080/auth/recognize-url");
        assert_eq!(config.upload.default_topic, UploadTopic::Daily);
        assert_eq!(config.upload.extra_mime_types, vec!["audio/mp4", "audio/x-m4a"]);
    }

    #[test]
    fn test_topic_accepts_korean_label() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all("[upload]\ndefault_topic = \"강의\"\n".as_bytes())
            .unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.upload.default_topic, UploadTopic::Lecture);
    }

    #[test]
    fn test_invalid_topic_fails() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[upload]\ndefault_topic = \"podcast\"\n")
            .unwrap();
        temp_file.flush().unwrap();

        assert!(Config::from_file(temp_file.path()).is_err());
    }
}
