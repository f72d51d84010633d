use crate::types::{MediaReference, MediaSource};
use anyhow::{Context, Result};
use std::path::Path;

impl MediaReference {
    /// ディスク上のファイルから作成
    ///
    /// MIMEタイプは拡張子から推定し、推定できなければ `None` とする。
    /// サイズはファイルのメタデータから取得する。中身は読まない。
    ///
    /// # Errors
    ///
    /// ファイルが存在しない、または通常ファイルでない場合にエラーを返す。
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("ファイル情報の取得に失敗: {:?}", path))?;

        if !metadata.is_file() {
            anyhow::bail!("通常ファイルではありません: {:?}", path);
        }

        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .map(str::to_string);

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());

        log::debug!(
            "メディア参照を作成: {} ({:?}, {} バイト)",
            name,
            mime_type,
            metadata.len()
        );

        Ok(Self {
            name,
            mime_type,
            size: Some(metadata.len()),
            source: MediaSource::File(path.to_path_buf()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[tokio::test]
    async fn test_from_path_guesses_mime_and_size() {
        let mut file = Builder::new().suffix(".mp3").tempfile().unwrap();
        file.write_all(&[0u8; 2048]).unwrap();
        file.flush().unwrap();

        let media = MediaReference::from_path(file.path()).await.unwrap();
        assert_eq!(media.mime_type.as_deref(), Some("audio/mpeg"));
        assert_eq!(media.size, Some(2048));
        assert!(media.name.ends_with(".mp3"));
        assert!(matches!(media.source, MediaSource::File(_)));
    }

    #[tokio::test]
    async fn test_from_path_unknown_extension() {
        let file = Builder::new().suffix(".zzzunknown").tempfile().unwrap();

        let media = MediaReference::from_path(file.path()).await.unwrap();
        assert_eq!(media.mime_type, None);
        assert_eq!(media.size, Some(0));
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        assert!(MediaReference::from_path("no/such/file.wav").await.is_err());
    }

    #[tokio::test]
    async fn test_from_path_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MediaReference::from_path(dir.path()).await.is_err());
    }
}
