//! reap-upload - 音声録音・文字起こしサービスのアップロードクライアント
//!
//! このクレートは、ユーザーが選んだ音声ファイルを検査し、
//! トピックと共に音声認識サーバーへアップロードして、
//! その進行状況を購読可能な状態として提供します。
//!
//! # 主な機能
//!
//! - **アップロード前検査**: MIMEタイプとファイルサイズで音声ファイルを判定
//! - **状態機械**: Idle → Uploading → Success / Error → Idle の遷移を1箇所で管理
//! - **状態の購読**: watch チャンネル / ストリームで状態変化を通知
//! - **multipart アップロード**: `topic` と `media` を音声認識APIへ送信
//! - **セッション管理**: 同時アップロードの拒否と、終了時の中断
//!
//! # アーキテクチャ
//!
//! ```text
//! [音声ファイル] → [MediaReference] → [AudioValidator]
//!                                           ↓ ValidatedMedia
//!                                    [UploadSession] ──→ [UploadBackend]
//!                                           │               (RecognizeApiBackend)
//!                                           ↓
//!                                  [UploadStateMachine]
//!                                     │            │
//!                                     ↓            ↓
//!                              [状態の購読者]  [成功イベント]
//! ```
//!
//! # 使用例
//!
//! ```no_run
//! use reap_upload::config::Config;
//! use reap_upload::recognize_api::RecognizeApiBackend;
//! use reap_upload::session::UploadSession;
//! use reap_upload::types::{MediaReference, UploadTopic};
//! use reap_upload::validator::AudioValidator;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load_or_default("config.toml")?;
//! let backend = Arc::new(RecognizeApiBackend::new(&config.server)?);
//! let session = UploadSession::new(backend, AudioValidator::from_config(&config.upload));
//!
//! let media = MediaReference::from_path("memo.m4a").await?;
//! session.upload(media, UploadTopic::Lecture)?;
//! let outcome = session.wait_for_outcome().await;
//! println!("{:?}", outcome);
//! session.reset();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod media;
pub mod recognize_api;
pub mod session;
pub mod state;
pub mod types;
pub mod upload_backend;
pub mod validator;
