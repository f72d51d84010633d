use crate::state::UploadStateMachine;
use crate::types::{MediaReference, RecognizeResponse, UploadState, UploadTopic, UploadedFile};
use crate::upload_backend::{UploadBackend, UploadError};
use crate::validator::{AudioValidator, Rejection, ValidatedMedia};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// 成功イベントの保持数（受信が遅れた購読者向け）
const EVENT_CAPACITY: usize = 16;

/// アップロード要求が受け付けられなかった理由
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// 事前検査で弾かれた（通信は発生していない）
    #[error("アップロードできないファイルです: {0}")]
    Rejected(#[from] Rejection),

    /// 別の試行が進行中、または終端状態がまだリセットされていない
    #[error("アップロードを開始できません (現在の状態: {})", .0.name())]
    Busy(UploadState),

    /// セッションは既に閉じられている
    #[error("セッションは終了しています")]
    Closed,
}

/// 試行の管理情報
///
/// 開始・完了・終了の各処理はこのロックを取ってから状態を変える。
#[derive(Debug, Default)]
struct Attempts {
    /// 実行中（または最後に実行した）タスク
    task: Option<JoinHandle<()>>,
    /// 試行ごとに1ずつ増える番号
    generation: u64,
    closed: bool,
}

fn lock(attempts: &Mutex<Attempts>) -> MutexGuard<'_, Attempts> {
    attempts.lock().unwrap_or_else(|e| e.into_inner())
}

/// 1画面（呼び出し元）に紐づくアップロードセッション
///
/// 状態機械を1つ所有し、リモート呼び出しをバックグラウンドタスクで実行する。
/// 同時に実行できるアップロードは1つだけで、実行中や終端状態のまま
/// 次の要求が来た場合は [`SubmitError::Busy`] で拒否する。
///
/// [`close`](Self::close) またはドロップで実行中の呼び出しを中断する。
pub struct UploadSession {
    backend: Arc<dyn UploadBackend>,
    validator: AudioValidator,
    state: UploadStateMachine,
    events: broadcast::Sender<UploadedFile>,
    /// 試行番号と、その試行の結果
    outcomes: Arc<watch::Sender<(u64, UploadState)>>,
    attempts: Arc<Mutex<Attempts>>,
}

impl UploadSession {
    pub fn new(backend: Arc<dyn UploadBackend>, validator: AudioValidator) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (outcomes, _) = watch::channel((0, UploadState::Idle));
        Self {
            backend,
            validator,
            state: UploadStateMachine::new(),
            events,
            outcomes: Arc::new(outcomes),
            attempts: Arc::new(Mutex::new(Attempts::default())),
        }
    }

    /// 現在の状態
    pub fn state(&self) -> UploadState {
        self.state.current()
    }

    /// 状態機械への参照（ストリーム購読用）
    pub fn state_machine(&self) -> &UploadStateMachine {
        &self.state
    }

    /// 状態変化を購読
    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.state.subscribe()
    }

    /// 成功イベントを購読
    pub fn subscribe_uploads(&self) -> broadcast::Receiver<UploadedFile> {
        self.events.subscribe()
    }

    pub fn validator(&self) -> &AudioValidator {
        &self.validator
    }

    /// 検査してからアップロードを開始
    ///
    /// # Errors
    ///
    /// 検査に落ちた場合は通信せずに [`SubmitError::Rejected`] を返す。
    pub fn upload(&self, media: MediaReference, topic: UploadTopic) -> Result<(), SubmitError> {
        if self.is_closed() {
            return Err(SubmitError::Closed);
        }
        let validated = self.validator.validate(media)?;
        self.submit(validated, topic)
    }

    /// 検査済みの音声でアップロードを開始
    ///
    /// `Idle → Uploading` に遷移させ、リモート呼び出しを起動して即座に戻る。
    /// 結果は状態の購読で受け取る。tokio ランタイム上で呼ぶこと。
    pub fn submit(&self, media: ValidatedMedia, topic: UploadTopic) -> Result<(), SubmitError> {
        // close() と交差しないよう、登録まで同じロックの中で行う
        let mut attempts = lock(&self.attempts);
        if attempts.closed {
            return Err(SubmitError::Closed);
        }

        self.state.begin().map_err(|current| {
            log::warn!("アップロード要求を拒否: 状態 {}", current.name());
            SubmitError::Busy(current)
        })?;

        attempts.generation += 1;
        let generation = attempts.generation;

        let media = media.into_inner();
        log::info!(
            "アップロード開始: {} (topic={}, 試行 #{})",
            media.name,
            topic.key(),
            generation
        );

        let backend = Arc::clone(&self.backend);
        let state = self.state.clone();
        let events = self.events.clone();
        let outcomes = Arc::clone(&self.outcomes);
        let shared = Arc::clone(&self.attempts);

        let handle = tokio::spawn(async move {
            let result = backend.recognize(topic, &media).await;

            let attempts = lock(&shared);
            if attempts.closed || attempts.generation != generation {
                log::debug!("終了済みの試行 #{} の結果を破棄", generation);
                return;
            }
            let outcome = settle(&state, &events, topic, &media, result);
            outcomes.send_replace((generation, outcome));
        });

        // 前回のタスクは終端状態を経ているので完了済み
        attempts.task = Some(handle);

        Ok(())
    }

    /// 終端状態を `Idle` に戻す（何度呼んでもよい）
    pub fn reset(&self) -> bool {
        self.state.reset()
    }

    /// 実行中の試行の結果を待つ
    ///
    /// - `Uploading` 中なら、その試行の結果（`Success` / `Error`）を返す。
    ///   結果が出た直後に他の購読者が `reset()` しても取りこぼさない
    /// - 終端状態ならその状態を、`Idle` ならすぐに `Idle` を返す
    /// - 待機中にセッションが閉じられた場合は `Idle` を返す
    pub async fn wait_for_outcome(&self) -> UploadState {
        let (generation, mut rx) = {
            let attempts = lock(&self.attempts);
            let current = self.state.current();
            if attempts.closed || current != UploadState::Uploading {
                return current;
            }
            (attempts.generation, self.outcomes.subscribe())
        };

        let outcome = match rx.wait_for(|(g, _)| *g >= generation).await {
            Ok(outcome) => outcome.1.clone(),
            Err(_) => self.state.current(),
        };
        outcome
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.attempts).closed
    }

    /// セッションを終了する
    ///
    /// 実行中の呼び出しを中断し、状態を `Idle` に戻す。以降の要求は拒否される。
    pub fn close(&self) {
        let mut attempts = lock(&self.attempts);
        if attempts.closed {
            return;
        }
        attempts.closed = true;

        if let Some(handle) = attempts.task.take() {
            if !handle.is_finished() {
                log::info!("実行中のアップロードを中断します");
            }
            handle.abort();
        }

        self.state.force_idle();
        self.outcomes
            .send_replace((attempts.generation, UploadState::Idle));
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// リモート呼び出しの結果を状態に反映し、反映後の状態を返す
fn settle(
    state: &UploadStateMachine,
    events: &broadcast::Sender<UploadedFile>,
    topic: UploadTopic,
    media: &MediaReference,
    result: Result<RecognizeResponse, UploadError>,
) -> UploadState {
    match result {
        Ok(RecognizeResponse {
            success: true,
            file_id: Some(file_id),
            ..
        }) => {
            log::info!("アップロード成功: {} → ファイルID {}", media.name, file_id);
            if state.succeed(file_id.clone()) {
                // 購読者がいなくてもエラーにしない
                let _ = events.send(UploadedFile::new(file_id, topic, media.name.clone()));
            }
        }
        Ok(RecognizeResponse {
            success: true,
            file_id: None,
            ..
        }) => {
            log::error!("アップロード応答にファイルIDがありません: {}", media.name);
            state.fail("サーバー応答にファイルIDがありません");
        }
        Ok(RecognizeResponse {
            success: false,
            message,
            ..
        }) => {
            let message = message.unwrap_or_else(|| "サーバーが処理に失敗しました".to_string());
            log::error!("アップロード失敗: {} - {}", media.name, message);
            state.fail(message);
        }
        Err(e) => {
            log::error!("アップロード失敗: {} - {}", media.name, e);
            state.fail(e.to_string());
        }
    }
    state.current()
}
