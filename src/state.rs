use crate::types::{FileId, UploadState};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// アップロード状態機械
///
/// 現在値を1つだけ持ち、値が変わったときにだけ購読者へ通知する。
///
/// # 状態遷移
///
/// ```text
///          begin()            succeed(id)
/// [Idle] ──────────→ [Uploading] ──────────→ [Success{id}]
///   ↑                     │                        │
///   │                     │ fail(msg)              │
///   │                     ↓                        │
///   └──── reset() ─── [Error{msg}] ←───────────────┘ reset()
/// ```
///
/// - `begin()` は `Idle` からのみ成功する
/// - `succeed()` / `fail()` は `Uploading` のときのみ反映される
/// - `reset()` は終端状態を `Idle` に戻す。`Idle` では何もしない。
///   `Uploading` 中は実行中の試行を消さないよう無視する
///
/// # Examples
///
/// ```
/// # use reap_upload::state::UploadStateMachine;
/// # use reap_upload::types::{FileId, UploadState};
/// let machine = UploadStateMachine::new();
/// machine.begin().unwrap();
/// machine.succeed(FileId::from(42i64));
/// assert_eq!(machine.current(), UploadState::Success { file_id: FileId::from(42i64) });
/// machine.reset();
/// assert_eq!(machine.current(), UploadState::Idle);
/// ```
#[derive(Clone, Debug)]
pub struct UploadStateMachine {
    tx: Arc<watch::Sender<UploadState>>,
}

impl UploadStateMachine {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(UploadState::Idle);
        Self { tx: Arc::new(tx) }
    }

    /// 現在の状態
    pub fn current(&self) -> UploadState {
        self.tx.borrow().clone()
    }

    /// 状態変化を購読
    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.tx.subscribe()
    }

    /// 状態変化をストリームとして購読（最初に現在値が流れる）
    pub fn stream(&self) -> WatchStream<UploadState> {
        WatchStream::new(self.subscribe())
    }

    /// `Idle → Uploading`
    ///
    /// # Errors
    ///
    /// `Idle` 以外の場合は遷移せず、その時点の状態を返す。
    pub fn begin(&self) -> Result<(), UploadState> {
        let mut blocked = None;
        self.tx.send_if_modified(|state| {
            if *state == UploadState::Idle {
                *state = UploadState::Uploading;
                true
            } else {
                blocked = Some(state.clone());
                false
            }
        });

        match blocked {
            None => {
                log::debug!("アップロード状態: idle → uploading");
                Ok(())
            }
            Some(state) => Err(state),
        }
    }

    /// `Uploading → Success{file_id}`
    ///
    /// 遷移したら true を返す
    pub fn succeed(&self, file_id: FileId) -> bool {
        self.finish(UploadState::Success { file_id })
    }

    /// `Uploading → Error{message}`
    ///
    /// 遷移したら true を返す
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.finish(UploadState::Error {
            message: message.into(),
        })
    }

    /// 終端状態を `Idle` に戻す
    ///
    /// 遷移したら true を返す。何度呼んでもよい。
    pub fn reset(&self) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if state.is_terminal() {
                *state = UploadState::Idle;
                true
            } else {
                false
            }
        });
        if changed {
            log::debug!("アップロード状態: リセット → idle");
        }
        changed
    }

    /// 状態に関係なく `Idle` に戻す（セッション破棄時のみ使用）
    pub(crate) fn force_idle(&self) {
        self.tx.send_if_modified(|state| {
            if *state == UploadState::Idle {
                false
            } else {
                *state = UploadState::Idle;
                true
            }
        });
    }

    fn finish(&self, outcome: UploadState) -> bool {
        let name = outcome.name();
        let changed = self.tx.send_if_modified(|state| {
            if *state == UploadState::Uploading {
                *state = outcome;
                true
            } else {
                false
            }
        });

        if changed {
            log::debug!("アップロード状態: uploading → {}", name);
        } else {
            log::warn!("uploading 以外の状態で完了通知を受信したため無視: {}", name);
        }
        changed
    }
}

impl Default for UploadStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
