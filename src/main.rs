use anyhow::{Context, Result};
use env_logger::Env;
use reap_upload::config::Config;
use reap_upload::recognize_api::RecognizeApiBackend;
use reap_upload::session::UploadSession;
use reap_upload::types::{MediaReference, UploadState, UploadTopic};
use reap_upload::validator::AudioValidator;
use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

const USAGE: &str = "使い方:
  reap-upload [config.toml] <音声ファイル> [--topic <daily|lecture|conversation|meeting>]
  reap-upload --generate-config [config.toml]
  reap-upload --list-topics";

#[tokio::main]
async fn main() -> Result<()> {
    // コマンドライン引数をパース
    let args: Vec<String> = std::env::args().skip(1).collect();

    // トピック一覧表示モード
    if args.first().map(String::as_str) == Some("--list-topics") {
        for topic in UploadTopic::ALL {
            println!("{}\t{}", topic.key(), topic.label());
        }
        return Ok(());
    }

    // 設定ファイル生成モード
    if args.first().map(String::as_str) == Some("--generate-config") {
        let config_path = args.get(1).map(String::as_str).unwrap_or("config.toml");
        Config::write_default(config_path)?;
        println!("設定ファイルを生成しました: {}", config_path);
        return Ok(());
    }

    let mut topic_arg = None;
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--topic" => {
                topic_arg = Some(iter.next().context("--topic の値がありません")?.clone());
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            other if other.starts_with("--") => anyhow::bail!("不明なオプション: {}\n{}", other, USAGE),
            other => positional.push(other.to_string()),
        }
    }

    let (config_path, media_path) = match positional.as_slice() {
        [media] => ("config.toml", media.as_str()),
        [config, media] => (config.as_str(), media.as_str()),
        _ => anyhow::bail!("{}", USAGE),
    };

    // 設定を読み込み（ロガーのレベルに使うためロガー初期化より先）
    let config_exists = Path::new(config_path).exists();
    let config = if config_exists {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    // ロガーを初期化
    env_logger::Builder::from_env(Env::default().default_filter_or(config.output.log_level.as_str()))
        .format_timestamp(None)
        .init();

    if !config_exists {
        log::warn!(
            "設定ファイルが見つかりません。デフォルト設定を使用します: {}",
            config_path
        );
    }

    let topic = match topic_arg {
        Some(t) => t.parse::<UploadTopic>()?,
        None => config.upload.default_topic,
    };

    log::info!("reap-upload を起動します");
    log::debug!("設定: {:?}", config);

    // Ctrl+C ハンドラを設定
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    ctrlc::set_handler(move || {
        log::info!("停止シグナルを受信しました...");
        running_clone.store(false, Ordering::SeqCst);
    })?;

    let backend = Arc::new(RecognizeApiBackend::new(&config.server)?);
    log::info!("アップロード先: {}", backend.url());

    let session = UploadSession::new(backend, AudioValidator::from_config(&config.upload));
    let mut uploads = session.subscribe_uploads();
    let mut state_rx = session.subscribe();

    let media = MediaReference::from_path(media_path).await?;
    let file_name = media.name.clone();
    session
        .upload(media, topic)
        .with_context(|| format!("{} をアップロードできません", file_name))?;

    // メインループ: 終端状態か停止を待つ
    loop {
        if !running.load(Ordering::SeqCst) {
            session.close();
            anyhow::bail!("アップロードを中断しました: {}", file_name);
        }

        if state_rx.borrow_and_update().is_terminal() {
            break;
        }

        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(100)) => {
                // タイムアウト: ループを継続して running をチェック
            }
        }
    }

    let outcome = session.state();
    session.reset();

    match outcome {
        UploadState::Success { .. } => {
            let event = uploads
                .recv()
                .await
                .context("成功イベントを受信できませんでした")?;
            // JSON形式で出力
            println!("{}", serde_json::to_string(&event)?);
            log::info!("reap-upload を終了しました");
            Ok(())
        }
        UploadState::Error { message } => {
            let report = serde_json::json!({
                "file_name": file_name,
                "topic": topic,
                "error": message,
                "failed_at": chrono::Utc::now().to_rfc3339(),
            });
            println!("{}", report);
            anyhow::bail!("アップロード失敗: {}", message)
        }
        other => anyhow::bail!("想定外の状態で終了しました: {}", other.name()),
    }
}
