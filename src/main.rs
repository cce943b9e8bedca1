use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use trivia_batch_scraper::cli::{Cli, Commands};
use trivia_batch_scraper::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    logger::init(cli.verbose);

    // 加载配置
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };

    let app = App::new(config);
    app.ensure_directories().await?;

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let summary = match &cli.command {
        Commands::Batch(args) => {
            spawn_deadline(args.common.timeout, cancel.clone());
            app.run_batch(args, cancel).await?
        }
        Commands::Single(args) => {
            spawn_deadline(args.common.timeout, cancel.clone());
            app.run_single(args, cancel).await?
        }
        Commands::Status => {
            app.status().await?;
            return Ok(());
        }
        Commands::Health => return app.health().await,
    };

    if summary.aborted {
        info!("💡 使用 batch --resume 继续未完成的批次");
    }
    Ok(())
}

/// Ctrl+C / SIGTERM 触发取消
fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("⏹️ 收到退出信号，停止派发新批次，等待进行中的任务...");
        cancel.cancel();
    });
}

/// 到达超时时间后触发取消
fn spawn_deadline(timeout_secs: Option<u64>, cancel: CancellationToken) {
    let Some(secs) = timeout_secs else {
        return;
    };
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                warn!("⏰ 运行超过 {} 秒，开始停止", secs);
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
