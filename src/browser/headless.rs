use std::path::Path;

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::BrowserError;

/// 启动无头浏览器
///
/// 未指定可执行文件时由 chromiumoxide 自动查找本机的 Chrome/Chromium。
pub async fn launch_headless_browser(executable: Option<&Path>) -> Result<Browser, BrowserError> {
    info!("🚀 启动无头浏览器...");

    let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
        "--disable-gpu",
        "--no-sandbox",             // 容器内没有用户命名空间
        "--disable-dev-shm-usage",  // 防止共享内存不足
        "--remote-debugging-port=0",
    ]);
    if let Some(path) = executable {
        debug!("浏览器可执行文件: {}", path.display());
        builder = builder.chrome_executable(path);
    }

    let config = builder.build().map_err(|e| {
        error!("配置无头浏览器失败: {}", e);
        BrowserError::LaunchFailed(e)
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        BrowserError::LaunchFailed(e.to_string())
    })?;
    debug!("无头浏览器启动成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    sleep(tokio::time::Duration::from_millis(300)).await;

    info!("✅ 无头浏览器已就绪");
    Ok(browser)
}
