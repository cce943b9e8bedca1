//! 失败报告 - 业务能力层
//!
//! 只负责把最终失败的批次追加到 failed.txt，方便之后手动重跑

use std::path::PathBuf;

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::StorageError;

/// 失败报告
///
/// 职责：
/// - 每个最终失败的批次写一行
/// - 不关心重试策略
pub struct FailureReport {
    path: PathBuf,
}

impl FailureReport {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 写入一条失败记录
    ///
    /// 格式：`时间 | 分类 | 批次 | 原因`
    pub async fn write(
        &self,
        category: &str,
        batch_id: u64,
        reason: &str,
    ) -> Result<(), StorageError> {
        debug!("写入失败报告: 分类 {} | 批次 {}", category, batch_id);

        let display = self.path.display().to_string();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::write_failed(&display, e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StorageError::write_failed(&display, e))?;

        let line = format!(
            "{} | {} | 批次 {} | {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            category,
            batch_id,
            reason.replace('\n', " ")
        );
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StorageError::write_failed(&display, e))?;
        Ok(())
    }
}

impl Default for FailureReport {
    fn default() -> Self {
        Self::with_path("output/failed.txt")
    }
}
