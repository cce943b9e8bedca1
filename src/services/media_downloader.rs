//! 媒体下载端
//!
//! 把题目里的图片和音频下载到 `assets/images`、`assets/audio`。
//! 已经存在的文件不再下载；单个文件下载失败只记录告警，磁盘写入失败才是存储错误。

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::models::QuestionRecord;
use crate::services::result_sink::ResultSink;

/// 媒体下载端
pub struct MediaDownloader {
    client: reqwest::Client,
    images_dir: PathBuf,
    audio_dir: PathBuf,
}

impl MediaDownloader {
    pub fn new(
        images_dir: impl Into<PathBuf>,
        audio_dir: impl Into<PathBuf>,
        request_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StorageError::DownloadFailed {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            images_dir: images_dir.into(),
            audio_dir: audio_dir.into(),
        })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let download_failed = |e: reqwest::Error| StorageError::DownloadFailed {
            url: url.to_string(),
            message: e.to_string(),
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(download_failed)?
            .error_for_status()
            .map_err(download_failed)?;
        let bytes = response.bytes().await.map_err(download_failed)?;
        Ok(bytes.to_vec())
    }

    async fn download(&self, url: &str, dir: &Path, key: &str) -> Result<(), StorageError> {
        let target = dir.join(media_file_name(key, url));
        if fs::try_exists(&target).await.unwrap_or(false) {
            return Ok(());
        }

        let bytes = match self.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("⚠️ {}", e);
                return Ok(());
            }
        };

        let shown = target.display().to_string();
        fs::create_dir_all(dir)
            .await
            .map_err(|e| StorageError::write_failed(&shown, e))?;
        fs::write(&target, bytes)
            .await
            .map_err(|e| StorageError::write_failed(&shown, e))?;
        debug!("已下载媒体: {}", shown);
        Ok(())
    }
}

/// 媒体文件名：题目 key + URL 中的扩展名
pub fn media_file_name(key: &str, url: &str) -> String {
    let safe_key: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("{}.{}", safe_key, ext),
        None => safe_key,
    }
}

#[async_trait]
impl ResultSink for MediaDownloader {
    fn name(&self) -> &str {
        "media"
    }

    async fn write(&mut self, records: &[QuestionRecord]) -> Result<(), StorageError> {
        for record in records {
            if let Some(url) = record.image_url.as_deref() {
                self.download(url, &self.images_dir, &record.key).await?;
            }
            if let Some(url) = record.audio_url.as_deref() {
                self.download(url, &self.audio_dir, &record.key).await?;
            }
        }
        Ok(())
    }
}
