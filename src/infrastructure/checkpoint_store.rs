//! 检查点存储 - 基础设施层
//!
//! JSON Lines 文件，每行一条 `CheckpointRecord`，只追加。
//! 这是断点续传唯一需要的持久状态，内存中的运行状态都可以由它重建。

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::StorageError;
use crate::models::{BatchKey, BatchStatus, CheckpointRecord};

/// 检查点存储
pub struct CheckpointStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl CheckpointStore {
    /// 打开（或创建）检查点文件
    ///
    /// 如果上次崩溃留下了不完整的末行，先把它截掉，保证新记录从干净的行开始。
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let display = path.display().to_string();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::write_failed(&display, e))?;
            }
        }

        repair_trailing_record(&path).await?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::write_failed(&display, e))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// 开始一次全新的运行：已有的检查点文件改名备份，然后新建
    pub async fn start_fresh(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if fs::try_exists(&path).await.unwrap_or(false) {
            let backup = backup_path(&path);
            fs::rename(&path, &backup)
                .await
                .map_err(|e| StorageError::write_failed(path.display().to_string(), e))?;
            info!("💾 已备份旧检查点: {}", backup.display());
        }
        Self::open(path).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一条记录，返回前已落盘
    pub async fn append(&self, record: &CheckpointRecord) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let display = self.path.display().to_string();
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StorageError::write_failed(&display, e))?;
        file.flush()
            .await
            .map_err(|e| StorageError::write_failed(&display, e))?;
        file.sync_data()
            .await
            .map_err(|e| StorageError::write_failed(&display, e))?;
        Ok(())
    }

    /// 读取全部记录
    pub async fn load(&self) -> Result<Vec<CheckpointRecord>, StorageError> {
        read_records(&self.path).await
    }

    /// 读取全部记录并建立索引
    pub async fn index(&self) -> Result<CheckpointIndex, StorageError> {
        Ok(CheckpointIndex::from_records(self.load().await?))
    }
}

/// 从文件读取所有完整的记录
///
/// 末尾没有换行的那一段是崩溃时写了一半的记录（可能截断在多字节字符中间），
/// 直接丢弃；中间无法解析的行跳过并告警。文件不存在时返回空列表。
pub async fn read_records(path: &Path) -> Result<Vec<CheckpointRecord>, StorageError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::read_failed(path.display().to_string(), e)),
    };

    let complete = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);
    let tail = &bytes[complete..];
    if tail.iter().any(|b| !b.is_ascii_whitespace()) {
        warn!("⚠️ 丢弃检查点文件末尾不完整的记录 ({} 字节)", tail.len());
    }

    let mut records = Vec::new();
    for (line_no, line) in bytes[..complete].split(|b| *b == b'\n').enumerate() {
        if line.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }
        match serde_json::from_slice::<CheckpointRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => warn!("⚠️ 跳过无法解析的检查点记录 (第 {} 行): {}", line_no + 1, e),
        }
    }

    Ok(records)
}

async fn repair_trailing_record(path: &Path) -> Result<(), StorageError> {
    let display = path.display().to_string();
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StorageError::read_failed(display, e)),
    };

    if bytes.is_empty() || bytes.last() == Some(&b'\n') {
        return Ok(());
    }

    let keep = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);

    warn!(
        "⚠️ 检查点文件末尾有 {} 字节不完整的记录，截断修复",
        bytes.len() - keep
    );

    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .map_err(|e| StorageError::write_failed(&display, e))?;
    file.set_len(keep as u64)
        .await
        .map_err(|e| StorageError::write_failed(&display, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::write_failed(&display, e))?;
    Ok(())
}

fn backup_path(path: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.bak", stamp));
    path.with_file_name(name)
}

/// 检查点索引：按键保留最新的记录
#[derive(Debug, Default)]
pub struct CheckpointIndex {
    latest: HashMap<BatchKey, CheckpointRecord>,
    total_records: usize,
}

impl CheckpointIndex {
    /// 按文件顺序扫描，后出现的记录覆盖先出现的
    pub fn from_records(records: Vec<CheckpointRecord>) -> Self {
        let total_records = records.len();
        let mut latest = HashMap::new();
        for record in records {
            latest.insert(record.key(), record);
        }
        Self {
            latest,
            total_records,
        }
    }

    /// 最新状态为成功的批次范围
    pub fn completed_set(&self) -> BTreeSet<BatchKey> {
        self.latest
            .iter()
            .filter(|(_, r)| r.status == BatchStatus::Succeeded)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// 已确认没有更多题目的分类
    pub fn exhausted_categories(&self) -> BTreeSet<String> {
        self.latest
            .values()
            .filter(|r| r.status == BatchStatus::Succeeded && r.exhausted)
            .map(|r| r.category.clone())
            .collect()
    }

    /// 每个已抓完分类中最早报告抓完的批次偏移量
    ///
    /// 续传时只需要跳过这个偏移量之后的批次，之前未成功的批次仍要重跑。
    pub fn exhausted_offsets(&self) -> BTreeMap<String, usize> {
        let mut offsets: BTreeMap<String, usize> = BTreeMap::new();
        for record in self.latest.values() {
            if record.status == BatchStatus::Succeeded && record.exhausted {
                offsets
                    .entry(record.category.clone())
                    .and_modify(|o| *o = (*o).min(record.offset))
                    .or_insert(record.offset);
            }
        }
        offsets
    }

    /// 最新状态为失败或部分完成的分类（可手动重跑）
    pub fn failed_categories(&self) -> BTreeSet<String> {
        self.latest
            .values()
            .filter(|r| r.status != BatchStatus::Succeeded)
            .map(|r| r.category.clone())
            .collect()
    }

    /// 各状态的批次数
    pub fn status_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in self.latest.values() {
            *counts.entry(record.status.to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// 成功批次累计收集的题目数
    pub fn collected_records(&self) -> usize {
        self.latest
            .values()
            .filter(|r| r.status == BatchStatus::Succeeded)
            .map(|r| r.records_collected)
            .sum()
    }

    /// 文件中的记录行数（含被覆盖的）
    pub fn total_records(&self) -> usize {
        self.total_records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BatchDescriptor;

    fn batch(id: u64, offset: usize) -> BatchDescriptor {
        BatchDescriptor {
            batch_id: id,
            category: "movies".into(),
            group: 1,
            offset,
            question_quota: Some(5),
            attempt_count: 0,
        }
    }

    #[tokio::test]
    async fn append_then_reload_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("checkpoints.jsonl");

        {
            let store = CheckpointStore::open(&path).await.unwrap();
            store
                .append(&CheckpointRecord::for_batch(&batch(1, 0), BatchStatus::Succeeded, 5, false, None))
                .await
                .unwrap();
            store
                .append(&CheckpointRecord::for_batch(
                    &batch(2, 5),
                    BatchStatus::Failed,
                    0,
                    false,
                    Some("network".into()),
                ))
                .await
                .unwrap();
        }

        let store = CheckpointStore::open(&path).await.unwrap();
        let records = store.load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].error_detail.as_deref(), Some("network"));
    }

    #[tokio::test]
    async fn truncated_tail_is_discarded_and_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.jsonl");

        let good = serde_json::to_string(&CheckpointRecord::for_batch(
            &batch(1, 0),
            BatchStatus::Succeeded,
            5,
            false,
            None,
        ))
        .unwrap();
        std::fs::write(&path, format!("{}\n{{\"batch_id\":2,\"categ", good)).unwrap();

        assert_eq!(read_records(&path).await.unwrap().len(), 1);

        let store = CheckpointStore::open(&path).await.unwrap();
        store
            .append(&CheckpointRecord::for_batch(&batch(2, 5), BatchStatus::Succeeded, 5, true, None))
            .await
            .unwrap();

        let records = store.load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].batch_id, 2);
        assert!(records[1].exhausted);
    }

    #[tokio::test]
    async fn tail_cut_inside_multibyte_char_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.jsonl");

        let good = serde_json::to_string(&CheckpointRecord::for_batch(
            &batch(1, 0),
            BatchStatus::Failed,
            0,
            false,
            Some("解析错误".into()),
        ))
        .unwrap();
        let mut bytes = format!("{}\n", good).into_bytes();
        let cut = "{\"batch_id\":2,\"error_detail\":\"解".as_bytes();
        bytes.extend_from_slice(&cut[..cut.len() - 1]);
        std::fs::write(&path, &bytes).unwrap();

        let records = read_records(&path).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error_detail.as_deref(), Some("解析错误"));

        let index = CheckpointIndex::from_records(read_records(&path).await.unwrap());
        assert!(index.failed_categories().contains("movies"));
    }

    #[tokio::test]
    async fn later_record_supersedes_earlier() {
        let failed = CheckpointRecord::for_batch(&batch(1, 0), BatchStatus::Failed, 0, false, None);
        let retried = CheckpointRecord::for_batch(&batch(1, 0), BatchStatus::Succeeded, 5, false, None);
        let other = CheckpointRecord::for_batch(&batch(2, 5), BatchStatus::Partial, 2, false, None);

        let index = CheckpointIndex::from_records(vec![failed, retried, other]);
        let done = index.completed_set();
        assert_eq!(done.len(), 1);
        assert!(done.contains(&batch(1, 0).key()));
        assert!(!done.contains(&batch(2, 5).key()));
        assert_eq!(index.failed_categories().len(), 1);
        assert_eq!(index.status_counts().get("partial"), Some(&1));
        assert_eq!(index.collected_records(), 5);
        assert_eq!(index.total_records(), 3);
        assert!(index.exhausted_offsets().is_empty());

        let tail = CheckpointRecord::for_batch(&batch(3, 10), BatchStatus::Succeeded, 1, true, None);
        let earlier = CheckpointRecord::for_batch(&batch(4, 5), BatchStatus::Succeeded, 0, true, None);
        let offsets = CheckpointIndex::from_records(vec![tail, earlier]).exhausted_offsets();
        assert_eq!(offsets.get("movies"), Some(&5));

        let regressed = CheckpointRecord::for_batch(&batch(1, 0), BatchStatus::Failed, 0, false, None);
        let mut all = vec![CheckpointRecord::for_batch(&batch(1, 0), BatchStatus::Succeeded, 5, false, None)];
        all.push(regressed);
        assert!(CheckpointIndex::from_records(all).completed_set().is_empty());
    }

    #[tokio::test]
    async fn start_fresh_backs_up_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.jsonl");
        std::fs::write(&path, "").unwrap();

        let store = CheckpointStore::start_fresh(&path).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());

        let backups = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
            .count();
        assert_eq!(backups, 1);
    }
}
