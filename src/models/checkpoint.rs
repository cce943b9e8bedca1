use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::batch::{BatchDescriptor, BatchKey, BatchStatus};

/// 检查点记录：检查点文件中的一行
///
/// 只追加，不修改。同一个键的新记录覆盖旧记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub batch_id: u64,
    pub category: String,
    pub offset: usize,
    pub quota: Option<usize>,
    pub status: BatchStatus,
    pub timestamp: DateTime<Utc>,
    pub records_collected: usize,
    /// 该批次是否发现分类已经没有更多题目
    #[serde(default)]
    pub exhausted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl CheckpointRecord {
    /// 为批次创建一条终态记录
    pub fn for_batch(
        batch: &BatchDescriptor,
        status: BatchStatus,
        records_collected: usize,
        exhausted: bool,
        error_detail: Option<String>,
    ) -> Self {
        Self {
            batch_id: batch.batch_id,
            category: batch.category.clone(),
            offset: batch.offset,
            quota: batch.question_quota,
            status,
            timestamp: Utc::now(),
            records_collected,
            exhausted,
            error_detail,
        }
    }

    pub fn key(&self) -> BatchKey {
        BatchKey {
            category: self.category.clone(),
            offset: self.offset,
            quota: self.quota,
        }
    }
}
