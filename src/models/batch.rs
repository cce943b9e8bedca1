use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// 批次描述：一个分类 + 一段题目范围
///
/// 由 `BatchPlanner` 生成，只被消费一次；失败重试时只有 `attempt_count` 变化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDescriptor {
    /// 单调递增的批次编号（从 1 开始）
    pub batch_id: u64,
    pub category: String,
    /// 分类组编号（从 1 开始）
    pub group: usize,
    /// 本批第一道题在分类中的位置
    pub offset: usize,
    /// 题目配额，`None` 表示开放式配额
    pub question_quota: Option<usize>,
    /// 已失败的次数
    pub attempt_count: u32,
}

impl BatchDescriptor {
    /// 断点续传用的键：(分类, 范围)
    pub fn key(&self) -> BatchKey {
        BatchKey {
            category: self.category.clone(),
            offset: self.offset,
            quota: self.question_quota,
        }
    }
}

impl Display for BatchDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.question_quota {
            Some(quota) => write!(
                f,
                "[批次 #{} 分类 {} 题目 {}..{}]",
                self.batch_id,
                self.category,
                self.offset,
                self.offset + quota
            ),
            None => write!(
                f,
                "[批次 #{} 分类 {} 题目 {}..]",
                self.batch_id, self.category, self.offset
            ),
        }
    }
}

/// 批次范围键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchKey {
    pub category: String,
    pub offset: usize,
    pub quota: Option<usize>,
}

/// 批次终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Succeeded,
    Failed,
    /// 收集到部分记录后中断（取消或重试耗尽）
    Partial,
}

impl Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BatchStatus::Succeeded => "succeeded",
            BatchStatus::Failed => "failed",
            BatchStatus::Partial => "partial",
        };
        f.write_str(name)
    }
}

/// 批次处理结果
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub batch_id: u64,
    pub category: String,
    pub status: BatchStatus,
    pub records_collected: usize,
    /// 总尝试次数
    pub attempts: u32,
    pub error_detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_range() {
        let batch = BatchDescriptor {
            batch_id: 3,
            category: "movies".into(),
            group: 1,
            offset: 5,
            question_quota: Some(5),
            attempt_count: 0,
        };
        assert_eq!(batch.to_string(), "[批次 #3 分类 movies 题目 5..10]");
        assert_eq!(
            serde_json::to_string(&BatchStatus::Succeeded).unwrap(),
            "\"succeeded\""
        );
    }
}
