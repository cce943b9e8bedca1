//! 抓取任务上下文
//!
//! 封装"我正在处理哪个批次的第几次尝试"这一信息

use std::fmt::Display;

use crate::models::BatchDescriptor;

/// 抓取任务上下文（仅用于日志）
#[derive(Debug, Clone)]
pub struct JobCtx {
    pub batch_id: u64,
    pub category: String,
    pub group: usize,
    /// 本次是第几次尝试（从 1 开始）
    pub attempt: u32,
}

impl JobCtx {
    pub fn for_batch(batch: &BatchDescriptor) -> Self {
        Self {
            batch_id: batch.batch_id,
            category: batch.category.clone(),
            group: batch.group,
            attempt: batch.attempt_count + 1,
        }
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.attempt > 1 {
            write!(
                f,
                "[批次 {} 分类 {} 第 {} 次尝试]",
                self.batch_id, self.category, self.attempt
            )
        } else {
            write!(f, "[批次 {} 分类 {}]", self.batch_id, self.category)
        }
    }
}
