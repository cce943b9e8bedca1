//! 抓取任务 - 流程层
//!
//! 核心职责：定义"一个批次"的完整抓取流程
//!
//! 流程顺序：
//! 1. 检查取消信号
//! 2. 限流器放行
//! 3. 从题目来源提取下一段题目（一次提取是不可中断的最小单位）
//! 4. 丢弃解析失败的单条记录，直到配额用完或分类没有更多题目

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ScrapeError;
use crate::infrastructure::RateLimiter;
use crate::models::{BatchDescriptor, QuestionRecord, SpeedProfile};
use crate::services::{ExtractRequest, QuestionSource};
use crate::workflow::job_ctx::JobCtx;

/// 抓取任务结果
#[derive(Debug)]
pub enum JobOutcome {
    /// 配额用完或分类已无更多题目（题目数可以为 0）
    Completed {
        records: Vec<QuestionRecord>,
        exhausted: bool,
    },
    /// 失败；`records` 是失败前已收集的记录
    Failed {
        error: ScrapeError,
        records: Vec<QuestionRecord>,
    },
    /// 在两次提取之间收到取消信号
    Cancelled { records: Vec<QuestionRecord> },
}

/// 抓取任务
///
/// - 不持有页面，只依赖 `QuestionSource`
/// - 不决定重试，只报告结果
/// - 可以被多个批次复用
pub struct ScrapeJob {
    source: Arc<dyn QuestionSource>,
    limiter: Arc<RateLimiter>,
    profile: Arc<SpeedProfile>,
    /// 开放式配额时每个批次最多收集的题目数
    chunk_size: usize,
    cancel: CancellationToken,
}

impl ScrapeJob {
    pub fn new(
        source: Arc<dyn QuestionSource>,
        limiter: Arc<RateLimiter>,
        profile: Arc<SpeedProfile>,
        chunk_size: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            limiter,
            profile,
            chunk_size: chunk_size.max(1),
            cancel,
        }
    }

    pub async fn run(&self, batch: &BatchDescriptor) -> JobOutcome {
        let ctx = JobCtx::for_batch(batch);
        let target = batch.question_quota.unwrap_or(self.chunk_size);
        let mut pacer = self.limiter.pacer();

        let mut records = Vec::new();
        let mut consumed = 0usize;
        let mut parse_failures = 0usize;
        let mut exhausted = false;

        info!("{} 🔍 开始抓取，目标 {} 道题", ctx, target);

        while consumed < target {
            if self.cancel.is_cancelled() {
                info!("{} ⏹️ 收到取消信号，已收集 {} 道题", ctx, records.len());
                return JobOutcome::Cancelled { records };
            }

            if let Err(error) = pacer.acquire(&self.cancel).await {
                if matches!(error, ScrapeError::Cancelled) {
                    info!("{} ⏹️ 等待限流时被取消", ctx);
                    return JobOutcome::Cancelled { records };
                }
                return JobOutcome::Failed { error, records };
            }

            let request = ExtractRequest {
                category: batch.category.clone(),
                offset: batch.offset + consumed,
                limit: target - consumed,
            };

            let extracted = match self.source.fetch_and_extract(&request, &self.profile).await {
                Ok(extracted) => extracted,
                Err(error) => {
                    warn!("{} ⚠️ 提取失败: {}", ctx, error);
                    return JobOutcome::Failed { error, records };
                }
            };

            let received = extracted.items.len().min(request.limit);
            for item in extracted.items.into_iter().take(request.limit) {
                consumed += 1;
                match item {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        parse_failures += 1;
                        warn!("{} ⚠️ 丢弃无法解析的题目: {}", ctx, e);
                    }
                }
            }
            debug!(
                "{} 本次提取 {} 项，累计 {}/{}",
                ctx, received, consumed, target
            );

            if extracted.exhausted || received == 0 {
                exhausted = true;
                break;
            }
        }

        if records.is_empty() && parse_failures > 0 {
            return JobOutcome::Failed {
                error: ScrapeError::parse(
                    &batch.category,
                    format!("本批 {} 道题全部解析失败", parse_failures),
                ),
                records,
            };
        }

        info!(
            "{} ✓ 抓取完成: {} 道题{}",
            ctx,
            records.len(),
            if exhausted { "（分类已抓完）" } else { "" }
        );
        JobOutcome::Completed { records, exhausted }
    }
}
