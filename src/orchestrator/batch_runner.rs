//! 批次执行器 - 编排层
//!
//! ## 职责
//!
//! 1. **断点续传**：从检查点重建进度，跳过已成功的批次
//! 2. **并发控制**：`JoinSet` 中最多 `parallel_jobs` 个抓取任务
//! 3. **重试**：失败的批次按指数退避重新排队，重排的批次优先于新批次
//! 4. **落盘顺序**：结果写入确认之后才追加检查点记录
//! 5. **取消**：收到取消信号后不再派发，进行中的任务在提取边界停下
//!
//! ## 运行阶段
//!
//! ```text
//! running → draining → completed
//!         ↘ aborted（取消）
//! ```

use std::collections::{BTreeSet, VecDeque};
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, ConfigError, ScrapeError, StorageError};
use crate::infrastructure::{CheckpointStore, RateLimiter};
use crate::models::{
    BatchDescriptor, BatchKey, BatchResult, BatchStatus, CategorySelection, CheckpointRecord,
    QuestionRecord, SpeedProfile, WorkloadSpec,
};
use crate::orchestrator::batch_planner::BatchPlanner;
use crate::services::{FailureReport, QuestionSource, SinkHandle};
use crate::utils::logging;
use crate::workflow::{JobOutcome, ScrapeJob};

/// 执行器参数
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// 单个批次最多重试次数（不含首次）
    pub max_retries: u32,
    /// 第一次重试前的等待时间
    pub backoff_base: Duration,
    /// 退避上限
    pub backoff_cap: Duration,
    /// 限流最长等待时间
    pub rate_limit_max_wait: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(60),
            rate_limit_max_wait: Duration::from_secs(300),
        }
    }
}

impl RunnerConfig {
    /// 第 `attempt_count` 次失败后的等待时间：`min(base × 2^(n-1), cap)`
    pub fn backoff_for(&self, attempt_count: u32) -> Duration {
        let exp = attempt_count.saturating_sub(1).min(20);
        self.backoff_base
            .saturating_mul(1u32 << exp)
            .min(self.backoff_cap)
    }
}

/// 运行阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Running,
    Draining,
    Completed,
    Aborted,
}

impl Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Running => "running",
            RunPhase::Draining => "draining",
            RunPhase::Completed => "completed",
            RunPhase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// 运行汇总
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// 成功的批次数
    pub completed: usize,
    pub failed: usize,
    pub partial: usize,
    /// 因断点续传而跳过的批次数
    pub skipped: usize,
    pub total_records: usize,
    pub duration: Duration,
    /// 有失败或部分完成批次的分类
    pub failed_categories: Vec<String>,
    /// 是否因取消而提前结束
    pub aborted: bool,
}

/// 单次运行的可变状态
///
/// 只属于一次 `run` 调用，可以完全由检查点重建。
struct RunState {
    phase: RunPhase,
    completed: usize,
    failed: usize,
    partial: usize,
    skipped: usize,
    total_records: usize,
    failed_categories: BTreeSet<String>,
    started_at: Instant,
}

impl RunState {
    fn new() -> Self {
        Self {
            phase: RunPhase::Running,
            completed: 0,
            failed: 0,
            partial: 0,
            skipped: 0,
            total_records: 0,
            failed_categories: BTreeSet::new(),
            started_at: Instant::now(),
        }
    }

    fn record(&mut self, result: &BatchResult) {
        self.total_records += result.records_collected;
        match result.status {
            BatchStatus::Succeeded => self.completed += 1,
            BatchStatus::Failed => {
                self.failed += 1;
                self.failed_categories.insert(result.category.clone());
            }
            BatchStatus::Partial => {
                self.partial += 1;
                self.failed_categories.insert(result.category.clone());
            }
        }
    }

    fn enter(&mut self, phase: RunPhase) {
        if self.phase != phase {
            debug!("运行阶段: {} → {}", self.phase, phase);
            self.phase = phase;
        }
    }

    fn into_summary(self) -> RunSummary {
        RunSummary {
            completed: self.completed,
            failed: self.failed,
            partial: self.partial,
            skipped: self.skipped,
            total_records: self.total_records,
            duration: self.started_at.elapsed(),
            failed_categories: self.failed_categories.into_iter().collect(),
            aborted: self.phase == RunPhase::Aborted,
        }
    }
}

/// 批次执行器
pub struct BatchRunner {
    source: Arc<dyn QuestionSource>,
    sink: SinkHandle,
    checkpoint_path: PathBuf,
    config: RunnerConfig,
    /// `CategorySelection::All` 时使用的分类列表
    catalog: Vec<String>,
    failure_report: Option<FailureReport>,
    cancel: CancellationToken,
    active: Arc<AtomicUsize>,
}

impl BatchRunner {
    pub fn new(
        source: Arc<dyn QuestionSource>,
        sink: SinkHandle,
        checkpoint_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            sink,
            checkpoint_path: checkpoint_path.into(),
            config: RunnerConfig::default(),
            catalog: Vec::new(),
            failure_report: None,
            cancel: CancellationToken::new(),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_catalog(mut self, catalog: Vec<String>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_failure_report(mut self, report: FailureReport) -> Self {
        self.failure_report = Some(report);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 当前正在执行的抓取任务数
    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn resolve_categories(&self, selection: &CategorySelection) -> Result<Vec<String>, ConfigError> {
        match selection {
            CategorySelection::Named(names) => Ok(names.clone()),
            CategorySelection::All if self.catalog.is_empty() => {
                Err(ConfigError::CategoriesUnavailable {
                    path: "all".to_string(),
                    reason: "分类列表为空".to_string(),
                })
            }
            CategorySelection::All => Ok(self.catalog.clone()),
        }
    }

    /// 执行一次完整运行
    ///
    /// 只有配置错误和存储错误会返回 `Err`，单个批次的失败只体现在汇总里。
    pub async fn run(
        &self,
        workload: &WorkloadSpec,
        profile: &SpeedProfile,
        resume: bool,
    ) -> Result<RunSummary, AppError> {
        workload.validate()?;
        let categories = self.resolve_categories(&workload.categories)?;

        let store = if resume {
            CheckpointStore::open(&self.checkpoint_path).await?
        } else {
            CheckpointStore::start_fresh(&self.checkpoint_path).await?
        };

        let mut planner = BatchPlanner::new(workload, categories);
        let total_groups = planner.group_count();

        let done: BTreeSet<BatchKey> = if resume {
            let index = store.index().await?;
            for (category, offset) in index.exhausted_offsets() {
                planner.mark_exhausted(&category, offset);
            }
            let done = index.completed_set();
            info!("📂 断点续传: 检查点中已有 {} 个成功批次", done.len());
            done
        } else {
            BTreeSet::new()
        };

        let run_cancel = self.cancel.child_token();
        let limiter = Arc::new(RateLimiter::new(profile, self.config.rate_limit_max_wait));
        let job = Arc::new(ScrapeJob::new(
            self.source.clone(),
            limiter,
            Arc::new(profile.clone()),
            workload.questions_per_batch,
            run_cancel.clone(),
        ));

        let parallel = workload.parallel_jobs;
        let mut state = RunState::new();
        let mut requeue: VecDeque<BatchDescriptor> = VecDeque::new();
        let mut jobs: JoinSet<(BatchDescriptor, JobOutcome)> = JoinSet::new();
        let mut planner_done = false;
        let mut current_group = 0usize;
        let mut fatal: Option<StorageError> = None;

        info!(
            "🚀 开始运行: 速度档位 {} | 并发 {} | 每批最多 {} 道题",
            profile.name, parallel, workload.questions_per_batch
        );

        loop {
            // 派发，直到槽位用完
            while fatal.is_none() && !run_cancel.is_cancelled() && jobs.len() < parallel {
                let batch = match requeue.pop_front() {
                    Some(batch) => batch,
                    None => match self.next_fresh(&mut planner, &done, &mut state, planner_done) {
                        Some(batch) => batch,
                        None => {
                            planner_done = true;
                            break;
                        }
                    },
                };

                if batch.group > current_group {
                    current_group = batch.group;
                    let members: Vec<String> = planner
                        .entries()
                        .iter()
                        .filter(|(_, group)| *group == current_group)
                        .map(|(category, _)| category.clone())
                        .collect();
                    logging::log_group_start(current_group, total_groups, &members);
                }

                self.dispatch(&mut jobs, job.clone(), batch, run_cancel.clone());
            }

            if jobs.is_empty() {
                break;
            }
            if planner_done && requeue.is_empty() {
                state.enter(RunPhase::Draining);
            }

            let (batch, outcome) = match jobs.join_next().await {
                Some(Ok(joined)) => joined,
                Some(Err(e)) => {
                    error!("❌ 抓取任务异常退出: {}", e);
                    continue;
                }
                None => break,
            };

            if fatal.is_some() {
                debug!("{} 存储已失败，结果不再记录", batch);
                continue;
            }

            let handled = match outcome {
                JobOutcome::Completed { records, exhausted } => {
                    if exhausted {
                        planner.mark_exhausted(&batch.category, batch.offset);
                    }
                    let attempts = batch.attempt_count + 1;
                    self.commit(&store, &mut state, &batch, BatchStatus::Succeeded, records, exhausted, attempts, None)
                        .await
                }
                JobOutcome::Failed { error, records } => {
                    let open_ended = batch.question_quota.is_none();
                    let (category, offset) = (batch.category.clone(), batch.offset);
                    match self
                        .handle_failure(&store, &mut state, &mut requeue, batch, error, records, &run_cancel)
                        .await
                    {
                        // 开放式分类没有题目上限，最终失败后不再向后生成批次
                        Ok(true) if open_ended => {
                            warn!("⏭️ 分类 {} 在偏移量 {} 处最终失败，停止生成后续批次", category, offset);
                            planner.mark_exhausted(&category, offset);
                            Ok(())
                        }
                        other => other.map(|_| ()),
                    }
                }
                JobOutcome::Cancelled { records } if records.is_empty() => {
                    debug!("{} 已取消，未收集到题目，不写检查点", batch);
                    Ok(())
                }
                JobOutcome::Cancelled { records } => {
                    let attempts = batch.attempt_count + 1;
                    self.commit(
                        &store,
                        &mut state,
                        &batch,
                        BatchStatus::Partial,
                        records,
                        false,
                        attempts,
                        Some(ScrapeError::Cancelled.kind().to_string()),
                    )
                    .await
                }
            };

            if let Err(e) = handled {
                error!("❌ 存储失败，停止派发新批次: {}", e);
                run_cancel.cancel();
                fatal = Some(e);
            }
        }

        if let Some(e) = fatal {
            return Err(e.into());
        }

        if self.cancel.is_cancelled() {
            state.enter(RunPhase::Aborted);
            warn!("⏹️ 运行已取消，未完成的批次可通过断点续传继续");
        } else {
            state.enter(RunPhase::Completed);
        }

        let summary = state.into_summary();
        logging::print_final_stats(&summary);
        Ok(summary)
    }

    /// 从规划器取下一个尚未成功的批次
    fn next_fresh(
        &self,
        planner: &mut BatchPlanner,
        done: &BTreeSet<BatchKey>,
        state: &mut RunState,
        planner_done: bool,
    ) -> Option<BatchDescriptor> {
        if planner_done {
            return None;
        }
        for batch in planner.by_ref() {
            if done.contains(&batch.key()) {
                debug!("{} 已在检查点中，跳过", batch);
                state.skipped += 1;
                continue;
            }
            return Some(batch);
        }
        None
    }

    fn dispatch(
        &self,
        jobs: &mut JoinSet<(BatchDescriptor, JobOutcome)>,
        job: Arc<ScrapeJob>,
        batch: BatchDescriptor,
        cancel: CancellationToken,
    ) {
        let backoff = if batch.attempt_count > 0 {
            Some(self.config.backoff_for(batch.attempt_count))
        } else {
            None
        };
        let guard = ActiveGuard::enter(self.active.clone());

        jobs.spawn(async move {
            let _guard = guard;
            let work = async {
                match backoff {
                    Some(delay) => {
                        debug!("{} 退避 {:?} 后重试", batch, delay);
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => job.run(&batch).await,
                            _ = cancel.cancelled() => JobOutcome::Cancelled { records: Vec::new() },
                        }
                    }
                    None => job.run(&batch).await,
                }
            };

            // 任务崩溃也要留下批次描述，按最终失败记录
            let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!("{} 💥 抓取任务崩溃: {}", batch, message);
                    JobOutcome::Failed {
                        error: ScrapeError::JobPanicked {
                            category: batch.category.clone(),
                            message,
                        },
                        records: Vec::new(),
                    }
                }
            };
            (batch, outcome)
        });
    }

    /// 处理一次失败，返回批次是否已经最终失败（写入了检查点）
    #[allow(clippy::too_many_arguments)]
    async fn handle_failure(
        &self,
        store: &CheckpointStore,
        state: &mut RunState,
        requeue: &mut VecDeque<BatchDescriptor>,
        mut batch: BatchDescriptor,
        error: ScrapeError,
        records: Vec<QuestionRecord>,
        cancel: &CancellationToken,
    ) -> Result<bool, StorageError> {
        batch.attempt_count += 1;
        let can_retry = error.is_retryable() && batch.attempt_count <= self.config.max_retries;

        if can_retry {
            if cancel.is_cancelled() {
                debug!("{} 失败后收到取消信号，留待续传", batch);
                return Ok(false);
            }
            warn!(
                "{} ⚠️ 第 {} 次尝试失败 ({}): {}，稍后重试",
                batch,
                batch.attempt_count,
                error.kind(),
                error
            );
            requeue.push_back(batch);
            return Ok(false);
        }

        let status = if records.is_empty() {
            BatchStatus::Failed
        } else {
            BatchStatus::Partial
        };
        let detail = format!("{}: {}", error.kind(), error);
        error!("{} ❌ 重试耗尽，最终状态 {}: {}", batch, status, detail);

        let attempts = batch.attempt_count;
        self.commit(store, state, &batch, status, records, false, attempts, Some(detail.clone()))
            .await?;

        if let Some(report) = &self.failure_report {
            if let Err(e) = report.write(&batch.category, batch.batch_id, &detail).await {
                warn!("⚠️ 写入失败报告失败: {}", e);
            }
        }
        Ok(true)
    }

    /// 写入结果并追加检查点（顺序不可颠倒）
    #[allow(clippy::too_many_arguments)]
    async fn commit(
        &self,
        store: &CheckpointStore,
        state: &mut RunState,
        batch: &BatchDescriptor,
        status: BatchStatus,
        records: Vec<QuestionRecord>,
        exhausted: bool,
        attempts: u32,
        error_detail: Option<String>,
    ) -> Result<(), StorageError> {
        let collected = records.len();
        self.sink.write(records).await?;
        store
            .append(&CheckpointRecord::for_batch(
                batch,
                status,
                collected,
                exhausted,
                error_detail.clone(),
            ))
            .await?;

        let result = BatchResult {
            batch_id: batch.batch_id,
            category: batch.category.clone(),
            status,
            records_collected: collected,
            attempts,
            error_detail,
        };
        logging::log_batch_complete(&result);
        state.record(&result);
        Ok(())
    }
}

/// 活跃任务计数，任务结束（包括崩溃和被中止）时自动减一
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知原因".to_string()
    }
}
