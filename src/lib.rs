//! # Trivia Batch Scraper
//!
//! 按分类分批抓取测验题目的 Rust 应用程序，支持限流、重试和断点续传
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `JsExecutor` - 页面操作（导航、等待、执行脚本）
//! - `RateLimiter` - 请求间隔 + 每分钟请求上限
//! - `CheckpointStore` - 只追加的检查点文件
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `QuestionSource` - 按分类和范围提取题目
//! - `ResultSink` - CSV / 媒体文件写入，由单独的写入任务持有
//! - `FailureReport` - 写 failed.txt 能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个批次"的完整抓取流程
//! - `JobCtx` - 上下文封装（batch_id + 尝试次数）
//! - `ScrapeJob` - 流程编排（限流 → 提取 → 丢弃坏记录 → 直到配额或抓完）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_planner` - 把工作量拆成有序的批次
//! - `orchestrator/batch_runner` - 并发、重试、检查点和取消
//!
//! ## 模块结构

pub mod app;
pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::Config;
pub use error::{AppError, AppResult, ConfigError, ScrapeError, StorageError};
pub use infrastructure::{CheckpointStore, RateLimiter};
pub use models::{BatchDescriptor, BatchStatus, CheckpointRecord, QuestionRecord, SpeedProfile, WorkloadSpec};
pub use orchestrator::{BatchPlanner, BatchRunner, RunSummary, RunnerConfig};
pub use services::{QuestionSource, ResultSink};
pub use workflow::{JobCtx, ScrapeJob};
