//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批次规划和调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_planner` - 批次规划器
//! - 把分类列表按 `batch_size` 分组
//! - 把每个分类的配额拆成不超过 `questions_per_batch` 的批次
//! - 惰性生成，开放式配额依赖抓完反馈
//!
//! ### `category_order` - 分类排序
//! - 分组之前按 `sequential` / `priority` / `balanced` 排列全部分类
//!
//! ### `batch_runner` - 批次执行器
//! - 断点续传（读取检查点，跳过已成功的批次）
//! - 控制并发数量（JoinSet）
//! - 失败重试与指数退避
//! - 先写结果、后写检查点
//! - 输出全局统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_runner (处理 Vec<BatchDescriptor>)
//!     ↓
//! workflow::ScrapeJob (处理单个批次)
//!     ↓
//! services (能力层：source / sinks / failure report)
//!     ↓
//! infrastructure (基础设施：RateLimiter / CheckpointStore / JsExecutor)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_planner 管"做什么"，batch_runner 管"怎么调度"
//! 2. **状态集中**：运行状态只属于一次 `run` 调用
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure

pub mod batch_planner;
pub mod batch_runner;
pub mod category_order;

// 重新导出主要类型
pub use batch_planner::BatchPlanner;
pub use batch_runner::{BatchRunner, RunPhase, RunSummary, RunnerConfig};
pub use category_order::OrderStrategy;
