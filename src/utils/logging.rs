use anyhow::{Context, Result};
/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{BatchResult, BatchStatus};
use crate::orchestrator::RunSummary;

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &Path) -> Result<()> {
    if let Some(parent) = log_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let log_header = format!(
        "{}\n题库抓取日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件 {}", log_file_path.display()))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, mode: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - {} 模式", mode);
    info!("🏃 速度档位: {}", config.speed_profile);
    info!("📦 每组分类数: {}", config.batch_size);
    info!("❓ 每批题目数: {}", config.questions_per_batch);
    info!("💾 检查点文件: {}", config.checkpoint_path.display());
    info!("{}", "=".repeat(60));
}

/// 记录分类组开始信息
///
/// # 参数
/// - `group`: 组编号
/// - `total_groups`: 组总数
/// - `categories`: 本组分类
pub fn log_group_start(group: usize, total_groups: usize, categories: &[String]) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 组", group, total_groups);
    info!("📂 本组分类: {}", categories.join(", "));
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
pub fn log_batch_complete(result: &BatchResult) {
    match result.status {
        BatchStatus::Succeeded => info!(
            "✓ [批次 {}] {} 完成: {} 道题 (尝试 {} 次)",
            result.batch_id, result.category, result.records_collected, result.attempts
        ),
        status => warn!(
            "✗ [批次 {}] {} 结束 ({}): {} 道题 (尝试 {} 次) {}",
            result.batch_id,
            result.category,
            status,
            result.records_collected,
            result.attempts,
            truncate_text(result.error_detail.as_deref().unwrap_or(""), 120)
        ),
    }
}

/// 打印最终统计信息
pub fn print_final_stats(summary: &RunSummary) {
    info!("\n{}", "=".repeat(60));
    if summary.aborted {
        info!("⏹️ 运行已中断统计");
    } else {
        info!("📊 全部处理完成统计");
    }
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}", summary.completed);
    info!("⚠️ 部分完成: {}", summary.partial);
    info!("❌ 失败: {}", summary.failed);
    if summary.skipped > 0 {
        info!("⏭️ 跳过（已完成）: {}", summary.skipped);
    }
    info!("❓ 题目总数: {}", summary.total_records);
    info!("⏱️ 耗时: {:.1} 秒", summary.duration.as_secs_f64());
    if !summary.failed_categories.is_empty() {
        info!("📋 需要重跑的分类: {}", summary.failed_categories.join(", "));
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
