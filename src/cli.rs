use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "trivia_batch_scraper")]
#[command(version)]
#[command(about = "按分类分批抓取测验题目，支持断点续传", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 日志详细程度 (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// TOML 配置文件
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 分组分批抓取（可断点续传）
    Batch(BatchArgs),
    /// 一次性抓取少量分类（单任务，不续传）
    Single(SingleArgs),
    /// 查看检查点汇总和失败的分类
    Status,
    /// 检查配置、目录和提取脚本
    Health,
}

/// 两种抓取模式共用的参数
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// 速度档位: normal, fast, aggressive
    #[arg(long)]
    pub speed_profile: Option<String>,

    /// 每批最多题目数
    #[arg(long)]
    pub questions_per_batch: Option<usize>,

    /// 整次运行的超时时间（秒），到时按取消处理
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// 分类："all" 或逗号分隔的列表
    #[arg(long, default_value = "all")]
    pub categories: String,

    /// 每个分类最多题目数，留空则抓到没有为止
    #[arg(long)]
    pub max_questions: Option<usize>,

    /// 每组包含的分类数
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// 并发任务数，留空则使用档位默认值
    #[arg(long)]
    pub parallel_jobs: Option<usize>,

    /// 从检查点继续上次的运行
    #[arg(long)]
    pub resume: bool,

    /// 从第几组开始（1 起）
    #[arg(long)]
    pub resume_from_group: Option<usize>,

    /// 全部分类的排序策略: balanced, priority, sequential
    #[arg(long)]
    pub strategy: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SingleArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// 逗号分隔的分类列表，留空则使用全部分类
    #[arg(long)]
    pub categories: Option<String>,

    /// 每个分类最多题目数
    #[arg(long, default_value = "100")]
    pub max_questions: usize,
}

impl CommonArgs {
    /// 命令行参数覆盖配置
    pub fn apply(&self, config: &mut Config) {
        if let Some(name) = &self.speed_profile {
            config.speed_profile = name.clone();
        }
        if let Some(n) = self.questions_per_batch {
            config.questions_per_batch = n;
        }
    }
}

impl BatchArgs {
    pub fn apply(&self, config: &mut Config) {
        self.common.apply(config);
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        if let Some(n) = self.parallel_jobs {
            config.parallel_jobs = Some(n);
        }
        if let Some(name) = &self.strategy {
            config.strategy = name.clone();
        }
    }
}

impl SingleArgs {
    pub fn apply(&self, config: &mut Config) {
        self.common.apply(config);
        config.parallel_jobs = Some(1);
    }
}
