use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 要抓取的分类
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategorySelection {
    /// 分类文件中的全部分类
    All,
    /// 指定分类（按声明顺序）
    Named(Vec<String>),
}

impl CategorySelection {
    /// 解析命令行形式："all" 或逗号分隔的分类列表
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("all") {
            return CategorySelection::All;
        }
        CategorySelection::Named(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

/// 一次运行的工作量描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub categories: CategorySelection,
    /// 每个分类最多抓取的题目数，`None` 表示抓到没有为止
    pub max_questions: Option<usize>,
    /// 每组包含的分类数
    pub batch_size: usize,
    /// 同时执行的抓取任务数
    pub parallel_jobs: usize,
    /// 单个批次的题目上限
    pub questions_per_batch: usize,
    /// 从第几组开始（1 起）
    #[serde(default)]
    pub resume_from_group: Option<usize>,
}

impl WorkloadSpec {
    /// 校验不变量，失败时在任何调度之前报错
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "必须 >= 1"));
        }
        if self.parallel_jobs == 0 {
            return Err(ConfigError::invalid("parallel_jobs", "必须 >= 1"));
        }
        if self.questions_per_batch == 0 {
            return Err(ConfigError::invalid("questions_per_batch", "必须 >= 1"));
        }
        if self.max_questions == Some(0) {
            return Err(ConfigError::invalid("max_questions", "必须 >= 1，不限制请留空"));
        }
        if self.resume_from_group == Some(0) {
            return Err(ConfigError::invalid("resume_from_group", "组号从 1 开始"));
        }
        if let CategorySelection::Named(names) = &self.categories {
            if names.is_empty() {
                return Err(ConfigError::invalid("categories", "至少需要一个分类"));
            }
        }
        Ok(())
    }
}
