//! 分类排序策略
//!
//! 在分组之前决定全部分类的顺序：
//!
//! - `sequential`：保持分类文件中的顺序
//! - `priority`：命中热门关键词的分类排在前面
//! - `balanced`：热门分类与其余分类交替排列

use std::fmt::Display;
use std::str::FromStr;

use crate::error::ConfigError;

/// 热门关键词，按优先级排列
const PRIORITY_KEYWORDS: [&str; 6] = [
    "entertainment",
    "movies",
    "music",
    "sports",
    "history",
    "science",
];

/// 每个关键词最多提前的分类数
const PER_KEYWORD: usize = 5;

/// 分类排序策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderStrategy {
    Balanced,
    #[default]
    Priority,
    Sequential,
}

impl FromStr for OrderStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "balanced" => Ok(OrderStrategy::Balanced),
            "priority" => Ok(OrderStrategy::Priority),
            "sequential" => Ok(OrderStrategy::Sequential),
            other => Err(ConfigError::invalid(
                "strategy",
                format!("未知的排序策略 '{}' (可选: balanced, priority, sequential)", other),
            )),
        }
    }
}

impl Display for OrderStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OrderStrategy::Balanced => "balanced",
            OrderStrategy::Priority => "priority",
            OrderStrategy::Sequential => "sequential",
        };
        f.write_str(name)
    }
}

impl OrderStrategy {
    /// 按策略重新排列分类，不增不减
    pub fn order(self, categories: Vec<String>) -> Vec<String> {
        match self {
            OrderStrategy::Sequential => categories,
            OrderStrategy::Priority => {
                let (hot, rest) = split_hot(categories);
                hot.into_iter().chain(rest).collect()
            }
            OrderStrategy::Balanced => {
                let (hot, rest) = split_hot(categories);
                interleave(hot, rest)
            }
        }
    }
}

/// 拆出热门分类（保持关键词优先级）和其余分类（保持原顺序）
fn split_hot(categories: Vec<String>) -> (Vec<String>, Vec<String>) {
    let lowered: Vec<String> = categories.iter().map(|c| c.to_lowercase()).collect();

    let mut hot_indices = Vec::new();
    for keyword in PRIORITY_KEYWORDS {
        let matching = lowered
            .iter()
            .enumerate()
            .filter(|(_, name)| name.contains(keyword))
            .map(|(idx, _)| idx)
            .take(PER_KEYWORD);
        for idx in matching {
            if !hot_indices.contains(&idx) {
                hot_indices.push(idx);
            }
        }
    }

    let mut slots: Vec<Option<String>> = categories.into_iter().map(Some).collect();
    let hot = hot_indices
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect();
    let rest = slots.into_iter().flatten().collect();
    (hot, rest)
}

fn interleave(hot: Vec<String>, rest: Vec<String>) -> Vec<String> {
    let mut ordered = Vec::with_capacity(hot.len() + rest.len());
    let mut hot = hot.into_iter();
    let mut rest = rest.into_iter();
    loop {
        let (a, b) = (hot.next(), rest.next());
        if a.is_none() && b.is_none() {
            break;
        }
        ordered.extend(a);
        ordered.extend(b);
    }
    ordered
}
