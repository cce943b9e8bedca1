//! 题目来源 - 业务能力层
//!
//! 编排层通过这个接口获取题目，不关心页面如何解析。

use async_trait::async_trait;

use crate::error::ScrapeError;
use crate::models::{QuestionRecord, SpeedProfile};

/// 一次提取请求：从分类的第 `offset` 道题开始，最多 `limit` 道
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub category: String,
    pub offset: usize,
    pub limit: usize,
}

/// 一次提取的结果
///
/// `items` 中每一项对应分类中的一个位置，解析失败的位置以 `Err` 占位，
/// 所以下一次请求的 offset 应该前进 `items.len()`。
#[derive(Debug, Default)]
pub struct Extracted {
    pub items: Vec<Result<QuestionRecord, ScrapeError>>,
    /// 分类中已经没有更多题目
    pub exhausted: bool,
}

/// 题目来源
///
/// 每次调用就是一次网络动作，调用前必须先经过限流器。
/// 整次调用失败时返回 `Network` / `SiteBlocked` / `Parse`。
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn fetch_and_extract(
        &self,
        request: &ExtractRequest,
        profile: &SpeedProfile,
    ) -> Result<Extracted, ScrapeError>;
}
