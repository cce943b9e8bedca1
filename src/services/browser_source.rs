//! 浏览器题目来源
//!
//! 打开分类页面，执行外部提供的提取脚本，把脚本返回的 JSON 转成 `QuestionRecord`。
//! 页面结构的解释完全由提取脚本负责。
//!
//! 脚本约定：一个接受 `{category, offset, limit}` 的（可异步）函数表达式，返回
//! `{items: [...], exhausted: bool, blocked?: string}`，`items` 的每一项要么是题目对象，
//! 要么是 `{error: "..."}`。

use std::path::Path;

use async_trait::async_trait;
use chromiumoxide::Browser;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::error::{BrowserError, ScrapeError};
use crate::infrastructure::{ExecError, JsExecutor};
use crate::models::{QuestionRecord, SpeedProfile};
use crate::services::question_source::{ExtractRequest, Extracted, QuestionSource};

#[derive(Debug, Deserialize)]
struct ScriptOutput {
    #[serde(default)]
    items: Vec<JsonValue>,
    #[serde(default)]
    exhausted: bool,
    #[serde(default)]
    blocked: Option<String>,
}

/// 基于 chromiumoxide 的题目来源
pub struct BrowserQuestionSource {
    browser: Browser,
    base_url: String,
    extract_script: String,
}

impl BrowserQuestionSource {
    /// 创建来源并读取提取脚本
    pub async fn new(
        browser: Browser,
        base_url: impl Into<String>,
        script_path: &Path,
    ) -> Result<Self, BrowserError> {
        let extract_script = tokio::fs::read_to_string(script_path)
            .await
            .map_err(|e| BrowserError::ScriptUnavailable {
                path: script_path.display().to_string(),
                message: e.to_string(),
            })?;

        if extract_script.trim().is_empty() {
            return Err(BrowserError::ScriptUnavailable {
                path: script_path.display().to_string(),
                message: "脚本为空".to_string(),
            });
        }

        Ok(Self {
            browser,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            extract_script,
        })
    }

    fn category_url(&self, category: &str) -> String {
        format!("{}/quizzes/{}/", self.base_url, category)
    }

    fn build_call(&self, request: &ExtractRequest) -> String {
        let args = json!({
            "category": request.category,
            "offset": request.offset,
            "limit": request.limit,
        });
        format!("(async () => await ({})({}))()", self.extract_script.trim(), args)
    }

    async fn run_on_page(
        &self,
        executor: &JsExecutor,
        request: &ExtractRequest,
        profile: &SpeedProfile,
    ) -> Result<ScriptOutput, ScrapeError> {
        let category = &request.category;
        let url = self.category_url(category);

        executor
            .goto(&url, profile.page_load_timeout)
            .await
            .map_err(|e| ScrapeError::network(category, format!("加载 {} 失败: {}", url, e)))?;

        if !executor.wait_for_idle(profile.network_idle_timeout).await {
            debug!("页面 {} 未在 {:?} 内进入空闲", url, profile.network_idle_timeout);
        }

        executor
            .eval_as::<ScriptOutput>(self.build_call(request), profile.quiz_wait_timeout)
            .await
            .map_err(|e| match e {
                ExecError::Decode(_) => ScrapeError::parse(category, format!("脚本输出格式不对: {}", e)),
                _ => ScrapeError::network(category, format!("执行提取脚本失败: {}", e)),
            })
    }
}

#[async_trait]
impl QuestionSource for BrowserQuestionSource {
    async fn fetch_and_extract(
        &self,
        request: &ExtractRequest,
        profile: &SpeedProfile,
    ) -> Result<Extracted, ScrapeError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::network(&request.category, format!("创建页面失败: {}", e)))?;
        let executor = JsExecutor::new(page);

        let output = self.run_on_page(&executor, request, profile).await;
        executor.close().await;
        let output = output?;

        if let Some(reason) = output.blocked {
            return Err(ScrapeError::blocked(&request.category, reason));
        }

        let items = output
            .items
            .into_iter()
            .map(|item| to_record(item, &request.category))
            .collect();

        Ok(Extracted {
            items,
            exhausted: output.exhausted,
        })
    }
}

fn to_record(item: JsonValue, category: &str) -> Result<QuestionRecord, ScrapeError> {
    if let Some(message) = item.get("error").and_then(|v| v.as_str()) {
        return Err(ScrapeError::parse(category, message));
    }
    let mut record: QuestionRecord =
        serde_json::from_value(item).map_err(|e| ScrapeError::parse(category, e))?;
    if record.category.is_empty() {
        record.category = category.to_string();
    }
    Ok(record)
}
