//! JS 执行器 - 基础设施层
//!
//! 持有一个 page，只暴露"导航"和"执行 JS"两种能力，每种都有超时上限

use std::time::Duration;

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::time::timeout;

/// 执行结果：超时与浏览器错误分开，便于上层映射为不同的抓取错误
#[derive(Debug)]
pub enum ExecError {
    Timeout(Duration),
    Cdp(chromiumoxide::error::CdpError),
    Decode(serde_json::Error),
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::Timeout(limit) => write!(f, "超过 {:?} 未完成", limit),
            ExecError::Cdp(e) => write!(f, "{}", e),
            ExecError::Decode(e) => write!(f, "返回值无法解析: {}", e),
        }
    }
}

/// JS 执行器
///
/// 职责：
/// - 持有 Page 资源，用完后关闭
/// - 不认识分类、批次
/// - 不处理重试
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 导航到 URL，并等待导航完成
    pub async fn goto(&self, url: &str, load_timeout: Duration) -> Result<(), ExecError> {
        timeout(load_timeout, self.page.goto(url))
            .await
            .map_err(|_| ExecError::Timeout(load_timeout))?
            .map_err(ExecError::Cdp)?;
        Ok(())
    }

    /// 等待网络空闲；超时只说明页面还有长连接，不算错误
    pub async fn wait_for_idle(&self, idle_timeout: Duration) -> bool {
        matches!(
            timeout(idle_timeout, self.page.wait_for_navigation()).await,
            Ok(Ok(_))
        )
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(
        &self,
        js_code: impl Into<String>,
        eval_timeout: Duration,
    ) -> Result<JsonValue, ExecError> {
        let result = timeout(eval_timeout, self.page.evaluate(js_code.into()))
            .await
            .map_err(|_| ExecError::Timeout(eval_timeout))?
            .map_err(ExecError::Cdp)?;
        result.into_value().map_err(ExecError::Decode)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
        eval_timeout: Duration,
    ) -> Result<T, ExecError> {
        let json_value = self.eval(js_code, eval_timeout).await?;
        serde_json::from_value(json_value).map_err(ExecError::Decode)
    }

    /// 关闭页面
    pub async fn close(self) {
        if let Err(e) = self.page.close().await {
            tracing::debug!("关闭页面失败: {}", e);
        }
    }
}
