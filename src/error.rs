use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
///
/// 只有 `Config` 与 `Storage` 会让整次运行失败，
/// `Scrape` 只影响单个批次。
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（在任何调度之前发现）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 抓取错误
    #[error("抓取错误: {0}")]
    Scrape(#[from] ScrapeError),
    /// 存储错误（结果写入或检查点写入）
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 未知的速度档位
    #[error("未知的速度档位: '{name}' (可选: normal, fast, aggressive)")]
    UnknownSpeedProfile { name: String },
    /// 字段取值非法
    #[error("配置项 {field} 取值非法: {reason}")]
    InvalidValue { field: String, reason: String },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 分类文件不可用
    #[error("分类文件不可用 ({path}): {reason}")]
    CategoriesUnavailable { path: String, reason: String },
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 抓取错误
///
/// 单个批次内部产生，由编排层决定是否重试
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    /// 网络请求失败或超时
    #[error("网络错误 ({category}): {message}")]
    Network { category: String, message: String },
    /// 单条记录解析失败
    #[error("解析错误 ({category}): {message}")]
    Parse { category: String, message: String },
    /// 站点拦截了请求
    #[error("站点拦截 ({category}): {message}")]
    SiteBlocked { category: String, message: String },
    /// 限流等待超过上限
    #[error("限流等待超时: 需要等待 {needed:?}, 上限 {max_wait:?}")]
    RateLimitTimeout { needed: Duration, max_wait: Duration },
    /// 运行已被取消
    #[error("运行已取消")]
    Cancelled,
    /// 抓取任务崩溃（panic）
    #[error("抓取任务崩溃 ({category}): {message}")]
    JobPanicked { category: String, message: String },
}

impl ScrapeError {
    /// 是否可以在批次层面重试
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ScrapeError::Cancelled | ScrapeError::JobPanicked { .. })
    }

    /// 错误类别名（写入检查点与日志）
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Network { .. } => "network",
            ScrapeError::Parse { .. } => "parse",
            ScrapeError::SiteBlocked { .. } => "site_blocked",
            ScrapeError::RateLimitTimeout { .. } => "rate_limit_timeout",
            ScrapeError::Cancelled => "cancelled",
            ScrapeError::JobPanicked { .. } => "panic",
        }
    }
}

/// 存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 序列化失败
    #[error("序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
    /// 媒体下载失败
    #[error("媒体下载失败 ({url}): {message}")]
    DownloadFailed { url: String, message: String },
    /// 写入任务已关闭
    #[error("结果写入任务已关闭")]
    WriterClosed,
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {message}")]
    ConnectionFailed { port: u16, message: String },
    /// 启动浏览器失败
    #[error("启动无头浏览器失败: {0}")]
    LaunchFailed(String),
    /// 执行脚本失败
    #[error("执行脚本失败: {0}")]
    ScriptExecutionFailed(#[from] chromiumoxide::error::CdpError),
    /// 提取脚本不可用
    #[error("提取脚本不可用 ({path}): {message}")]
    ScriptUnavailable { path: String, message: String },
}

// ========== 从常见错误类型转换 ==========

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::WriteFailed {
            path: String::new(),
            source: err,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(StorageError::from(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(StorageError::Serialize(err))
    }
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed(err))
    }
}

// ========== 便捷构造函数 ==========

impl ConfigError {
    /// 创建字段取值非法错误
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl ScrapeError {
    /// 创建网络错误
    pub fn network(category: impl Into<String>, message: impl ToString) -> Self {
        ScrapeError::Network {
            category: category.into(),
            message: message.to_string(),
        }
    }

    /// 创建解析错误
    pub fn parse(category: impl Into<String>, message: impl ToString) -> Self {
        ScrapeError::Parse {
            category: category.into(),
            message: message.to_string(),
        }
    }

    /// 创建站点拦截错误
    pub fn blocked(category: impl Into<String>, message: impl ToString) -> Self {
        ScrapeError::SiteBlocked {
            category: category.into(),
            message: message.to_string(),
        }
    }
}

impl StorageError {
    /// 创建写入失败错误
    pub fn write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        StorageError::WriteFailed {
            path: path.into(),
            source,
        }
    }

    /// 创建读取失败错误
    pub fn read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        StorageError::ReadFailed {
            path: path.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
