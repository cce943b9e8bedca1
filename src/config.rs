use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::{ProfileOverrides, SpeedProfile};
use crate::orchestrator::{OrderStrategy, RunnerConfig};

/// 程序配置文件
///
/// 优先级：命令行 > 环境变量 > 配置文件 > 默认值
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 浏览器 ---
    /// 浏览器调试端口，留空则启动无头浏览器
    pub browser_debug_port: Option<u16>,
    /// 无头浏览器可执行文件路径
    pub chrome_path: Option<PathBuf>,
    /// 站点根地址
    pub base_url: String,
    /// 提取脚本路径
    pub extract_script: PathBuf,

    // --- 工作量 ---
    pub speed_profile: String,
    /// 每组包含的分类数
    pub batch_size: usize,
    pub questions_per_batch: usize,
    /// 并发任务数，留空则使用档位默认值
    pub parallel_jobs: Option<usize>,
    /// 覆盖档位的每分钟请求上限
    pub requests_per_minute: Option<u32>,
    /// 全部分类的排序策略: balanced, priority, sequential
    pub strategy: String,

    // --- 重试 ---
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub rate_limit_max_wait_secs: u64,

    // --- 文件 ---
    pub categories_file: PathBuf,
    pub checkpoint_path: PathBuf,
    pub output_dir: PathBuf,
    pub images_dir: PathBuf,
    pub audio_dir: PathBuf,
    pub failure_report: PathBuf,
    pub log_file: PathBuf,

    // --- 媒体 ---
    pub download_media: bool,
    pub media_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: None,
            chrome_path: None,
            base_url: "https://www.funtrivia.com".to_string(),
            extract_script: PathBuf::from("config/extract.js"),
            speed_profile: "normal".to_string(),
            batch_size: 2,
            questions_per_batch: 50,
            parallel_jobs: None,
            requests_per_minute: None,
            strategy: OrderStrategy::default().to_string(),
            max_retries: 2,
            backoff_base_ms: 2_000,
            backoff_cap_ms: 60_000,
            rate_limit_max_wait_secs: 300,
            categories_file: PathBuf::from("output/all_categories.json"),
            checkpoint_path: PathBuf::from("output/checkpoints.jsonl"),
            output_dir: PathBuf::from("output"),
            images_dir: PathBuf::from("assets/images"),
            audio_dir: PathBuf::from("assets/audio"),
            failure_report: PathBuf::from("output/failed.txt"),
            log_file: PathBuf::from("logs/scraper.log"),
            download_media: true,
            media_timeout_secs: 30,
        }
    }
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// 读取 TOML 配置文件（所有字段可选），再应用环境变量
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::invalid("config", format!("{}: {}", display, e)))?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: display,
            source,
        })?;
        config.apply_env()
    }

    /// 用环境变量覆盖当前值
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Some(port) = env_parse::<u16>("BROWSER_DEBUG_PORT", "u16")? {
            self.browser_debug_port = Some(port);
        }
        if let Ok(path) = std::env::var("CHROME_PATH") {
            self.chrome_path = Some(PathBuf::from(path));
        }
        if let Ok(url) = std::env::var("BASE_URL") {
            self.base_url = url;
        }
        if let Ok(path) = std::env::var("EXTRACT_SCRIPT") {
            self.extract_script = PathBuf::from(path);
        }
        if let Ok(name) = std::env::var("SPEED_PROFILE") {
            self.speed_profile = name;
        }
        if let Ok(name) = std::env::var("STRATEGY") {
            self.strategy = name;
        }
        if let Some(v) = env_parse("BATCH_SIZE", "usize")? {
            self.batch_size = v;
        }
        if let Some(v) = env_parse("QUESTIONS_PER_BATCH", "usize")? {
            self.questions_per_batch = v;
        }
        if let Some(v) = env_parse("PARALLEL_JOBS", "usize")? {
            self.parallel_jobs = Some(v);
        }
        if let Some(v) = env_parse("MAX_RETRIES", "u32")? {
            self.max_retries = v;
        }
        if let Ok(path) = std::env::var("CHECKPOINT_PATH") {
            self.checkpoint_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("CATEGORIES_FILE") {
            self.categories_file = PathBuf::from(path);
        }
        if let Some(v) = env_parse("DOWNLOAD_MEDIA", "bool")? {
            self.download_media = v;
        }
        Ok(self)
    }

    /// 在任何调度之前校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolve_profile()?;
        self.order_strategy()?;
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "必须 >= 1"));
        }
        if self.questions_per_batch == 0 {
            return Err(ConfigError::invalid("questions_per_batch", "必须 >= 1"));
        }
        if self.parallel_jobs == Some(0) {
            return Err(ConfigError::invalid("parallel_jobs", "必须 >= 1"));
        }
        if self.backoff_base_ms > self.backoff_cap_ms {
            return Err(ConfigError::invalid(
                "backoff_base_ms",
                format!("{} 大于 backoff_cap_ms {}", self.backoff_base_ms, self.backoff_cap_ms),
            ));
        }
        Ok(())
    }

    /// 解析速度档位（应用配置中的覆盖值）
    pub fn resolve_profile(&self) -> Result<SpeedProfile, ConfigError> {
        SpeedProfile::resolve(
            &self.speed_profile,
            &ProfileOverrides {
                concurrency: self.parallel_jobs,
                requests_per_minute: self.requests_per_minute,
                ..Default::default()
            },
        )
    }

    pub fn order_strategy(&self) -> Result<OrderStrategy, ConfigError> {
        self.strategy.parse()
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            max_retries: self.max_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_cap: Duration::from_millis(self.backoff_cap_ms),
            rate_limit_max_wait: Duration::from_secs(self.rate_limit_max_wait_secs),
        }
    }
}

fn env_parse<T: FromStr>(var_name: &str, expected_type: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
