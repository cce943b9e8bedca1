//! 应用入口 - 组装各层
//!
//! 负责目录准备、浏览器连接、写入端组装，以及 status / health 两个只读模式。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chromiumoxide::Browser;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::browser;
use crate::cli::{BatchArgs, SingleArgs};
use crate::config::Config;
use crate::infrastructure::{read_records, CheckpointIndex};
use crate::models::{load_categories, CategorySelection, WorkloadSpec};
use crate::orchestrator::{BatchRunner, RunSummary};
use crate::services::{
    spawn_sink_writer, BrowserQuestionSource, CsvSink, FailureReport, MediaDownloader,
    QuestionSource, ResultSink,
};
use crate::utils::logging::{init_log_file, log_startup};

/// 应用主结构
pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 创建运行所需的目录
    pub async fn ensure_directories(&self) -> Result<()> {
        let mut dirs = vec![
            self.config.output_dir.clone(),
            self.config.images_dir.clone(),
            self.config.audio_dir.clone(),
        ];
        if let Some(parent) = self.config.log_file.parent() {
            dirs.push(parent.to_path_buf());
        }
        for dir in dirs.iter().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("无法创建目录 {}", dir.display()))?;
        }

        if !fs::try_exists(&self.config.categories_file).await.unwrap_or(false) {
            warn!(
                "⚠️ 分类文件 {} 不存在，只能通过 --categories 指定分类",
                self.config.categories_file.display()
            );
        }
        Ok(())
    }

    /// 批量模式
    pub async fn run_batch(&self, args: &BatchArgs, cancel: CancellationToken) -> Result<RunSummary> {
        let mut config = self.config.clone();
        args.apply(&mut config);
        config.validate()?;
        let profile = config.resolve_profile()?;

        let workload = WorkloadSpec {
            categories: CategorySelection::parse(&args.categories),
            max_questions: args.max_questions,
            batch_size: config.batch_size,
            parallel_jobs: profile.default_concurrency,
            questions_per_batch: config.questions_per_batch,
            resume_from_group: args.resume_from_group,
        };

        init_log_file(&config.log_file)?;
        log_startup(&config, "batch");
        self.execute(&config, workload, args.resume, &config.checkpoint_path, cancel)
            .await
    }

    /// 单次模式：单任务，不续传，使用独立的检查点文件
    pub async fn run_single(&self, args: &SingleArgs, cancel: CancellationToken) -> Result<RunSummary> {
        let mut config = self.config.clone();
        args.apply(&mut config);
        config.validate()?;

        let categories = args
            .categories
            .as_deref()
            .map(CategorySelection::parse)
            .unwrap_or(CategorySelection::All);

        let workload = WorkloadSpec {
            categories,
            max_questions: Some(args.max_questions),
            batch_size: config.batch_size,
            parallel_jobs: 1,
            questions_per_batch: config.questions_per_batch,
            resume_from_group: None,
        };

        init_log_file(&config.log_file)?;
        log_startup(&config, "single");
        let checkpoint = config.checkpoint_path.with_file_name("single_checkpoints.jsonl");
        self.execute(&config, workload, false, &checkpoint, cancel).await
    }

    async fn execute(
        &self,
        config: &Config,
        workload: WorkloadSpec,
        resume: bool,
        checkpoint: &Path,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        workload.validate()?;
        let profile = config.resolve_profile()?;

        let catalog = match &workload.categories {
            CategorySelection::All => {
                let strategy = config.order_strategy()?;
                info!("🔀 分类排序策略: {}", strategy);
                strategy.order(load_categories(&config.categories_file).await?)
            }
            CategorySelection::Named(_) => Vec::new(),
        };

        let browser = open_browser(config).await?;
        let source: Arc<dyn QuestionSource> = Arc::new(
            BrowserQuestionSource::new(browser, config.base_url.clone(), &config.extract_script).await?,
        );

        let mut sinks: Vec<Box<dyn ResultSink>> = vec![Box::new(CsvSink::new(&config.output_dir))];
        if config.download_media {
            sinks.push(Box::new(MediaDownloader::new(
                &config.images_dir,
                &config.audio_dir,
                Duration::from_secs(config.media_timeout_secs),
            )?));
        }
        let (sink, writer) = spawn_sink_writer(sinks, workload.parallel_jobs * 2);

        let runner = BatchRunner::new(source, sink, checkpoint)
            .with_config(config.runner_config())
            .with_catalog(catalog)
            .with_failure_report(FailureReport::with_path(&config.failure_report))
            .with_cancel(cancel);

        let outcome = runner.run(&workload, &profile, resume).await;

        // 句柄全部释放后写入任务才会退出
        drop(runner);
        let written = writer.await.context("结果写入任务异常退出")?;

        let summary = outcome?;
        written?;
        Ok(summary)
    }

    /// 状态模式：汇总检查点
    pub async fn status(&self) -> Result<CheckpointIndex> {
        let path = &self.config.checkpoint_path;
        let index = CheckpointIndex::from_records(read_records(path).await?);

        info!("{}", "=".repeat(60));
        info!("📊 检查点状态: {}", path.display());
        info!("{}", "=".repeat(60));
        for (status, count) in index.status_counts() {
            info!("  {}: {}", status, count);
        }
        info!("📝 检查点记录: {} 行", index.total_records());
        info!("❓ 已收集题目: {}", index.collected_records());
        info!("🏁 已抓完的分类: {}", index.exhausted_categories().len());

        let failed = index.failed_categories();
        if failed.is_empty() {
            info!("✅ 没有失败的分类");
        } else {
            let names: Vec<String> = failed.into_iter().collect();
            warn!("❌ 失败的分类 ({}): {}", names.len(), names.join(","));
        }
        Ok(index)
    }

    /// 健康检查模式
    pub async fn health(&self) -> Result<()> {
        let mut problems = Vec::new();

        if let Err(e) = self.config.validate() {
            problems.push(format!("配置无效: {}", e));
        }

        let log_dir = self.config.log_file.parent().map(Path::to_path_buf);
        for dir in [Some(self.config.output_dir.clone()), log_dir, self.config.images_dir.parent().map(Path::to_path_buf)]
            .into_iter()
            .flatten()
            .filter(|d| !d.as_os_str().is_empty())
        {
            if !fs::try_exists(&dir).await.unwrap_or(false) {
                problems.push(format!("目录 {} 不存在", dir.display()));
            }
        }

        if let Err(e) = read_records(&self.config.checkpoint_path).await {
            problems.push(format!("检查点不可读: {}", e));
        }

        if !fs::try_exists(&self.config.extract_script).await.unwrap_or(false) {
            problems.push(format!(
                "提取脚本 {} 不存在",
                self.config.extract_script.display()
            ));
        }

        if problems.is_empty() {
            info!("✅ 运行环境正常");
            return Ok(());
        }
        for problem in &problems {
            error!("❌ {}", problem);
        }
        bail!("健康检查失败: {} 项问题", problems.len())
    }
}

async fn open_browser(config: &Config) -> Result<Browser> {
    let browser = match config.browser_debug_port {
        Some(port) => browser::connect_to_browser(port).await?,
        None => browser::launch_headless_browser(config.chrome_path.as_deref()).await?,
    };
    Ok(browser)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchStatus, CheckpointRecord};
    use crate::infrastructure::CheckpointStore;

    fn config_in(dir: &Path) -> Config {
        Config {
            output_dir: dir.join("output"),
            images_dir: dir.join("assets/images"),
            audio_dir: dir.join("assets/audio"),
            log_file: dir.join("logs/scraper.log"),
            checkpoint_path: dir.join("output/checkpoints.jsonl"),
            categories_file: dir.join("output/all_categories.json"),
            extract_script: dir.join("config/extract.js"),
            failure_report: dir.join("output/failed.txt"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn creates_directories_then_health_reports_missing_script() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::new(config_in(dir.path()));

        app.ensure_directories().await.unwrap();
        assert!(dir.path().join("assets/audio").is_dir());
        assert!(dir.path().join("logs").is_dir());

        let err = app.health().await.unwrap_err();
        assert!(err.to_string().contains("1 项"));

        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join("config/extract.js"), "async () => ({items: []})").unwrap();
        assert!(app.health().await.is_ok());
    }

    #[tokio::test]
    async fn status_lists_failed_categories() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let store = CheckpointStore::open(&config.checkpoint_path).await.unwrap();
        for (id, category, status) in [
            (1, "movies", BatchStatus::Succeeded),
            (2, "music", BatchStatus::Failed),
        ] {
            store
                .append(&CheckpointRecord {
                    batch_id: id,
                    category: category.into(),
                    offset: 0,
                    quota: Some(5),
                    status,
                    timestamp: chrono::Utc::now(),
                    records_collected: if id == 1 { 5 } else { 0 },
                    exhausted: false,
                    error_detail: None,
                })
                .await
                .unwrap();
        }

        let index = App::new(config).status().await.unwrap();
        assert_eq!(index.collected_records(), 5);
        assert_eq!(index.total_records(), 2);
        assert!(index.failed_categories().contains("music"));
    }
}
