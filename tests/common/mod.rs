#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use trivia_batch_scraper::models::{
    BatchStatus, CategorySelection, CheckpointRecord, ProfileOverrides, QuestionKind,
    QuestionRecord, SpeedProfile, WorkloadSpec,
};
use trivia_batch_scraper::orchestrator::{BatchRunner, RunnerConfig};
use trivia_batch_scraper::services::{
    spawn_sink_writer, ExtractRequest, Extracted, QuestionSource, ResultSink, SinkHandle,
};
use trivia_batch_scraper::{ScrapeError, StorageError};

/// 某个分类的模拟行为
pub struct Behaviour {
    /// 分类中题目总数
    pub available: usize,
    /// 单次提取最多返回的题目数
    pub page_size: usize,
    /// 第几次调用（从 0 开始，按分类计数）返回网络错误
    pub fail_when: Box<dyn Fn(usize) -> bool + Send + Sync>,
    /// 返回的每一项都无法解析
    pub corrupt: bool,
}

impl Behaviour {
    pub fn serve(available: usize) -> Self {
        Self {
            available,
            page_size: usize::MAX,
            fail_when: Box::new(|_| false),
            corrupt: false,
        }
    }

    pub fn always_fail() -> Self {
        Self {
            fail_when: Box::new(|_| true),
            ..Self::serve(0)
        }
    }

    pub fn page_size(mut self, n: usize) -> Self {
        self.page_size = n;
        self
    }

    pub fn fail_when(mut self, f: impl Fn(usize) -> bool + Send + Sync + 'static) -> Self {
        self.fail_when = Box::new(f);
        self
    }

    pub fn corrupt(mut self) -> Self {
        self.corrupt = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub category: String,
    pub offset: usize,
    pub limit: usize,
    pub at: Instant,
}

/// 按分类脚本化的题目来源，记录每次调用和最大并发数
pub struct ScriptedSource {
    behaviours: HashMap<String, Behaviour>,
    latency: Duration,
    calls: Mutex<Vec<Call>>,
    per_category: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(behaviours: Vec<(&str, Behaviour)>) -> Self {
        Self {
            behaviours: behaviours
                .into_iter()
                .map(|(name, b)| (name.to_string(), b))
                .collect(),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            per_category: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// 每次提取耗时
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, category: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.category == category)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionSource for ScriptedSource {
    async fn fetch_and_extract(
        &self,
        request: &ExtractRequest,
        _profile: &SpeedProfile,
    ) -> Result<Extracted, ScrapeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.calls.lock().unwrap().push(Call {
            category: request.category.clone(),
            offset: request.offset,
            limit: request.limit,
            at: Instant::now(),
        });
        let call_index = {
            let mut counts = self.per_category.lock().unwrap();
            let count = counts.entry(request.category.clone()).or_insert(0);
            *count += 1;
            *count - 1
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let Some(behaviour) = self.behaviours.get(&request.category) else {
            return Ok(Extracted {
                items: Vec::new(),
                exhausted: true,
            });
        };

        if (behaviour.fail_when)(call_index) {
            return Err(ScrapeError::network(&request.category, "connection reset"));
        }

        let end = behaviour
            .available
            .min(request.offset.saturating_add(request.limit))
            .min(request.offset.saturating_add(behaviour.page_size));
        let items = (request.offset..end.max(request.offset))
            .map(|n| {
                if behaviour.corrupt {
                    Err(ScrapeError::parse(&request.category, "missing answer"))
                } else {
                    Ok(record(&request.category, n))
                }
            })
            .collect();

        Ok(Extracted {
            items,
            exhausted: end >= behaviour.available,
        })
    }
}

pub fn record(category: &str, n: usize) -> QuestionRecord {
    QuestionRecord {
        key: format!("{}-{}", category, n),
        category: category.to_string(),
        quiz_url: format!("https://example.test/quizzes/{}/", category),
        kind: QuestionKind::MultipleChoice,
        question: format!("{} question {}", category, n),
        options: vec!["a".into(), "b".into()],
        correct_answer: "a".into(),
        description: None,
        difficulty: None,
        image_url: None,
        audio_url: None,
    }
}

/// 记录到内存的写入端
pub struct MemorySink {
    pub records: Arc<Mutex<Vec<QuestionRecord>>>,
    pub fail: bool,
}

#[async_trait]
impl ResultSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write(&mut self, records: &[QuestionRecord]) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::write_failed(
                "memory",
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            ));
        }
        self.records.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}

pub fn memory_sink(fail: bool) -> (SinkHandle, Arc<Mutex<Vec<QuestionRecord>>>) {
    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = MemorySink {
        records: records.clone(),
        fail,
    };
    let (handle, _task) = spawn_sink_writer(vec![Box::new(sink)], 4);
    (handle, records)
}

/// 无间隔、请求上限很高的档位
pub fn quick_profile() -> SpeedProfile {
    SpeedProfile::resolve(
        "aggressive",
        &ProfileOverrides {
            requests_per_minute: Some(10_000),
            min_delay: Some(Duration::ZERO),
            max_delay: Some(Duration::ZERO),
            ..Default::default()
        },
    )
    .unwrap()
}

pub fn runner_config() -> RunnerConfig {
    RunnerConfig {
        max_retries: 2,
        backoff_base: Duration::from_secs(1),
        backoff_cap: Duration::from_secs(30),
        rate_limit_max_wait: Duration::from_secs(600),
    }
}

pub fn workload(
    categories: &[&str],
    max_questions: Option<usize>,
    questions_per_batch: usize,
    parallel_jobs: usize,
) -> WorkloadSpec {
    WorkloadSpec {
        categories: CategorySelection::Named(categories.iter().map(|s| s.to_string()).collect()),
        max_questions,
        batch_size: 1,
        parallel_jobs,
        questions_per_batch,
        resume_from_group: None,
    }
}

pub fn runner(
    source: Arc<ScriptedSource>,
    sink: SinkHandle,
    checkpoint: &Path,
) -> BatchRunner {
    BatchRunner::new(source, sink, checkpoint).with_config(runner_config())
}

/// 每次提取都会 panic 的来源
pub struct PanickingSource;

#[async_trait]
impl QuestionSource for PanickingSource {
    async fn fetch_and_extract(
        &self,
        request: &ExtractRequest,
        _profile: &SpeedProfile,
    ) -> Result<Extracted, ScrapeError> {
        panic!("提取脚本返回了意外的结构: {}", request.category);
    }
}

pub fn failed(batch_id: u64, category: &str, offset: usize, quota: usize) -> CheckpointRecord {
    CheckpointRecord {
        batch_id,
        category: category.to_string(),
        offset,
        quota: Some(quota),
        status: BatchStatus::Failed,
        timestamp: chrono::Utc::now(),
        records_collected: 0,
        exhausted: false,
        error_detail: Some("network: connection reset".to_string()),
    }
}
