//! 结果写入任务
//!
//! 所有写入端由一个任务独占，任务从队列中取写入请求，逐个写入端写完并刷新后再确认。
//! 文件句柄因此不会被多个任务同时使用，调用方等待确认时也不会阻塞其他任务的抓取。

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::StorageError;
use crate::models::QuestionRecord;
use crate::services::result_sink::ResultSink;

struct WriteRequest {
    records: Vec<QuestionRecord>,
    ack: oneshot::Sender<Result<(), StorageError>>,
}

/// 写入任务的句柄，可克隆
#[derive(Clone)]
pub struct SinkHandle {
    tx: mpsc::Sender<WriteRequest>,
}

impl SinkHandle {
    /// 提交一批记录并等待写入确认
    pub async fn write(&self, records: Vec<QuestionRecord>) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }
        let (ack, done) = oneshot::channel();
        self.tx
            .send(WriteRequest { records, ack })
            .await
            .map_err(|_| StorageError::WriterClosed)?;
        done.await.map_err(|_| StorageError::WriterClosed)?
    }
}

/// 启动写入任务
///
/// 所有句柄被丢弃后任务刷新全部写入端并退出。
pub fn spawn_sink_writer(
    mut sinks: Vec<Box<dyn ResultSink>>,
    queue_capacity: usize,
) -> (SinkHandle, JoinHandle<Result<(), StorageError>>) {
    let (tx, mut rx) = mpsc::channel::<WriteRequest>(queue_capacity.max(1));

    let task = tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let result = write_all(&mut sinks, &request.records).await;
            let failed = result.is_err();
            if let Err(e) = &result {
                error!("❌ 结果写入失败: {}", e);
            }
            // 调用方可能已经放弃等待
            let _ = request.ack.send(result);
            if failed {
                return Err(StorageError::WriterClosed);
            }
        }

        for sink in sinks.iter_mut() {
            sink.flush().await?;
        }
        debug!("结果写入任务已退出");
        Ok(())
    });

    (SinkHandle { tx }, task)
}

async fn write_all(
    sinks: &mut [Box<dyn ResultSink>],
    records: &[QuestionRecord],
) -> Result<(), StorageError> {
    for sink in sinks.iter_mut() {
        sink.write(records).await?;
        sink.flush().await?;
        debug!("写入端 {} 已写入 {} 条记录", sink.name(), records.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionKind;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct MemorySink {
        written: Arc<Mutex<Vec<String>>>,
        fail: bool,
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
            let mut written = self.written.lock().unwrap();
            written.extend(records.iter().map(|r| r.key.clone()));
            Ok(())
        }
    }

    fn record(key: &str) -> QuestionRecord {
        QuestionRecord {
            key: key.into(),
            category: "music".into(),
            quiz_url: String::new(),
            kind: QuestionKind::MultipleChoice,
            question: format!("question {}", key),
            options: Vec::new(),
            correct_answer: "x".into(),
            description: None,
            difficulty: None,
            image_url: None,
            audio_url: None,
        }
    }

    #[tokio::test]
    async fn acknowledged_writes_are_visible() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let (handle, task) = spawn_sink_writer(
            vec![Box::new(MemorySink {
                written: written.clone(),
                fail: false,
            })],
            4,
        );

        handle.write(vec![record("a"), record("b")]).await.unwrap();
        assert_eq!(written.lock().unwrap().len(), 2);

        drop(handle);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failing_sink_closes_writer() {
        let (handle, task) = spawn_sink_writer(
            vec![Box::new(MemorySink {
                written: Arc::new(Mutex::new(Vec::new())),
                fail: true,
            })],
            4,
        );

        let err = handle.write(vec![record("a")]).await.unwrap_err();
        assert!(matches!(err, StorageError::WriteFailed { .. }));

        let again = handle.write(vec![record("b")]).await.unwrap_err();
        assert!(matches!(again, StorageError::WriterClosed));
        assert!(task.await.unwrap().is_err());
    }
}
