use async_trait::async_trait;

use crate::error::StorageError;
use crate::models::QuestionRecord;

/// 结果写入端
///
/// 只由写入任务持有，所以方法接收 `&mut self`，不需要内部加锁。
#[async_trait]
pub trait ResultSink: Send {
    /// 名称（用于日志）
    fn name(&self) -> &str;

    /// 写入一批记录
    async fn write(&mut self, records: &[QuestionRecord]) -> Result<(), StorageError>;

    /// 刷新缓冲区
    async fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}
