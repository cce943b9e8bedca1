//! 基础设施层：持有稀缺或共享的资源，只暴露能力
//!
//! - `JsExecutor` - 持有浏览器页面
//! - `RateLimiter` - 所有任务共享的请求节拍
//! - `CheckpointStore` - 唯一的持久状态

pub mod checkpoint_store;
pub mod js_executor;
pub mod rate_limiter;

pub use checkpoint_store::{read_records, CheckpointIndex, CheckpointStore};
pub use js_executor::{ExecError, JsExecutor};
pub use rate_limiter::{Pacer, RateLimiter};
