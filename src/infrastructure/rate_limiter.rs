//! 限流器 - 基础设施层
//!
//! 两层约束：
//! - 单个任务：两次请求之间至少间隔 `min_delay`，再叠加最多到 `max_delay` 的随机抖动
//! - 全局：任意 60 秒滑动窗口内，所有任务合计的请求数不超过 `requests_per_minute`
//!
//! `acquire()` 只会等待，不会永久拒绝；等待超过上限时返回 `RateLimitTimeout`。

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ScrapeError;
use crate::models::SpeedProfile;

/// 滑动窗口长度
pub const WINDOW: Duration = Duration::from_secs(60);

/// 全局限流器，所有任务共享一个实例
pub struct RateLimiter {
    /// 窗口内每次请求的时间点
    window: Mutex<VecDeque<Instant>>,
    requests_per_minute: usize,
    min_delay: Duration,
    max_delay: Duration,
    max_wait: Duration,
}

impl RateLimiter {
    pub fn new(profile: &SpeedProfile, max_wait: Duration) -> Self {
        Self {
            window: Mutex::new(VecDeque::new()),
            requests_per_minute: profile.requests_per_minute.max(1) as usize,
            min_delay: profile.min_delay,
            max_delay: profile.max_delay.max(profile.min_delay),
            max_wait,
        }
    }

    /// 为一个任务创建节拍器（记录该任务上一次请求的时间）
    pub fn pacer(self: &Arc<Self>) -> Pacer {
        Pacer {
            limiter: Arc::clone(self),
            last_request: None,
        }
    }

    /// 当前窗口内的请求数
    pub async fn in_window(&self) -> usize {
        let mut window = self.window.lock().await;
        prune(&mut window, Instant::now());
        window.len()
    }

    /// 本次请求的间隔：min_delay + [0, max_delay - min_delay] 的随机抖动
    fn spacing(&self) -> Duration {
        let span_ms = (self.max_delay - self.min_delay).as_millis() as u64;
        let jitter_ms = rand::thread_rng().gen_range(0..=span_ms);
        self.min_delay + Duration::from_millis(jitter_ms)
    }

    fn check_budget(&self, started: Instant, ready_at: Instant) -> Result<(), ScrapeError> {
        let needed = ready_at.saturating_duration_since(started);
        if needed > self.max_wait {
            return Err(ScrapeError::RateLimitTimeout {
                needed,
                max_wait: self.max_wait,
            });
        }
        Ok(())
    }

    /// 在全局窗口中占一个位置
    async fn reserve_slot(
        &self,
        started: Instant,
        cancel: &CancellationToken,
    ) -> Result<(), ScrapeError> {
        loop {
            let ready_at = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                prune(&mut window, now);

                if window.len() < self.requests_per_minute {
                    window.push_back(now);
                    return Ok(());
                }

                match window.front() {
                    Some(oldest) => *oldest + WINDOW,
                    None => now,
                }
            };

            self.check_budget(started, ready_at)?;
            debug!(
                "⏳ 每分钟请求数已达上限 {}, 等待 {:?}",
                self.requests_per_minute,
                ready_at.saturating_duration_since(Instant::now())
            );
            wait_until(ready_at, cancel).await?;
        }
    }
}

/// 单个任务的节拍器
pub struct Pacer {
    limiter: Arc<RateLimiter>,
    last_request: Option<Instant>,
}

impl Pacer {
    /// 在发起任何网络请求之前调用
    pub async fn acquire(&mut self, cancel: &CancellationToken) -> Result<(), ScrapeError> {
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }

        let started = Instant::now();

        if let Some(last) = self.last_request {
            let ready_at = last + self.limiter.spacing();
            if ready_at > started {
                self.limiter.check_budget(started, ready_at)?;
                wait_until(ready_at, cancel).await?;
            }
        }

        self.limiter.reserve_slot(started, cancel).await?;
        self.last_request = Some(Instant::now());
        Ok(())
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant) {
    while let Some(oldest) = window.front() {
        if now.saturating_duration_since(*oldest) >= WINDOW {
            window.pop_front();
        } else {
            break;
        }
    }
}

async fn wait_until(deadline: Instant, cancel: &CancellationToken) -> Result<(), ScrapeError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
        _ = sleep_until(deadline) => Ok(()),
    }
}
