//! 重试队列
//!
//! 单个后台任务按顺序执行队列中的作业，同一时刻只有一个作业在运行。
//!
//! - 新作业严格先进先出
//! - 失败的作业进入独立的重试通道，按 `base * 2^retries` 退避；
//!   退避到期的重试优先于下一个新作业执行，不会排在积压的新作业之后
//! - 不可重试的错误（见 [`crate::error::is_terminal`]）直接丢弃，不消耗重试次数
//! - 重试次数达到上限后丢弃，失败作为该作业的最终结果

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{watch, Notify};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::config::QueueSettings;
use crate::error::{is_terminal, AppError};

type JobTask = Box<dyn FnMut() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// 队列中的一个作业
///
/// `task` 每次重试都会被重新调用，因此必须能够多次执行。
pub struct QueueJob {
    pub id: String,
    task: JobTask,
    /// 之前失败的次数
    pub retries: u32,
}

impl QueueJob {
    pub fn new<F, Fut>(id: impl Into<String>, mut task: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            id: id.into(),
            task: Box::new(move || task().boxed()),
            retries: 0,
        }
    }
}

impl std::fmt::Debug for QueueJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueJob")
            .field("id", &self.id)
            .field("retries", &self.retries)
            .finish()
    }
}

/// 作业的最终结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded {
        id: String,
        retries: u32,
    },
    Dropped {
        id: String,
        retries: u32,
        error: String,
        /// 因不可重试的错误而提前放弃
        terminal: bool,
    },
}

impl JobOutcome {
    pub fn id(&self) -> &str {
        match self {
            JobOutcome::Succeeded { id, .. } | JobOutcome::Dropped { id, .. } => id,
        }
    }

    pub fn retries(&self) -> u32 {
        match self {
            JobOutcome::Succeeded { retries, .. } | JobOutcome::Dropped { retries, .. } => *retries,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    /// 单次执行的时间上限，`None` 表示不限制
    pub job_timeout: Option<Duration>,
}

impl RetryPolicy {
    /// 第 `retries` 次失败之后的等待时间
    pub fn backoff(&self, retries: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << retries.min(16))
    }
}

impl From<&QueueSettings> for RetryPolicy {
    fn from(settings: &QueueSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: settings.retry_base_delay(),
            job_timeout: settings.job_timeout(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&QueueSettings::default())
    }
}

struct ScheduledRetry {
    ready_at: Instant,
    job: QueueJob,
}

#[derive(Default)]
struct QueueState {
    fresh: VecDeque<QueueJob>,
    retries: Vec<ScheduledRetry>,
    running: bool,
    outcomes: Vec<JobOutcome>,
}

enum Next {
    Run(QueueJob),
    WaitUntil(Instant),
    Idle,
}

impl QueueState {
    fn next(&mut self, now: Instant) -> Next {
        let earliest = self
            .retries
            .iter()
            .enumerate()
            .min_by_key(|(_, scheduled)| scheduled.ready_at)
            .map(|(index, scheduled)| (index, scheduled.ready_at));

        match earliest {
            Some((index, ready_at)) if ready_at <= now => Next::Run(self.retries.remove(index).job),
            _ => match self.fresh.pop_front() {
                Some(job) => Next::Run(job),
                None => match earliest {
                    Some((_, ready_at)) => Next::WaitUntil(ready_at),
                    None => {
                        self.running = false;
                        Next::Idle
                    }
                },
            },
        }
    }
}

struct Inner {
    policy: RetryPolicy,
    state: Mutex<QueueState>,
    wakeup: Notify,
    idle: watch::Sender<bool>,
}

/// 重试队列，克隆后共享同一个队列
#[derive(Clone)]
pub struct RetryQueue {
    inner: Arc<Inner>,
}

impl RetryQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                policy,
                state: Mutex::new(QueueState::default()),
                wakeup: Notify::new(),
                idle,
            }),
        }
    }

    /// 作业加入队尾；队列空闲时启动后台执行任务
    ///
    /// 必须在 tokio 运行时中调用。
    pub fn enqueue(&self, job: QueueJob) {
        debug!("📥 作业入队: {}", job.id);
        let mut state = self.inner.lock();
        state.fresh.push_back(job);

        if state.running {
            drop(state);
            self.inner.wakeup.notify_one();
        } else {
            state.running = true;
            self.inner.idle.send_replace(false);
            drop(state);
            tokio::spawn(drain(self.inner.clone()));
        }
    }

    /// 等待队列中所有作业（包括重试）结束
    pub async fn wait_idle(&self) {
        let mut idle = self.inner.idle.subscribe();
        // 发送端由队列自身持有，不会关闭
        let _ = idle.wait_for(|idle| *idle).await;
    }

    pub fn is_idle(&self) -> bool {
        *self.inner.idle.borrow()
    }

    /// 尚未结束的作业数量（不含正在执行的作业）
    pub fn pending(&self) -> usize {
        let state = self.inner.lock();
        state.fresh.len() + state.retries.len()
    }

    /// 已经结束的作业，按结束顺序排列
    pub fn outcomes(&self) -> Vec<JobOutcome> {
        self.inner.lock().outcomes.clone()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // 锁内不会 panic，出现中毒时继续使用内部数据
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn finish(&self, outcome: JobOutcome) {
        self.lock().outcomes.push(outcome);
    }
}

async fn drain(inner: Arc<Inner>) {
    loop {
        let next = {
            let mut state = inner.lock();
            let next = state.next(Instant::now());
            // 与 enqueue 在同一把锁内切换空闲标记
            if matches!(next, Next::Idle) {
                inner.idle.send_replace(true);
            }
            next
        };
        match next {
            Next::Run(job) => run_job(&inner, job).await,
            Next::WaitUntil(ready_at) => {
                tokio::select! {
                    _ = sleep_until(ready_at) => {}
                    _ = inner.wakeup.notified() => {}
                }
            }
            Next::Idle => {
                debug!("队列已清空");
                break;
            }
        }
    }
}

async fn run_job(inner: &Inner, mut job: QueueJob) {
    debug!("▶️ 执行作业 {} (已重试 {} 次)", job.id, job.retries);

    let attempt = AssertUnwindSafe((job.task)()).catch_unwind();
    let result = match inner.policy.job_timeout {
        Some(limit) => match timeout(limit, attempt).await {
            Ok(result) => result,
            Err(_) => Ok(Err(AppError::Timeout {
                seconds: limit.as_secs(),
            }
            .into())),
        },
        None => attempt.await,
    };
    let result = result.unwrap_or_else(|_| Err(anyhow::anyhow!("作业执行时发生 panic")));

    let err = match result {
        Ok(()) => {
            info!("✅ 作业完成: {}", job.id);
            inner.finish(JobOutcome::Succeeded {
                id: job.id,
                retries: job.retries,
            });
            return;
        }
        Err(err) => err,
    };

    if is_terminal(&err) {
        error!("❌ 作业 {} 遇到不可重试的错误，放弃: {:#}", job.id, err);
        inner.finish(JobOutcome::Dropped {
            id: job.id,
            retries: job.retries,
            error: format!("{:#}", err),
            terminal: true,
        });
        return;
    }

    if job.retries >= inner.policy.max_retries {
        error!(
            "❌ 作业 {} 已重试 {} 次仍失败，放弃: {:#}",
            job.id, job.retries, err
        );
        inner.finish(JobOutcome::Dropped {
            id: job.id,
            retries: job.retries,
            error: format!("{:#}", err),
            terminal: false,
        });
        return;
    }

    let delay = inner.policy.backoff(job.retries);
    job.retries += 1;
    warn!(
        "⚠️ 作业 {} 失败，{} 毫秒后第 {} 次重试: {:#}",
        job.id,
        delay.as_millis(),
        job.retries,
        err
    );
    inner.lock().retries.push(ScheduledRetry {
        ready_at: Instant::now() + delay,
        job,
    });
}
