//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了异步重建缓存条目的有界任务执行器。

use crate::config::RebuildConfig;
use crate::error::{DealError, Result};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

/// 重建任务执行器
///
/// 同时运行的任务数受 `workers` 限制，排队与运行中的任务总数受 `queue_capacity` 限制。
/// 任务内部的 panic 会被捕获并记录，不会影响执行器本身。
#[derive(Debug)]
pub struct RebuildExecutor {
    tracker: TaskTracker,
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    closed: AtomicBool,
    queue_capacity: usize,
    shutdown_timeout: Duration,
}

impl RebuildExecutor {
    pub fn new(config: &RebuildConfig) -> Self {
        Self {
            tracker: TaskTracker::new(),
            permits: Arc::new(Semaphore::new(config.workers.max(1))),
            in_flight: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
            queue_capacity: config.queue_capacity.max(1),
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
        }
    }

    /// 提交重建任务
    ///
    /// 立即返回，不等待任务执行。执行器已关闭或队列已满时返回错误，任务被丢弃。
    pub fn submit<F>(&self, name: &str, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(DealError::ShutdownError(format!(
                "rebuild executor is shut down, dropping task {}",
                name
            )));
        }

        let queued = self.in_flight.fetch_add(1, Ordering::AcqRel);
        if queued >= self.queue_capacity {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            return Err(DealError::Contention(format!(
                "rebuild queue is full ({} tasks), dropping task {}",
                self.queue_capacity, name
            )));
        }

        let permits = self.permits.clone();
        let in_flight = self.in_flight.clone();
        let name = name.to_string();
        self.tracker.spawn(async move {
            match permits.acquire_owned().await {
                Ok(_permit) => {
                    debug!("Rebuild task {} started", name);
                    if AssertUnwindSafe(task).catch_unwind().await.is_err() {
                        error!("Rebuild task {} panicked", name);
                    }
                }
                Err(_) => warn!("Rebuild task {} dropped: worker pool closed", name),
            }
            in_flight.fetch_sub(1, Ordering::AcqRel);
        });
        Ok(())
    }

    /// 排队与运行中的任务数
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 等待全部已提交任务完成，超时返回 false
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.in_flight() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    /// 关闭执行器
    ///
    /// 不再接受新任务，并在 `shutdown_timeout_ms` 内等待已提交任务结束。
    #[instrument(skip(self), level = "info")]
    pub async fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.tracker.close();
        info!(
            "Draining {} rebuild task(s) before shutdown",
            self.in_flight()
        );
        tokio::time::timeout(self.shutdown_timeout, self.tracker.wait())
            .await
            .map_err(|_| {
                DealError::ShutdownError(format!(
                    "{} rebuild task(s) still running after {}ms",
                    self.in_flight(),
                    self.shutdown_timeout.as_millis()
                ))
            })
    }
}
