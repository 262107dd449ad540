// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::job_worker::JobWorker;
use super::worker::Worker;
use crate::config::settings::QueueSettings;
use crate::queue::executor::JobExecutor;

/// 工作管理器
///
/// 管理持久队列的工作器池
pub struct WorkerManager {
    executor: JobExecutor,
    settings: QueueSettings,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerManager {
    pub fn new(executor: JobExecutor, settings: QueueSettings) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            executor,
            settings,
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// 启动工作进程
    ///
    /// # 参数
    ///
    /// * `count` - 要启动的工作进程数量
    pub fn start_workers(&mut self, count: usize) {
        let lease = chrono::Duration::seconds(self.settings.lease_secs as i64);
        let poll_interval = Duration::from_millis(self.settings.poll_interval_ms);

        for _ in 0..count {
            let worker = JobWorker::new(
                self.executor.clone(),
                lease,
                poll_interval,
                self.shutdown_tx.subscribe(),
            );
            let handle = tokio::spawn(async move {
                if let Err(e) = worker.run().await {
                    error!("Worker {} exited with error: {}", worker.name(), e);
                }
            });
            self.handles.push(handle);
        }
        info!("Started {} queue workers", count);
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// 通知全部工作器停止，等待正在执行的任务结束
    ///
    /// 超过 `grace` 仍未结束的工作器会被中止，其任务在租约过期后由其他进程重新领取。
    pub async fn shutdown(&mut self, grace: Duration) {
        info!("Shutting down workers...");
        let _ = self.shutdown_tx.send(true);

        for handle in self.handles.drain(..) {
            let abort = handle.abort_handle();
            if tokio::time::timeout(grace, handle).await.is_err() {
                warn!("Worker did not stop within {:?}, aborting", grace);
                abort.abort();
            }
        }
        info!("Workers shut down successfully");
    }
}
