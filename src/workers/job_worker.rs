// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use super::worker::{Worker, WorkerError};
use crate::queue::executor::{JobExecutor, JobOutcome};

/// 队列工作器
///
/// 循环领取可执行任务并交给执行器。一次只处理一个任务，
/// 空闲时按轮询间隔休眠；关闭信号在两个任务之间生效。
pub struct JobWorker {
    id: Uuid,
    name: String,
    executor: JobExecutor,
    lease: chrono::Duration,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl JobWorker {
    pub fn new(
        executor: JobExecutor,
        lease: chrono::Duration,
        poll_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            name: format!("job-worker-{}", id),
            executor,
            lease,
            poll_interval,
            shutdown,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 领取并执行一个任务
    ///
    /// # 返回值
    ///
    /// 没有可执行任务时返回 `None`
    pub async fn process_next(&self) -> Result<Option<JobOutcome>, WorkerError> {
        let Some(job) = self
            .executor
            .jobs()
            .acquire_next(self.id, self.lease)
            .await?
        else {
            return Ok(None);
        };
        let outcome = self.executor.execute(job).await?;
        Ok(Some(outcome))
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn idle(&self) {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => {}
            _ = shutdown.changed() => {}
        }
    }
}

#[async_trait]
impl Worker for JobWorker {
    async fn run(&self) -> Result<(), WorkerError> {
        info!("Worker {} started", self.name);

        while !self.is_shutting_down() {
            match self.process_next().await {
                Ok(Some(_)) => {}
                Ok(None) => self.idle().await,
                Err(e) => {
                    error!("Worker {} failed to process job: {}", self.name, e);
                    self.idle().await;
                }
            }
        }

        info!("Worker {} stopped", self.name);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
#[path = "job_worker_test.rs"]
mod tests;
