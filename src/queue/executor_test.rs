// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::*;
use crate::domain::models::scrape_job::{JobStatus, JobType, CANCELLED_MESSAGE};
use crate::domain::services::notification_service::JobEventKind;
use crate::infrastructure::repositories::memory::InMemoryJobRepository;
use crate::queue::handlers::JobHandler;
use crate::queue::runner::cancel_job;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<JobEvent>>,
}

#[async_trait]
impl NotificationPublisher for RecordingNotifier {
    async fn publish(&self, _channel: &str, event: &JobEvent) {
        self.events.lock().await.push(event.clone());
    }
}

/// 发出开始信号后等待放行的处理器
#[derive(Default)]
struct GatedHandler {
    started: Notify,
    release: Notify,
}

#[async_trait]
impl JobHandler for GatedHandler {
    async fn handle(&self, job: &ScrapeJob, progress: &dyn ProgressSink) -> Result<Value, ScrapeError> {
        progress.report(30).await;
        self.started.notify_one();
        self.release.notified().await;
        Ok(json!({ "target": job.target }))
    }
}

struct Setup {
    jobs: Arc<InMemoryJobRepository>,
    handler: Arc<GatedHandler>,
    notifier: Arc<RecordingNotifier>,
    executor: JobExecutor,
}

fn setup() -> Setup {
    let jobs = Arc::new(InMemoryJobRepository::new());
    let handler = Arc::new(GatedHandler::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let executor = JobExecutor::new(
        jobs.clone(),
        HandlerRegistry::uniform(handler.clone()),
        notifier.clone(),
    );
    Setup {
        jobs,
        handler,
        notifier,
        executor,
    }
}

async fn enqueue(jobs: &InMemoryJobRepository) -> ScrapeJob {
    let job = ScrapeJob::new(JobType::Page, Some("https://example.com".into()), json!({}));
    jobs.create(&job).await.unwrap()
}

#[tokio::test]
async fn test_result_is_discarded_when_cancelled_mid_run() {
    let s = setup();
    let job = enqueue(&s.jobs).await;
    let running = s
        .jobs
        .acquire_next(Uuid::new_v4(), chrono::Duration::minutes(5))
        .await
        .unwrap()
        .unwrap();

    let executor = s.executor.clone();
    let task = tokio::spawn(async move { executor.execute(running).await });

    s.handler.started.notified().await;
    assert!(cancel_job(s.jobs.as_ref(), job.id).await.unwrap());
    s.handler.release.notify_one();

    let outcome = task.await.unwrap().unwrap();
    assert_eq!(outcome, JobOutcome::Discarded);

    let stored = s.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Cancelled);
    assert_eq!(stored.error.as_deref(), Some(CANCELLED_MESSAGE));
    assert!(stored.result.is_none());

    let kinds: Vec<JobEventKind> = s.notifier.events.lock().await.iter().map(|e| e.kind).collect();
    assert!(!kinds.contains(&JobEventKind::Complete));
}

#[tokio::test]
async fn test_stale_lease_holder_result_is_discarded() {
    let s = setup();
    let job = enqueue(&s.jobs).await;
    let stale = s
        .jobs
        .acquire_next(Uuid::new_v4(), chrono::Duration::seconds(-1))
        .await
        .unwrap()
        .unwrap();
    let owner = s
        .jobs
        .acquire_next(Uuid::new_v4(), chrono::Duration::minutes(5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(owner.id, job.id);

    s.handler.release.notify_one();
    assert_eq!(s.executor.execute(stale).await.unwrap(), JobOutcome::Discarded);
    let stored = s.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Running);
    assert_eq!(stored.lease_token, owner.lease_token);

    s.handler.release.notify_one();
    assert_eq!(s.executor.execute(owner).await.unwrap(), JobOutcome::Completed);
    let stored = s.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.attempt_count, 2);
}

#[tokio::test]
async fn test_lease_is_renewed_while_handler_runs() {
    let s = setup();
    let job = enqueue(&s.jobs).await;
    let running = s
        .jobs
        .acquire_next(Uuid::new_v4(), chrono::Duration::milliseconds(300))
        .await
        .unwrap()
        .unwrap();

    let executor = s.executor.clone();
    let task = tokio::spawn(async move { executor.execute(running).await });
    s.handler.started.notified().await;

    // 原租约早已过期，续租后其他工作器仍领取不到
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(s
        .jobs
        .acquire_next(Uuid::new_v4(), chrono::Duration::minutes(5))
        .await
        .unwrap()
        .is_none());

    s.handler.release.notify_one();
    assert_eq!(task.await.unwrap().unwrap(), JobOutcome::Completed);
    let stored = s.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.attempt_count, 1);
}
