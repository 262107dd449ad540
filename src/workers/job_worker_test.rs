// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::*;
use crate::domain::models::scrape_job::{JobStatus, JobType, ScrapeJob};
use crate::domain::repositories::job_repository::JobRepository;
use crate::domain::services::notification_service::{JobEvent, JobEventKind, NotificationPublisher};
use crate::infrastructure::repositories::memory::InMemoryJobRepository;
use crate::queue::handlers::{HandlerRegistry, JobHandler, ProgressSink};
use crate::utils::errors::ScrapeError;
use crate::utils::retry_policy::RetryPolicy;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

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

/// 前 `failures` 次调用返回导航错误，之后成功
struct FlakyHandler {
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl JobHandler for FlakyHandler {
    async fn handle(&self, job: &ScrapeJob, progress: &dyn ProgressSink) -> Result<Value, ScrapeError> {
        progress.report(20).await;
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ScrapeError::navigation(
                job.target.clone().unwrap_or_default(),
                "connection reset",
            ));
        }
        progress.report(80).await;
        Ok(json!({ "attempt": call + 1 }))
    }
}

struct Setup {
    jobs: Arc<InMemoryJobRepository>,
    notifier: Arc<RecordingNotifier>,
    worker: JobWorker,
    _shutdown: watch::Sender<bool>,
}

fn setup(failures: usize, max_attempts: u32) -> Setup {
    let jobs = Arc::new(InMemoryJobRepository::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let handler = Arc::new(FlakyHandler {
        failures,
        calls: AtomicUsize::new(0),
    });
    let executor = JobExecutor::new(jobs.clone(), HandlerRegistry::uniform(handler), notifier.clone())
        .with_retry(RetryPolicy::exponential(Duration::ZERO));
    let (tx, rx) = watch::channel(false);
    let worker = JobWorker::new(
        executor,
        chrono::Duration::minutes(5),
        Duration::from_millis(10),
        rx,
    );
    Setup {
        jobs,
        notifier,
        worker,
        _shutdown: tx,
    }
}

async fn enqueue(jobs: &InMemoryJobRepository, max_attempts: i32) -> ScrapeJob {
    let mut job = ScrapeJob::new(JobType::Page, Some("https://example.com".into()), json!({}));
    job.max_attempts = max_attempts;
    jobs.create(&job).await.unwrap()
}

#[tokio::test]
async fn test_worker_completes_job_and_publishes_events() {
    let s = setup(0, 3);
    let job = enqueue(&s.jobs, 3).await;

    let outcome = s.worker.process_next().await.unwrap();
    assert_eq!(outcome, Some(JobOutcome::Completed));

    let stored = s.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.progress, 100);
    assert_eq!(stored.result, Some(json!({ "attempt": 1 })));
    assert!(stored.error.is_none());
    assert!(stored.lease_token.is_none());

    let kinds: Vec<JobEventKind> = s.notifier.events.lock().await.iter().map(|e| e.kind).collect();
    assert_eq!(kinds.first(), Some(&JobEventKind::Start));
    assert_eq!(kinds.last(), Some(&JobEventKind::Complete));
    assert!(kinds.contains(&JobEventKind::Progress));

    assert_eq!(s.worker.process_next().await.unwrap(), None);
}

#[tokio::test]
async fn test_retryable_failure_is_retried_then_succeeds() {
    let s = setup(1, 3);
    let job = enqueue(&s.jobs, 3).await;

    assert_eq!(s.worker.process_next().await.unwrap(), Some(JobOutcome::RetryScheduled));
    let stored = s.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Running);
    assert_eq!(stored.attempt_count, 1);
    assert!(stored.lease_token.is_none());

    assert_eq!(s.worker.process_next().await.unwrap(), Some(JobOutcome::Completed));
    let stored = s.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.attempt_count, 2);
    assert_eq!(stored.result, Some(json!({ "attempt": 2 })));
}

#[tokio::test]
async fn test_attempts_are_bounded() {
    let s = setup(10, 2);
    let job = enqueue(&s.jobs, 2).await;

    assert_eq!(s.worker.process_next().await.unwrap(), Some(JobOutcome::RetryScheduled));
    assert_eq!(s.worker.process_next().await.unwrap(), Some(JobOutcome::Failed));
    assert_eq!(s.worker.process_next().await.unwrap(), None);

    let stored = s.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.attempt_count, 2);
    assert!(stored.result.is_none());
    assert!(stored.error.unwrap().contains("connection reset"));

    let events = s.notifier.events.lock().await;
    assert_eq!(events.last().map(|e| e.kind), Some(JobEventKind::Error));
}

#[tokio::test]
async fn test_cancelled_job_is_never_acquired() {
    let s = setup(0, 3);
    let job = enqueue(&s.jobs, 3).await;
    let cancelled = job.cancel().unwrap();
    assert!(s
        .jobs
        .transition(&cancelled, &[JobStatus::Pending, JobStatus::Running])
        .await
        .unwrap());

    assert_eq!(s.worker.process_next().await.unwrap(), None);
    assert!(s.notifier.events.lock().await.is_empty());
}

#[tokio::test]
async fn test_run_stops_on_shutdown_signal() {
    let jobs = Arc::new(InMemoryJobRepository::new());
    let handler = Arc::new(FlakyHandler {
        failures: 0,
        calls: AtomicUsize::new(0),
    });
    let executor = JobExecutor::new(
        jobs,
        HandlerRegistry::uniform(handler),
        Arc::new(RecordingNotifier::default()),
    );
    let (tx, rx) = watch::channel(false);
    let worker = JobWorker::new(executor, chrono::Duration::minutes(5), Duration::from_secs(60), rx);

    let handle = tokio::spawn(async move { worker.run().await });
    tx.send(true).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(matches!(result, Ok(Ok(Ok(())))));
}
