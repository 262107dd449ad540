// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use chrono::{Duration, Utc};
use harvestrs::domain::models::scrape_job::{
    JobStatus, JobType, ScrapeJob, ATTEMPTS_EXHAUSTED_MESSAGE,
};
use harvestrs::domain::models::target::{ScrapeFrequency, ScrapeTarget};
use harvestrs::domain::models::trend::{MergedTrend, TrendSource};
use harvestrs::domain::repositories::job_repository::{JobRepository, RepositoryError};
use harvestrs::domain::repositories::target_repository::TargetRepository;
use harvestrs::domain::repositories::trend_repository::TrendRepository;
use harvestrs::infrastructure::database::entities::scrape_job;
use harvestrs::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use harvestrs::infrastructure::repositories::target_repo_impl::TargetRepositoryImpl;
use harvestrs::infrastructure::repositories::trend_repo_impl::TrendRepositoryImpl;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, EntityTrait, Set};
use serde_json::json;
use uuid::Uuid;

/// 迁移后的内存 SQLite 数据库
async fn setup_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    Arc::new(db)
}

fn page_job(target: &str, priority: i32) -> ScrapeJob {
    let mut job = ScrapeJob::new(JobType::Page, Some(target.to_string()), json!({}));
    job.priority = priority;
    job
}

#[tokio::test]
async fn test_acquire_respects_priority_schedule_and_leases() {
    let repo = JobRepositoryImpl::new(setup_db().await);
    let low = repo.create(&page_job("https://low.example", 1)).await.unwrap();
    let high = repo.create(&page_job("https://high.example", 9)).await.unwrap();
    let mut delayed = page_job("https://later.example", 10);
    delayed.scheduled_at = Some((Utc::now() + Duration::hours(1)).into());
    repo.create(&delayed).await.unwrap();

    let worker = Uuid::new_v4();
    let first = repo
        .acquire_next(worker, Duration::minutes(5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id, high.id);
    assert_eq!(first.status, JobStatus::Running);
    assert_eq!(first.attempt_count, 1);
    assert_eq!(first.lease_token, Some(worker));

    let second = repo
        .acquire_next(worker, Duration::minutes(5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.id, low.id);

    // 延迟任务与持有有效租约的任务都不可领取
    assert!(repo
        .acquire_next(worker, Duration::minutes(5))
        .await
        .unwrap()
        .is_none());

    let stored = repo.find_by_id(high.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Running);
    assert_eq!(stored.attempt_count, 1);
}

#[tokio::test]
async fn test_expired_lease_is_reacquired() {
    let repo = JobRepositoryImpl::new(setup_db().await);
    let job = repo.create(&page_job("https://stalled.example", 5)).await.unwrap();

    let first = repo
        .acquire_next(Uuid::new_v4(), Duration::seconds(-1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id, job.id);

    let again = repo
        .acquire_next(Uuid::new_v4(), Duration::minutes(5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.id, job.id);
    assert_eq!(again.attempt_count, 2);
    assert_ne!(again.lease_token, first.lease_token);

    // 原持有者迟到的写回与续租都被拒绝
    let late = first.clone().complete(json!({ "worker": "first" })).unwrap();
    assert!(!repo.transition_leased(&late, first.lease_token).await.unwrap());
    assert!(!repo
        .renew_lease(job.id, first.lease_token.unwrap(), Utc::now() + Duration::minutes(5))
        .await
        .unwrap());

    assert!(repo
        .renew_lease(job.id, again.lease_token.unwrap(), Utc::now() + Duration::minutes(10))
        .await
        .unwrap());
    let done = again.clone().complete(json!({ "worker": "second" })).unwrap();
    assert!(repo.transition_leased(&done, again.lease_token).await.unwrap());

    let stored = repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.result, Some(json!({ "worker": "second" })));
}

#[tokio::test]
async fn test_stalled_job_on_last_attempt_is_failed() {
    let repo = JobRepositoryImpl::new(setup_db().await);
    let mut job = page_job("https://exhausted.example", 5);
    job.max_attempts = 1;
    repo.create(&job).await.unwrap();
    let waiting = repo.create(&page_job("https://waiting.example", 1)).await.unwrap();

    repo.acquire_next(Uuid::new_v4(), Duration::seconds(-1))
        .await
        .unwrap()
        .unwrap();

    // 用尽尝试的停滞任务被标记失败，领取继续到下一个任务
    let next = repo
        .acquire_next(Uuid::new_v4(), Duration::minutes(5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.id, waiting.id);

    let stored = repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.attempt_count, 1);
    assert_eq!(stored.error.as_deref(), Some(ATTEMPTS_EXHAUSTED_MESSAGE));
    assert!(stored.result.is_none());

    let stats = repo.count_by_status().await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.running, 1);
    assert_eq!(stats.total(), 2);
}

#[tokio::test]
async fn test_unreadable_row_is_reported_not_defaulted() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db.clone());
    let job = page_job("https://corrupt.example", 5);
    let mut row: scrape_job::ActiveModel = job.clone().into();
    row.status = Set("paused".to_string());
    row.insert(db.as_ref()).await.unwrap();

    let err = repo.find_by_id(job.id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidRecord { id, .. } if id == job.id));

    // 无法还原的待执行任务在领取时被标记失败，不会阻塞队列
    let queued = page_job("https://unknown-type.example", 5);
    let mut row: scrape_job::ActiveModel = queued.clone().into();
    row.job_type = Set("video".to_string());
    row.insert(db.as_ref()).await.unwrap();

    assert!(repo
        .acquire_next(Uuid::new_v4(), Duration::minutes(5))
        .await
        .unwrap()
        .is_none());
    let stored = scrape_job::Entity::find_by_id(queued.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, "failed");
    assert!(stored.error.unwrap().contains("video"));
}

#[tokio::test]
async fn test_transition_only_applies_from_expected_states() {
    let repo = JobRepositoryImpl::new(setup_db().await);
    let job = repo.create(&page_job("https://cas.example", 5)).await.unwrap();
    let running = repo
        .acquire_next(Uuid::new_v4(), Duration::minutes(5))
        .await
        .unwrap()
        .unwrap();

    let cancelled = running.clone().cancel().unwrap();
    assert!(repo
        .transition(&cancelled, &[JobStatus::Pending, JobStatus::Running])
        .await
        .unwrap());

    // 取消后完成结果被丢弃
    let completed = running.complete(json!({ "ok": true })).unwrap();
    assert!(!repo.transition(&completed, &[JobStatus::Running]).await.unwrap());

    let stored = repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Cancelled);
    assert_eq!(stored.error.as_deref(), Some("cancelled"));
    assert!(stored.result.is_none());
    assert_eq!(
        repo.find_by_status(JobStatus::Cancelled, 10).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_active_targets_and_cleanup() {
    let repo = JobRepositoryImpl::new(setup_db().await);
    let active = repo.create(&page_job("https://busy.example", 5)).await.unwrap();
    assert!(repo.has_active_for_target("https://busy.example").await.unwrap());
    assert!(!repo.has_active_for_target("https://idle.example").await.unwrap());

    let mut old = page_job("https://old.example", 5).cancel().unwrap();
    old.completed_at = Some((Utc::now() - Duration::days(40)).into());
    repo.create(&old).await.unwrap();
    let recent = repo
        .create(&page_job("https://recent.example", 5).cancel().unwrap())
        .await
        .unwrap();

    let removed = repo
        .delete_finished_before(Utc::now() - Duration::days(30))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(repo.find_by_id(old.id).await.unwrap().is_none());
    assert!(repo.find_by_id(recent.id).await.unwrap().is_some());
    assert!(repo.find_by_id(active.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_overdue_targets() {
    let repo = TargetRepositoryImpl::new(setup_db().await);
    let never = ScrapeTarget::new("https://never.example", JobType::Page, ScrapeFrequency::Daily);
    let mut fresh = ScrapeTarget::new("https://fresh.example", JobType::Page, ScrapeFrequency::Daily);
    fresh.last_scraped_at = Some(Utc::now().into());
    let mut inactive =
        ScrapeTarget::new("https://off.example", JobType::Page, ScrapeFrequency::Daily);
    inactive.active = false;
    let weekly =
        ScrapeTarget::new("https://weekly.example", JobType::Content, ScrapeFrequency::Weekly);
    for target in [&never, &fresh, &inactive, &weekly] {
        repo.create(target).await.unwrap();
    }

    let cutoff = Utc::now() - Duration::days(1);
    let due = repo
        .find_overdue(ScrapeFrequency::Daily, cutoff, 10)
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, never.id);

    repo.mark_scraped(never.id, Utc::now()).await.unwrap();
    assert!(repo
        .find_overdue(ScrapeFrequency::Daily, cutoff, 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_hot_keywords_aggregate_popularity() {
    let repo = TrendRepositoryImpl::new(setup_db().await);
    let trend = |keyword: &str, popularity: f64| MergedTrend {
        keyword: keyword.to_string(),
        sources: vec![TrendSource::Google],
        count: 1,
        avg_score: popularity,
        popularity,
    };

    repo.record(&[trend("Rust", 40.0), trend("Go", 50.0)])
        .await
        .unwrap();
    repo.record(&[trend("rust", 30.0)]).await.unwrap();

    let hot = repo
        .hot_keywords(Utc::now() - Duration::hours(24), 10)
        .await
        .unwrap();
    assert_eq!(hot.len(), 2);
    assert_eq!(hot[0].keyword, "rust");
    assert_eq!(hot[0].score, 70.0);
    assert_eq!(hot[1].keyword, "go");

    let top = repo
        .hot_keywords(Utc::now() - Duration::hours(24), 1)
        .await
        .unwrap();
    assert_eq!(top.len(), 1);
}
