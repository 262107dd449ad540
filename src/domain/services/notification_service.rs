// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scrape_job::{JobType, ScrapeJob};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 抓取事件的发布频道
pub const SCRAPING_CHANNEL: &str = "scraping";

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Start,
    Progress,
    Complete,
    Error,
}

/// 任务事件负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    #[serde(rename = "type")]
    pub kind: JobEventKind,
    pub job_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub job_type: JobType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    fn base(kind: JobEventKind, job: &ScrapeJob) -> Self {
        Self {
            kind,
            job_id: job.id,
            user_id: job.user_id,
            job_type: job.job_type,
            progress: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn start(job: &ScrapeJob) -> Self {
        Self::base(JobEventKind::Start, job)
    }

    pub fn progress(job: &ScrapeJob) -> Self {
        Self {
            progress: Some(job.progress),
            ..Self::base(JobEventKind::Progress, job)
        }
    }

    pub fn complete(job: &ScrapeJob) -> Self {
        Self {
            progress: Some(100),
            ..Self::base(JobEventKind::Complete, job)
        }
    }

    pub fn error(job: &ScrapeJob) -> Self {
        Self {
            error: job.error.clone(),
            ..Self::base(JobEventKind::Error, job)
        }
    }
}

/// 通知发布者
///
/// 发出即忘，调用方不依赖送达确认。实现应自行记录失败。
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, channel: &str, event: &JobEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_payload_shape() {
        let mut job = ScrapeJob::new(JobType::Content, Some("https://a.com".into()), json!({}));
        job.user_id = Some(Uuid::new_v4());
        let value = serde_json::to_value(JobEvent::start(&job)).unwrap();

        assert_eq!(value["type"], "start");
        assert_eq!(value["jobType"], "content");
        assert_eq!(value["jobId"], job.id.to_string());
        assert!(value.get("progress").is_none());
        assert!(value.get("error").is_none());
    }
}
