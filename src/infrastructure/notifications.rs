// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::services::notification_service::{JobEvent, NotificationPublisher};
use crate::infrastructure::cache::redis_client::RedisClient;

/// 通过 Redis 发布订阅推送任务事件
pub struct RedisNotificationPublisher {
    redis: Arc<RedisClient>,
}

impl RedisNotificationPublisher {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl NotificationPublisher for RedisNotificationPublisher {
    async fn publish(&self, channel: &str, event: &JobEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize event for job {}: {}", event.job_id, e);
                return;
            }
        };
        if let Err(e) = self.redis.publish(channel, &payload).await {
            warn!(
                "Failed to publish {:?} event for job {}: {}",
                event.kind, event.job_id, e
            );
        }
    }
}

/// 没有 Redis 时只把事件写入日志
pub struct LogNotificationPublisher;

#[async_trait]
impl NotificationPublisher for LogNotificationPublisher {
    async fn publish(&self, channel: &str, event: &JobEvent) {
        debug!(
            channel,
            job_id = %event.job_id,
            kind = ?event.kind,
            progress = ?event.progress,
            "Job event"
        );
    }
}
