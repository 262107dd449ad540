// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::job_repository::RepositoryError;
use crate::domain::models::target::{ScrapeFrequency, ScrapeTarget};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 抓取目标仓库特质
#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// 保存目标
    async fn create(&self, target: &ScrapeTarget) -> Result<ScrapeTarget, RepositoryError>;

    /// 查找过期目标
    ///
    /// 返回指定频率下从未抓取，或上次抓取早于 `cutoff` 的活跃目标。
    async fn find_overdue(
        &self,
        frequency: ScrapeFrequency,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<ScrapeTarget>, RepositoryError>;

    /// 记录抓取时间
    async fn mark_scraped(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError>;
}
