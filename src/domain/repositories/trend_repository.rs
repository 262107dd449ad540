// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::job_repository::RepositoryError;
use crate::domain::models::trend::{HotKeyword, MergedTrend};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 趋势关键词仓库特质
#[async_trait]
pub trait TrendRepository: Send + Sync {
    /// 记录一次趋势监控的合并结果
    async fn record(&self, trends: &[MergedTrend]) -> Result<(), RepositoryError>;

    /// 查询热门关键词
    ///
    /// 统计 `since` 之后记录的趋势，按累计热度降序返回前 `limit` 个。
    async fn hot_keywords(
        &self,
        since: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<HotKeyword>, RepositoryError>;
}
