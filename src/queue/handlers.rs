// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 任务类型处理器
//!
//! 每个任务类型对应一个处理器，注册表用穷尽匹配分派，
//! 新增任务类型时编译器会要求同时注册处理器。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::models::scrape_job::{JobType, ScrapeJob};
use crate::domain::repositories::trend_repository::TrendRepository;
use crate::extractors::assets::AssetExtractor;
use crate::extractors::content::ContentExtractor;
use crate::extractors::page::extract_page;
use crate::extractors::trends::TrendExtractor;
use crate::extractors::PageFetcher;
use crate::utils::errors::ScrapeError;

/// 导航完成后的进度
pub const PROGRESS_NAVIGATED: u8 = 20;
/// 字段抽取完成后的进度
pub const PROGRESS_EXTRACTED: u8 = 80;
/// 增强步骤完成后的进度
pub const PROGRESS_ENRICHED: u8 = 90;

/// 进度上报
///
/// 仅供观察，不影响任何控制决策。
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: u8);
}

/// 丢弃进度
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn report(&self, _progress: u8) {}
}

/// 任务处理器
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// 执行任务并返回结果负载
    async fn handle(&self, job: &ScrapeJob, progress: &dyn ProgressSink) -> Result<Value, ScrapeError>;
}

fn to_payload<T: Serialize>(result: &T) -> Result<Value, ScrapeError> {
    serde_json::to_value(result)
        .map_err(|e| ScrapeError::Extraction(format!("Failed to serialize result: {}", e)))
}

fn require_target(job: &ScrapeJob) -> Result<&str, ScrapeError> {
    job.target
        .as_deref()
        .ok_or_else(|| ScrapeError::Validation(format!("{} job {} has no target", job.job_type, job.id)))
}

/// 网站页面处理器
pub struct PageHandler {
    fetcher: Arc<PageFetcher>,
}

impl PageHandler {
    pub fn new(fetcher: Arc<PageFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl JobHandler for PageHandler {
    async fn handle(&self, job: &ScrapeJob, progress: &dyn ProgressSink) -> Result<Value, ScrapeError> {
        let url = require_target(job)?;
        let page = self.fetcher.fetch(url, &job.options).await?;
        progress.report(PROGRESS_NAVIGATED).await;

        let result = tokio::task::spawn_blocking(move || extract_page(&page.html, &page.url))
            .await
            .map_err(|e| ScrapeError::Extraction(format!("Page extraction panicked: {}", e)))?;
        progress.report(PROGRESS_EXTRACTED).await;
        info!(
            "Page scrape completed for {}: {} links, {} images",
            url,
            result.links.len(),
            result.images.len()
        );
        to_payload(&result)
    }
}

/// 文章内容处理器
pub struct ContentHandler {
    extractor: Arc<ContentExtractor>,
}

impl ContentHandler {
    pub fn new(extractor: Arc<ContentExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl JobHandler for ContentHandler {
    async fn handle(&self, job: &ScrapeJob, progress: &dyn ProgressSink) -> Result<Value, ScrapeError> {
        let url = require_target(job)?;
        let page = self.extractor.fetcher().fetch(url, &job.options).await?;
        progress.report(PROGRESS_NAVIGATED).await;

        let mut result = self.extractor.parse(page).await?;
        progress.report(PROGRESS_EXTRACTED).await;

        if self.extractor.enrich(&mut result).await {
            progress.report(PROGRESS_ENRICHED).await;
        }
        info!(
            "Content scrape completed for {}: {} words",
            url, result.word_count
        );
        to_payload(&result)
    }
}

/// 资源发现处理器
pub struct AssetHandler {
    extractor: Arc<AssetExtractor>,
}

impl AssetHandler {
    pub fn new(extractor: Arc<AssetExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl JobHandler for AssetHandler {
    async fn handle(&self, job: &ScrapeJob, progress: &dyn ProgressSink) -> Result<Value, ScrapeError> {
        let url = require_target(job)?;
        let page = self.extractor.fetcher().fetch(url, &job.options).await?;
        progress.report(PROGRESS_NAVIGATED).await;

        let result = self
            .extractor
            .extract_loaded(&page.html, &page.url, &job.options)
            .await?;
        progress.report(PROGRESS_EXTRACTED).await;
        to_payload(&result)
    }
}

/// 趋势监控处理器
///
/// 合并结果写入趋势仓库，供每小时的趋势扫描选出热门关键词。
pub struct TrendHandler {
    extractor: Arc<TrendExtractor>,
    trends: Arc<dyn TrendRepository>,
}

impl TrendHandler {
    pub fn new(extractor: Arc<TrendExtractor>, trends: Arc<dyn TrendRepository>) -> Self {
        Self { extractor, trends }
    }
}

#[async_trait]
impl JobHandler for TrendHandler {
    async fn handle(&self, job: &ScrapeJob, progress: &dyn ProgressSink) -> Result<Value, ScrapeError> {
        progress.report(PROGRESS_NAVIGATED).await;
        let result = self.extractor.extract(&job.options).await?;
        progress.report(PROGRESS_EXTRACTED).await;

        match self.trends.record(&result.trends).await {
            Ok(()) => progress.report(PROGRESS_ENRICHED).await,
            Err(e) => warn!("Failed to record trends for job {}: {}", job.id, e),
        }
        info!(
            "Trend monitoring completed: {} keywords from {} sources",
            result.trends.len(),
            result.sources.len()
        );
        to_payload(&result)
    }
}

/// 处理器注册表
#[derive(Clone)]
pub struct HandlerRegistry {
    page: Arc<dyn JobHandler>,
    content: Arc<dyn JobHandler>,
    assets: Arc<dyn JobHandler>,
    trends: Arc<dyn JobHandler>,
}

impl HandlerRegistry {
    pub fn new(
        page: Arc<dyn JobHandler>,
        content: Arc<dyn JobHandler>,
        assets: Arc<dyn JobHandler>,
        trends: Arc<dyn JobHandler>,
    ) -> Self {
        Self {
            page,
            content,
            assets,
            trends,
        }
    }

    /// 每个任务类型使用同一个处理器（测试用）
    pub fn uniform(handler: Arc<dyn JobHandler>) -> Self {
        Self::new(handler.clone(), handler.clone(), handler.clone(), handler)
    }

    pub fn handler_for(&self, job_type: JobType) -> &Arc<dyn JobHandler> {
        match job_type {
            JobType::Page => &self.page,
            JobType::Content => &self.content,
            JobType::AssetDiscovery => &self.assets,
            JobType::TrendMonitoring => &self.trends,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Named(&'static str);

    #[async_trait]
    impl JobHandler for Named {
        async fn handle(&self, _job: &ScrapeJob, progress: &dyn ProgressSink) -> Result<Value, ScrapeError> {
            progress.report(50).await;
            Ok(json!({ "handler": self.0 }))
        }
    }

    #[tokio::test]
    async fn test_registry_dispatches_by_type() {
        let registry = HandlerRegistry::new(
            Arc::new(Named("page")),
            Arc::new(Named("content")),
            Arc::new(Named("assets")),
            Arc::new(Named("trends")),
        );
        for (job_type, expected) in [
            (JobType::Page, "page"),
            (JobType::Content, "content"),
            (JobType::AssetDiscovery, "assets"),
            (JobType::TrendMonitoring, "trends"),
        ] {
            let job = ScrapeJob::new(job_type, None, json!({}));
            let result = registry
                .handler_for(job_type)
                .handle(&job, &NoProgress)
                .await
                .unwrap();
            assert_eq!(result["handler"], expected);
        }
    }

    #[test]
    fn test_missing_target_is_validation_error() {
        let job = ScrapeJob::new(JobType::Page, None, json!({}));
        assert!(matches!(require_target(&job), Err(ScrapeError::Validation(_))));
    }
}
