// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum_test::TestServer;
use harvestrs::config::settings::{AssetSettings, BrowserSettings, QueueSettings, TrendSettings};
use harvestrs::domain::repositories::trend_repository::TrendRepository;
use harvestrs::domain::services::notification_service::{JobEvent, NotificationPublisher};
use harvestrs::engines::browser_session::{LoadedPage, NavigateOptions, PageLoader};
use harvestrs::extractors::assets::media::AssetDownloader;
use harvestrs::extractors::assets::AssetExtractor;
use harvestrs::extractors::content::ContentExtractor;
use harvestrs::extractors::trends::TrendExtractor;
use harvestrs::extractors::PageFetcher;
use harvestrs::infrastructure::repositories::memory::{InMemoryJobRepository, InMemoryTrendRepository};
use harvestrs::infrastructure::storage::InMemoryStorage;
use harvestrs::presentation::routes;
use harvestrs::queue::direct_runner::DirectJobRunner;
use harvestrs::queue::executor::JobExecutor;
use harvestrs::queue::handlers::{
    AssetHandler, ContentHandler, HandlerRegistry, PageHandler, TrendHandler,
};
use harvestrs::queue::runner::JobRunner;
use harvestrs::utils::errors::ScrapeError;
use harvestrs::utils::robots::{DomainPolicyStore, RobotsSource};
use tokio::sync::Mutex;

pub const ARTICLE_URL: &str = "https://blog.example.com/posts/hello";

pub const ARTICLE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Hello Harvest</title>
  <meta name="description" content="A short post">
  <meta name="author" content="Ada">
  <meta property="article:published_time" content="2025-03-01T10:00:00Z">
</head>
<body>
  <nav><a href="/">Home</a></nav>
  <article>
    <h1>Hello Harvest</h1>
    <p>Harvesting structured content from the web takes patience and care.</p>
    <p>Each page is loaded once and parsed into a stable result.</p>
    <img src="/img/cover.jpg" alt="Cover" width="800" height="600">
    <a href="https://other.example.org/ref">Reference</a>
  </article>
</body>
</html>"#;

/// 按 URL 返回固定 HTML 的页面加载器，未知 URL 视为无法解析
#[derive(Default)]
pub struct StaticPageLoader {
    pages: HashMap<String, String>,
}

impl StaticPageLoader {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

#[async_trait]
impl PageLoader for StaticPageLoader {
    async fn load(&self, url: &str, _options: &NavigateOptions) -> Result<LoadedPage, ScrapeError> {
        match self.pages.get(url) {
            Some(html) => Ok(LoadedPage {
                url: url.to_string(),
                status: 200,
                html: html.clone(),
            }),
            None => Err(ScrapeError::navigation(url, "net::ERR_NAME_NOT_RESOLVED")),
        }
    }
}

/// 所有站点都没有 robots.txt
pub struct NoRobots;

#[async_trait]
impl RobotsSource for NoRobots {
    async fn fetch(&self, _domain: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<JobEvent>>,
}

#[async_trait]
impl NotificationPublisher for RecordingNotifier {
    async fn publish(&self, _channel: &str, event: &JobEvent) {
        self.events.lock().await.push(event.clone());
    }
}

pub fn policy_store(source: Arc<dyn RobotsSource>, interval: Duration) -> Arc<DomainPolicyStore> {
    Arc::new(DomainPolicyStore::new(
        source,
        "harvestrs-bot",
        interval,
        Duration::from_secs(3600),
    ))
}

pub fn fetcher(loader: StaticPageLoader) -> Arc<PageFetcher> {
    Arc::new(PageFetcher::new(
        Arc::new(loader),
        policy_store(Arc::new(NoRobots), Duration::ZERO),
        &BrowserSettings::default(),
    ))
}

/// 使用静态页面与指定趋势来源构建全部处理器
pub fn registry(
    loader: StaticPageLoader,
    trend_settings: TrendSettings,
    trends: Arc<dyn TrendRepository>,
) -> HandlerRegistry {
    let fetcher = fetcher(loader);
    let storage = Arc::new(InMemoryStorage::new());
    let downloader = Arc::new(
        AssetDownloader::new(AssetSettings::default(), storage).expect("downloader"),
    );
    let trend_extractor = TrendExtractor::from_settings(trend_settings).expect("trend extractor");

    HandlerRegistry::new(
        Arc::new(PageHandler::new(fetcher.clone())),
        Arc::new(ContentHandler::new(Arc::new(ContentExtractor::new(fetcher.clone())))),
        Arc::new(AssetHandler::new(Arc::new(AssetExtractor::new(
            fetcher,
            downloader,
            AssetSettings::default(),
        )))),
        Arc::new(TrendHandler::new(Arc::new(trend_extractor), trends)),
    )
}

pub struct TestApp {
    pub server: TestServer,
    pub runner: Arc<dyn JobRunner>,
    pub jobs: Arc<InMemoryJobRepository>,
    pub trends: Arc<InMemoryTrendRepository>,
    pub notifier: Arc<RecordingNotifier>,
}

/// 直接执行策略下的完整应用
pub fn create_direct_app(loader: StaticPageLoader, trend_settings: TrendSettings) -> TestApp {
    let jobs = Arc::new(InMemoryJobRepository::new());
    let trends = Arc::new(InMemoryTrendRepository::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let executor = JobExecutor::new(
        jobs.clone(),
        registry(loader, trend_settings, trends.clone()),
        notifier.clone(),
    );
    let runner: Arc<dyn JobRunner> =
        Arc::new(DirectJobRunner::new(executor, QueueSettings::default()));
    let server = TestServer::new(routes::routes(runner.clone())).expect("test server");

    TestApp {
        server,
        runner,
        jobs,
        trends,
        notifier,
    }
}

pub fn article_app() -> TestApp {
    create_direct_app(
        StaticPageLoader::default().with_page(ARTICLE_URL, ARTICLE_HTML),
        TrendSettings::default(),
    )
}
