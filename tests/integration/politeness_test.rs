// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use harvestrs::config::settings::BrowserSettings;
use harvestrs::extractors::PageFetcher;
use harvestrs::utils::errors::ScrapeError;
use harvestrs::utils::robots::{HttpRobotsSource, RobotsSource};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::helpers::{policy_store, StaticPageLoader};

const ROBOTS: &str = "\
User-agent: *
Disallow: /private/
Crawl-delay: 5

User-agent: harvestrs-bot
Disallow: /admin/
";

/// 固定内容的 robots 来源，记录获取次数
struct FixedRobots {
    content: &'static str,
    fetches: AtomicUsize,
}

#[async_trait]
impl RobotsSource for FixedRobots {
    async fn fetch(&self, _domain: &str) -> Result<Option<String>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.content.to_string()))
    }
}

fn http_source() -> Arc<HttpRobotsSource> {
    Arc::new(
        HttpRobotsSource::new(Duration::from_secs(5), "harvestrs-bot")
            .unwrap()
            .with_scheme("http"),
    )
}

/// 通过 HTTP 获取 robots.txt，专属分组优先于通配分组
#[tokio::test]
async fn test_robots_rules_are_fetched_and_applied() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ROBOTS))
        .expect(1)
        .mount(&server)
        .await;

    let store = policy_store(http_source(), Duration::ZERO);
    let base = server.uri();

    assert!(matches!(
        store.admit(&format!("{}/admin/panel", base)).await,
        Err(ScrapeError::RobotsDisallowed(_))
    ));
    // 专属分组没有排除 /private/
    assert!(store.admit(&format!("{}/private/page", base)).await.is_ok());
    assert!(store.admit(&format!("{}/", base)).await.is_ok());
}

/// 站点没有 robots.txt 时全部允许
#[tokio::test]
async fn test_missing_robots_allows_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = policy_store(http_source(), Duration::ZERO);
    let policy = store.fetch_robots(&server.address().to_string()).await;

    assert!(policy.disallowed_paths.is_empty());
    assert!(store
        .admit(&format!("{}/anything", server.uri()))
        .await
        .is_ok());
}

/// 被排除的页面不会交给浏览器加载
#[tokio::test]
async fn test_fetcher_refuses_disallowed_pages() {
    let source = Arc::new(FixedRobots {
        content: ROBOTS,
        fetches: AtomicUsize::new(0),
    });
    let loader = StaticPageLoader::default().with_page("https://site.example/admin/x", "<html></html>");
    let fetcher = PageFetcher::new(
        Arc::new(loader),
        policy_store(source.clone(), Duration::ZERO),
        &BrowserSettings::default(),
    );

    let result = fetcher.fetch("https://site.example/admin/x", &json!({})).await;

    match result {
        Err(e @ ScrapeError::RobotsDisallowed(_)) => assert!(!e.is_retryable()),
        other => panic!("expected robots refusal, got {:?}", other),
    }
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
}

/// Crawl-delay 决定同域请求间隔，不同域名互不影响
#[tokio::test(start_paused = true)]
async fn test_crawl_delay_spaces_requests() {
    const WILDCARD_ONLY: &str = "User-agent: *\nCrawl-delay: 5\n";
    let source = Arc::new(FixedRobots {
        content: WILDCARD_ONLY,
        fetches: AtomicUsize::new(0),
    });
    let store = policy_store(source.clone(), Duration::from_secs(1));

    let start = tokio::time::Instant::now();
    store.admit("https://a.example/1").await.unwrap();
    store.admit("https://b.example/1").await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));

    store.admit("https://a.example/2").await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(5));

    store.admit("https://a.example/3").await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(10));

    // 规则按域名缓存
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
}
