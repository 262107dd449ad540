// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 趋势信号抽取
//!
//! 各来源独立抓取并打分，随后按关键词合并。单个来源失败只会被记录，
//! 不影响其他来源。

pub mod google;
pub mod merge;
pub mod news;
pub mod reddit;
pub mod twitter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::settings::TrendSettings;
use crate::domain::models::trend::{TrendEntry, TrendResult, TrendSource};
use crate::utils::errors::ScrapeError;

pub use merge::{merge_trends, round_to};

/// 趋势 HTTP 请求使用的 User-Agent
pub const TREND_USER_AGENT: &str = concat!("harvestrs/", env!("CARGO_PKG_VERSION"));

/// 搜索兴趣的时间范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    OneHour,
    FourHours,
    OneDay,
    SevenDays,
    ThirtyDays,
    NinetyDays,
    OneYear,
}

impl Timeframe {
    pub fn parse(raw: &str) -> Result<Self, ScrapeError> {
        match raw {
            "1h" => Ok(Timeframe::OneHour),
            "4h" => Ok(Timeframe::FourHours),
            "1d" => Ok(Timeframe::OneDay),
            "7d" => Ok(Timeframe::SevenDays),
            "30d" => Ok(Timeframe::ThirtyDays),
            "90d" => Ok(Timeframe::NinetyDays),
            "1y" => Ok(Timeframe::OneYear),
            other => Err(ScrapeError::Validation(format!(
                "Unsupported trend timeframe: {}",
                other
            ))),
        }
    }

    /// 搜索兴趣接口使用的时间表达式
    pub fn as_query(&self) -> &'static str {
        match self {
            Timeframe::OneHour => "now 1-H",
            Timeframe::FourHours => "now 4-H",
            Timeframe::OneDay => "now 1-d",
            Timeframe::SevenDays => "now 7-d",
            Timeframe::ThirtyDays => "today 1-m",
            Timeframe::NinetyDays => "today 3-m",
            Timeframe::OneYear => "today 12-m",
        }
    }
}

/// 趋势任务选项
#[derive(Debug, Clone, PartialEq)]
pub struct TrendOptions {
    pub keywords: Vec<String>,
    pub sources: Vec<TrendSource>,
    pub timeframe: Timeframe,
    pub geo: String,
    pub subreddits: Vec<String>,
    pub limit: usize,
    pub country: String,
    pub category: String,
    /// 热门话题地区
    pub woeid: u64,
}

fn string_list(options: &Value, key: &str) -> Vec<String> {
    match options.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) if !single.trim().is_empty() => vec![single.trim().to_string()],
        _ => Vec::new(),
    }
}

fn string_option(options: &Value, key: &str, default: &str) -> String {
    options
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

impl TrendOptions {
    /// 读取任务选项
    ///
    /// # 错误
    ///
    /// 未知来源或时间范围返回 `ScrapeError::Validation`
    pub fn from_options(options: &Value, settings: &TrendSettings) -> Result<Self, ScrapeError> {
        let mut keywords = string_list(options, "keywords");
        keywords.extend(string_list(options, "keyword"));

        let raw_sources = match string_list(options, "sources") {
            list if list.is_empty() => settings.default_sources.clone(),
            list => list,
        };
        let mut sources = Vec::new();
        for raw in raw_sources {
            let source: TrendSource = raw
                .parse()
                .map_err(|e| ScrapeError::Validation(format!("{}", e)))?;
            if !sources.contains(&source) {
                sources.push(source);
            }
        }

        let subreddits = match string_list(options, "subreddits") {
            list if list.is_empty() => vec!["all".to_string()],
            list => list,
        };

        Ok(Self {
            keywords,
            sources,
            timeframe: Timeframe::parse(&string_option(options, "timeframe", "7d"))?,
            geo: string_option(options, "geo", "US"),
            subreddits,
            limit: options
                .get("limit")
                .and_then(Value::as_u64)
                .map(|l| l.clamp(1, 100) as usize)
                .unwrap_or(25),
            country: string_option(options, "country", "us"),
            category: string_option(options, "category", "general"),
            woeid: options
                .get("woeid")
                .and_then(Value::as_u64)
                .unwrap_or(settings.twitter_woeid),
        })
    }
}

/// 趋势信号来源
#[async_trait]
pub trait TrendCollector: Send + Sync {
    fn source(&self) -> TrendSource;

    /// 抓取并打分
    async fn collect(&self, options: &TrendOptions) -> Result<Vec<TrendEntry>, ScrapeError>;
}

/// 构建趋势来源共用的 HTTP 客户端
pub fn trend_client(settings: &TrendSettings) -> Result<Client, ScrapeError> {
    Client::builder()
        .timeout(Duration::from_millis(settings.request_timeout_ms))
        .user_agent(TREND_USER_AGENT)
        .build()
        .map_err(|e| ScrapeError::Validation(format!("Failed to build HTTP client: {}", e)))
}

/// 趋势抽取器
pub struct TrendExtractor {
    collectors: Vec<Arc<dyn TrendCollector>>,
    settings: TrendSettings,
}

impl TrendExtractor {
    pub fn new(collectors: Vec<Arc<dyn TrendCollector>>, settings: TrendSettings) -> Self {
        Self {
            collectors,
            settings,
        }
    }

    /// 使用 google、reddit、news、twitter 四个 HTTP 来源
    pub fn from_settings(settings: TrendSettings) -> Result<Self, ScrapeError> {
        let client = trend_client(&settings)?;
        let collectors: Vec<Arc<dyn TrendCollector>> = vec![
            Arc::new(google::GoogleTrendsCollector::new(client.clone(), &settings)),
            Arc::new(reddit::RedditCollector::new(client.clone(), &settings)),
            Arc::new(news::NewsCollector::new(client.clone(), &settings)),
            Arc::new(twitter::TwitterCollector::new(client, &settings)),
        ];
        Ok(Self::new(collectors, settings))
    }

    /// 抓取并合并趋势
    ///
    /// 来源依次执行；失败的来源写入 `failed_sources`，合并只使用成功的来源。
    /// 所有来源都失败时返回空的趋势列表。
    ///
    /// # 错误
    ///
    /// 选项非法时返回 `ScrapeError::Validation`
    pub async fn extract(&self, options: &Value) -> Result<TrendResult, ScrapeError> {
        let trend_options = TrendOptions::from_options(options, &self.settings)?;
        let mut entries = Vec::new();
        let mut failed_sources = Vec::new();

        for source in &trend_options.sources {
            let Some(collector) = self.collectors.iter().find(|c| c.source() == *source) else {
                warn!("No collector registered for trend source {}", source);
                failed_sources.push(source.to_string());
                continue;
            };
            match collector.collect(&trend_options).await {
                Ok(found) => {
                    info!("Trend source {} produced {} entries", source, found.len());
                    entries.extend(found);
                }
                Err(e) => {
                    warn!("Trend source {} failed: {}", source, e);
                    failed_sources.push(source.to_string());
                }
            }
        }

        if !failed_sources.is_empty() && failed_sources.len() == trend_options.sources.len() {
            warn!("Every trend source failed: {}", failed_sources.join(", "));
        }

        Ok(TrendResult {
            trends: merge_trends(&entries),
            entries,
            sources: trend_options.sources,
            failed_sources,
            scraped_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedCollector {
        source: TrendSource,
        entries: Result<Vec<TrendEntry>, ScrapeError>,
    }

    #[async_trait]
    impl TrendCollector for FixedCollector {
        fn source(&self) -> TrendSource {
            self.source
        }

        async fn collect(&self, _options: &TrendOptions) -> Result<Vec<TrendEntry>, ScrapeError> {
            self.entries.clone()
        }
    }

    fn extractor(google: Result<Vec<TrendEntry>, ScrapeError>) -> TrendExtractor {
        TrendExtractor::new(
            vec![
                Arc::new(FixedCollector {
                    source: TrendSource::Google,
                    entries: google,
                }),
                Arc::new(FixedCollector {
                    source: TrendSource::Reddit,
                    entries: Ok(vec![TrendEntry::new("ai", TrendSource::Reddit, 5.0)]),
                }),
            ],
            TrendSettings::default(),
        )
    }

    #[test]
    fn test_options_defaults() {
        let options = TrendOptions::from_options(&json!({}), &TrendSettings::default()).unwrap();
        assert_eq!(options.sources, vec![TrendSource::Google]);
        assert_eq!(options.timeframe, Timeframe::SevenDays);
        assert_eq!(options.subreddits, vec!["all"]);
        assert_eq!(options.limit, 25);
        assert_eq!(options.geo, "US");

        let options = TrendOptions::from_options(
            &json!({"keywords": ["rust", " "], "keyword": "tokio", "sources": ["google_trends", "reddit", "google"], "limit": 500}),
            &TrendSettings::default(),
        )
        .unwrap();
        assert_eq!(options.keywords, vec!["rust", "tokio"]);
        assert_eq!(options.sources, vec![TrendSource::Google, TrendSource::Reddit]);
        assert_eq!(options.limit, 100);
    }

    #[test]
    fn test_options_reject_unknown_values() {
        let settings = TrendSettings::default();
        assert!(matches!(
            TrendOptions::from_options(&json!({"sources": ["myspace"]}), &settings),
            Err(ScrapeError::Validation(_))
        ));
        assert!(matches!(
            TrendOptions::from_options(&json!({"timeframe": "2w"}), &settings),
            Err(ScrapeError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_partial_source_failure_is_recorded() {
        let extractor = extractor(Err(ScrapeError::download("https://trends.test", "HTTP 500")));
        let result = extractor
            .extract(&json!({"sources": ["google", "reddit"]}))
            .await
            .unwrap();
        assert_eq!(result.failed_sources, vec!["google"]);
        assert_eq!(result.trends.len(), 1);
        assert_eq!(result.trends[0].keyword, "ai");
    }

    #[tokio::test]
    async fn test_merges_across_sources() {
        let extractor = extractor(Ok(vec![TrendEntry::new("AI", TrendSource::Google, 10.0)]));
        let result = extractor
            .extract(&json!({"sources": ["google", "reddit"]}))
            .await
            .unwrap();
        assert!(result.failed_sources.is_empty());
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.trends[0].popularity, 15.0);
    }

    #[tokio::test]
    async fn test_all_sources_failing_yields_empty_result() {
        let extractor = extractor(Err(ScrapeError::download("https://trends.test", "HTTP 500")));
        let result = extractor
            .extract(&json!({"sources": ["google"]}))
            .await
            .unwrap();
        assert!(result.trends.is_empty());
        assert!(result.entries.is_empty());
        assert_eq!(result.failed_sources, vec!["google"]);
    }
}
