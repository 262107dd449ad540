// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{round_to, TrendCollector, TrendOptions};
use crate::config::settings::TrendSettings;
use crate::domain::models::trend::{TrendEntry, TrendSource};
use crate::utils::errors::ScrapeError;

#[derive(Debug, Deserialize)]
struct Headlines {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

/// 新闻头条
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
    pub author: Option<String>,
    source: Option<ArticleSource>,
}

/// 头条打分
///
/// `recency = max(0, 100 - age_h*2)`，`length = min(100, 标题长度*2)`，
/// 分数为 `recency*0.7 + length*0.3`，保留两位小数。发布时间无法解析时
/// `recency` 记为 0。
pub fn score_article(title: &str, published_at: Option<&str>, now: DateTime<Utc>) -> f64 {
    let recency = published_at
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|published| {
            let age_hours = (now - published.with_timezone(&Utc)).num_milliseconds() as f64 / 3_600_000.0;
            (100.0 - age_hours * 2.0).max(0.0)
        })
        .unwrap_or(0.0);
    let length = (title.chars().count() as f64 * 2.0).min(100.0);
    round_to(recency * 0.7 + length * 0.3, 2)
}

/// 新闻头条采集器
///
/// 没有配置接口密钥时不产生条目。
pub struct NewsCollector {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NewsCollector {
    pub fn new(client: Client, settings: &TrendSettings) -> Self {
        Self {
            client,
            base_url: settings.news_base_url.trim_end_matches('/').to_string(),
            api_key: settings.news_api_key.clone().filter(|k| !k.is_empty()),
        }
    }
}

#[async_trait]
impl TrendCollector for NewsCollector {
    fn source(&self) -> TrendSource {
        TrendSource::News
    }

    async fn collect(&self, options: &TrendOptions) -> Result<Vec<TrendEntry>, ScrapeError> {
        let Some(api_key) = &self.api_key else {
            debug!("News API key not configured, skipping headlines");
            return Ok(Vec::new());
        };

        let url = format!("{}/v2/top-headlines", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", api_key)
            .query(&[
                ("country", options.country.clone()),
                ("category", options.category.clone()),
                ("pageSize", options.limit.min(100).to_string()),
            ])
            .send()
            .await
            .map_err(|e| ScrapeError::download(&url, e))?;
        if !response.status().is_success() {
            return Err(ScrapeError::download(
                &url,
                format!("HTTP {}", response.status().as_u16()),
            ));
        }
        let headlines: Headlines = response
            .json()
            .await
            .map_err(|e| ScrapeError::Extraction(format!("Malformed headlines from {}: {}", url, e)))?;

        let now = Utc::now();
        Ok(headlines
            .articles
            .into_iter()
            .filter_map(|a| {
                let title = a.title.filter(|t| !t.trim().is_empty())?;
                let score = score_article(&title, a.published_at.as_deref(), now);
                Some(
                    TrendEntry::new(title, TrendSource::News, score)
                        .with("description", a.description)
                        .with("url", a.url)
                        .with("published_at", a.published_at)
                        .with("source_name", a.source.and_then(|s| s.name))
                        .with("author", a.author)
                        .with("category", options.category.clone()),
                )
            })
            .collect())
    }
}
