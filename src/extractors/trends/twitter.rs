// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{round_to, TrendCollector, TrendOptions};
use crate::config::settings::TrendSettings;
use crate::domain::models::trend::{TrendEntry, TrendSource};
use crate::utils::errors::ScrapeError;

#[derive(Debug, Deserialize)]
struct PlaceTrends {
    #[serde(default)]
    trends: Vec<Topic>,
}

/// 地区热门话题
#[derive(Debug, Deserialize)]
pub struct Topic {
    pub name: String,
    pub url: Option<String>,
    pub tweet_volume: Option<u64>,
}

/// 话题打分
///
/// 排名分 `100 * (1 - rank/total)`；有讨论量时与
/// `min(100, log10(volume+1)*20)` 按 4:6 混合，保留两位小数。
pub fn score_topic(rank: usize, total: usize, tweet_volume: Option<u64>) -> f64 {
    let rank_score = if total == 0 {
        0.0
    } else {
        100.0 * (1.0 - rank as f64 / total as f64)
    };
    let score = match tweet_volume {
        Some(volume) => {
            let volume_score = ((volume as f64 + 1.0).log10() * 20.0).min(100.0);
            rank_score * 0.4 + volume_score * 0.6
        }
        None => rank_score,
    };
    round_to(score, 2)
}

/// 热门话题采集器
///
/// 没有配置 Bearer 令牌时不产生条目。
pub struct TwitterCollector {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl TwitterCollector {
    pub fn new(client: Client, settings: &TrendSettings) -> Self {
        Self {
            client,
            base_url: settings.twitter_base_url.trim_end_matches('/').to_string(),
            bearer_token: settings.twitter_bearer_token.clone().filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl TrendCollector for TwitterCollector {
    fn source(&self) -> TrendSource {
        TrendSource::Twitter
    }

    async fn collect(&self, options: &TrendOptions) -> Result<Vec<TrendEntry>, ScrapeError> {
        let Some(token) = &self.bearer_token else {
            debug!("Twitter bearer token not configured, skipping trending topics");
            return Ok(Vec::new());
        };

        let url = format!("{}/1.1/trends/place.json", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("id", options.woeid.to_string())])
            .send()
            .await
            .map_err(|e| ScrapeError::download(&url, e))?;
        if !response.status().is_success() {
            return Err(ScrapeError::download(
                &url,
                format!("HTTP {}", response.status().as_u16()),
            ));
        }
        let places: Vec<PlaceTrends> = response
            .json()
            .await
            .map_err(|e| ScrapeError::Extraction(format!("Malformed trends from {}: {}", url, e)))?;

        let topics: Vec<Topic> = places
            .into_iter()
            .next()
            .map(|place| place.trends)
            .unwrap_or_default()
            .into_iter()
            .take(options.limit)
            .collect();
        let total = topics.len();

        Ok(topics
            .into_iter()
            .enumerate()
            .filter_map(|(rank, topic)| {
                let keyword = topic.name.trim().trim_start_matches('#').to_string();
                if keyword.is_empty() {
                    return None;
                }
                let score = score_topic(rank, total, topic.tweet_volume);
                Some(
                    TrendEntry::new(keyword, TrendSource::Twitter, score)
                        .with("name", topic.name)
                        .with("url", topic.url)
                        .with("tweet_volume", topic.tweet_volume)
                        .with("woeid", options.woeid),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_score_topic() {
        assert_eq!(score_topic(0, 4, None), 100.0);
        assert_eq!(score_topic(2, 4, None), 50.0);
        // 排名分 100，讨论量 9999: log10(10000)*20 = 80
        assert_eq!(score_topic(0, 4, Some(9_999)), 88.0);
        assert_eq!(score_topic(0, 0, None), 0.0);
    }

    fn collector(server: &MockServer, token: Option<&str>) -> TwitterCollector {
        let settings = TrendSettings {
            twitter_base_url: server.uri(),
            twitter_bearer_token: token.map(str::to_string),
            ..TrendSettings::default()
        };
        TwitterCollector::new(crate::extractors::trends::trend_client(&settings).unwrap(), &settings)
    }

    #[tokio::test]
    async fn test_collect_trending_topics() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.1/trends/place.json"))
            .and(header("Authorization", "Bearer token-123"))
            .and(query_param("id", "23424977"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "trends": [
                    {"name": "#RustLang", "url": "https://x.test/search?q=%23RustLang", "tweet_volume": 52000},
                    {"name": "Tokio", "url": null, "tweet_volume": null},
                    {"name": "#", "tweet_volume": null}
                ]
            }])))
            .mount(&server)
            .await;

        let options =
            TrendOptions::from_options(&json!({"woeid": 23424977}), &TrendSettings::default()).unwrap();
        let entries = collector(&server, Some("token-123")).collect(&options).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].keyword, "RustLang");
        assert_eq!(entries[0].source, TrendSource::Twitter);
        assert_eq!(entries[0].details["name"], "#RustLang");
        assert_eq!(entries[0].details["tweet_volume"], 52000);
        assert!(entries[0].trend_score > entries[1].trend_score);
    }

    #[tokio::test]
    async fn test_missing_token_yields_nothing() {
        let server = MockServer::start().await;
        let options = TrendOptions::from_options(&json!({}), &TrendSettings::default()).unwrap();
        let entries = collector(&server, None).collect(&options).await.unwrap();
        assert!(entries.is_empty());
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_token_is_a_download_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.1/trends/place.json"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let options = TrendOptions::from_options(&json!({}), &TrendSettings::default()).unwrap();
        let result = collector(&server, Some("expired")).collect(&options).await;
        assert!(matches!(result, Err(ScrapeError::Download { .. })));
    }
}
