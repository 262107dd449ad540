// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use super::{round_to, TrendCollector, TrendOptions};
use crate::config::settings::TrendSettings;
use crate::domain::models::trend::{TrendEntry, TrendSource};
use crate::utils::errors::ScrapeError;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

/// 热门列表中的帖子
#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub ups: i64,
    #[serde(default)]
    pub created_utc: f64,
    pub url: Option<String>,
    pub url_overridden_by_dest: Option<String>,
    pub author: Option<String>,
}

/// 帖子热度打分
///
/// `hot = ups / (age_h + 2)^1.5`，`ratio = comments / (ups + 1)`，
/// 分数为 `hot*1000 + ratio*100`，保留两位小数。
pub fn score_post(post: &Post, now_secs: f64) -> f64 {
    let age_hours = ((now_secs - post.created_utc) / 3600.0).max(0.0);
    let ups = post.ups as f64;
    let hotness = ups / (age_hours + 2.0).powf(1.5);
    let comment_ratio = post.num_comments as f64 / (ups + 1.0);
    round_to(hotness * 1000.0 + comment_ratio * 100.0, 2)
}

/// 社交聚合站热门列表采集器
pub struct RedditCollector {
    client: Client,
    base_url: String,
}

impl RedditCollector {
    pub fn new(client: Client, settings: &TrendSettings) -> Self {
        Self {
            client,
            base_url: settings.reddit_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 获取子版块的热门帖子
    pub async fn hot_posts(&self, subreddit: &str, limit: usize) -> Result<Vec<Post>, ScrapeError> {
        let url = format!("{}/r/{}/hot.json", self.base_url, subreddit);
        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit.min(100))])
            .send()
            .await
            .map_err(|e| ScrapeError::download(&url, e))?;
        if !response.status().is_success() {
            return Err(ScrapeError::download(
                &url,
                format!("HTTP {}", response.status().as_u16()),
            ));
        }
        let listing: Listing = response
            .json()
            .await
            .map_err(|e| ScrapeError::Extraction(format!("Malformed listing from {}: {}", url, e)))?;
        Ok(listing.data.children.into_iter().map(|c| c.data).collect())
    }
}

#[async_trait]
impl TrendCollector for RedditCollector {
    fn source(&self) -> TrendSource {
        TrendSource::Reddit
    }

    /// 逐个子版块抓取，单个子版块失败只记录日志
    async fn collect(&self, options: &TrendOptions) -> Result<Vec<TrendEntry>, ScrapeError> {
        let now_secs = Utc::now().timestamp_millis() as f64 / 1000.0;
        let mut entries = Vec::new();
        let mut last_error = None;

        for subreddit in &options.subreddits {
            match self.hot_posts(subreddit, options.limit).await {
                Ok(posts) => entries.extend(posts.into_iter().filter(|p| !p.title.is_empty()).map(|p| {
                    let score = score_post(&p, now_secs);
                    TrendEntry::new(p.title.clone(), TrendSource::Reddit, score)
                        .with("subreddit", p.subreddit)
                        .with("url", p.url_overridden_by_dest.or(p.url))
                        .with("comments", p.num_comments)
                        .with("upvotes", p.ups)
                        .with("created_utc", p.created_utc)
                        .with("author", p.author)
                })),
                Err(e) => {
                    warn!("Hot listing failed for r/{}: {}", subreddit, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if entries.is_empty() => Err(e),
            _ => Ok(entries),
        }
    }
}
