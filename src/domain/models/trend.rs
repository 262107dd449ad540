// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::scrape_job::DomainError;

/// 趋势信号来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendSource {
    /// 搜索兴趣时间序列
    Google,
    /// 社交聚合站热门列表
    Reddit,
    /// 新闻头条
    News,
    /// 社交平台地区热门话题
    Twitter,
}

impl fmt::Display for TrendSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrendSource::Google => write!(f, "google"),
            TrendSource::Reddit => write!(f, "reddit"),
            TrendSource::News => write!(f, "news"),
            TrendSource::Twitter => write!(f, "twitter"),
        }
    }
}

impl FromStr for TrendSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" | "google_trends" => Ok(TrendSource::Google),
            "reddit" => Ok(TrendSource::Reddit),
            "news" => Ok(TrendSource::News),
            "twitter" | "x" => Ok(TrendSource::Twitter),
            other => Err(DomainError::ValidationError(format!(
                "unknown trend source: {}",
                other
            ))),
        }
    }
}

/// 单个来源产出的趋势条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendEntry {
    pub keyword: String,
    pub source: TrendSource,
    pub trend_score: f64,
    /// 来源相关字段（链接、评论数、发布时间等）
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl TrendEntry {
    pub fn new(keyword: impl Into<String>, source: TrendSource, trend_score: f64) -> Self {
        Self {
            keyword: keyword.into(),
            source,
            trend_score,
            details: serde_json::Map::new(),
        }
    }

    /// 附加来源相关字段
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// 按关键词合并后的趋势
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergedTrend {
    pub keyword: String,
    pub sources: Vec<TrendSource>,
    pub count: usize,
    pub avg_score: f64,
    pub popularity: f64,
}

/// 趋势监控结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendResult {
    pub trends: Vec<MergedTrend>,
    pub entries: Vec<TrendEntry>,
    pub sources: Vec<TrendSource>,
    pub failed_sources: Vec<String>,
    pub scraped_at: DateTime<Utc>,
}

/// 热门关键词（来自已记录的趋势）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HotKeyword {
    pub keyword: String,
    pub score: f64,
}
