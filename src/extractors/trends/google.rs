// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 搜索兴趣来源
//!
//! 先调用 explore 接口换取各组件的 token，再并发请求兴趣曲线、
//! 相关查询与地区兴趣三个组件。响应体带有防 JSON 劫持前缀，解析前剥离。

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{round_to, TrendCollector, TrendOptions};
use crate::config::settings::TrendSettings;
use crate::domain::models::trend::{TrendEntry, TrendSource};
use crate::utils::errors::ScrapeError;

const TIMESERIES_WIDGET: &str = "TIMESERIES";
const RELATED_QUERIES_WIDGET: &str = "RELATED_QUERIES";
const GEO_MAP_WIDGET: &str = "GEO_MAP";

/// 兴趣曲线打分
///
/// 只统计正值：`avg*0.3 + max*0.4 + 最近5个点的均值*0.3`，保留两位小数。
pub fn score_interest(values: &[f64]) -> f64 {
    let positive: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    if positive.is_empty() {
        return 0.0;
    }
    let avg = positive.iter().sum::<f64>() / positive.len() as f64;
    let max = positive.iter().copied().fold(f64::MIN, f64::max);
    let recent = &positive[positive.len().saturating_sub(5)..];
    let recent_avg = recent.iter().sum::<f64>() / recent.len() as f64;
    round_to(avg * 0.3 + max * 0.4 + recent_avg * 0.3, 2)
}

/// 剥离 `)]}'` 前缀后解析 JSON
pub fn parse_guarded_json(body: &str) -> Result<Value, serde_json::Error> {
    let start = body.find(['{', '[']).unwrap_or(0);
    serde_json::from_str(&body[start..])
}

fn first_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Array(items)) => items.first().and_then(Value::as_f64).unwrap_or(0.0),
        Some(v) => v.as_f64().unwrap_or(0.0),
        None => 0.0,
    }
}

/// 搜索兴趣采集器
pub struct GoogleTrendsCollector {
    client: Client,
    base_url: String,
    concurrency: usize,
}

impl GoogleTrendsCollector {
    pub fn new(client: Client, settings: &TrendSettings) -> Self {
        Self {
            client,
            base_url: settings.google_base_url.trim_end_matches('/').to_string(),
            concurrency: settings.batch_concurrency.max(1),
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ScrapeError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| ScrapeError::download(&url, e))?;
        if !response.status().is_success() {
            return Err(ScrapeError::download(
                &url,
                format!("HTTP {}", response.status().as_u16()),
            ));
        }
        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::download(&url, e))?;
        parse_guarded_json(&body)
            .map_err(|e| ScrapeError::Extraction(format!("Malformed response from {}: {}", url, e)))
    }

    /// 请求单个组件的数据，组件缺失时返回 `Null`
    async fn widget(&self, widgets: &[Value], id: &str, path: &str) -> Result<Value, ScrapeError> {
        let Some(widget) = widgets
            .iter()
            .find(|w| w.get("id").and_then(Value::as_str) == Some(id))
        else {
            return Ok(Value::Null);
        };
        let token = widget
            .get("token")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let request = widget.get("request").cloned().unwrap_or(Value::Null);
        self.get_json(
            path,
            &[
                ("hl", "en-US".to_string()),
                ("tz", "0".to_string()),
                ("req", request.to_string()),
                ("token", token),
            ],
        )
        .await
    }

    /// 单个关键词的兴趣曲线、相关查询与地区兴趣
    pub async fn search(&self, keyword: &str, options: &TrendOptions) -> Result<TrendEntry, ScrapeError> {
        let explore_request = json!({
            "comparisonItem": [{
                "keyword": keyword,
                "geo": options.geo,
                "time": options.timeframe.as_query(),
            }],
            "category": 0,
            "property": "",
        });
        let explore = self
            .get_json(
                "/trends/api/explore",
                &[
                    ("hl", "en-US".to_string()),
                    ("tz", "0".to_string()),
                    ("req", explore_request.to_string()),
                ],
            )
            .await?;
        let widgets = explore
            .get("widgets")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let (interest, related, regions) = futures::join!(
            self.widget(&widgets, TIMESERIES_WIDGET, "/trends/api/widgetdata/multiline"),
            self.widget(&widgets, RELATED_QUERIES_WIDGET, "/trends/api/widgetdata/relatedsearches"),
            self.widget(&widgets, GEO_MAP_WIDGET, "/trends/api/widgetdata/comparedgeo"),
        );
        let interest = interest?;

        let interest_over_time: Vec<Value> = interest
            .pointer("/default/timelineData")
            .and_then(Value::as_array)
            .map(|points| {
                points
                    .iter()
                    .map(|p| {
                        json!({
                            "time": p.get("formattedTime").or_else(|| p.get("time")).cloned().unwrap_or(Value::Null),
                            "value": first_number(p.get("value")),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        let values: Vec<f64> = interest_over_time
            .iter()
            .map(|p| p["value"].as_f64().unwrap_or(0.0))
            .collect();

        // 相关查询与地区兴趣只是附加信息
        let related_queries: Vec<Value> = match related {
            Ok(data) => data
                .pointer("/default/rankedList/0/rankedKeyword")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .map(|r| json!({"query": r.get("query"), "value": r.get("value")}))
                        .collect()
                })
                .unwrap_or_default(),
            Err(e) => {
                debug!("Related queries unavailable for {}: {}", keyword, e);
                Vec::new()
            }
        };
        let regional_interest: Vec<Value> = match regions {
            Ok(data) => data
                .pointer("/default/geoMapData")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .map(|r| json!({"geoName": r.get("geoName"), "value": first_number(r.get("value"))}))
                        .collect()
                })
                .unwrap_or_default(),
            Err(e) => {
                debug!("Regional interest unavailable for {}: {}", keyword, e);
                Vec::new()
            }
        };

        Ok(TrendEntry::new(keyword, TrendSource::Google, score_interest(&values))
            .with("interest_over_time", interest_over_time)
            .with("related_queries", related_queries)
            .with("regional_interest", regional_interest))
    }
}

#[async_trait]
impl TrendCollector for GoogleTrendsCollector {
    fn source(&self) -> TrendSource {
        TrendSource::Google
    }

    /// 关键词分批并发抓取，单个关键词失败只记录日志
    ///
    /// 所有关键词都失败时返回最后一个错误。
    async fn collect(&self, options: &TrendOptions) -> Result<Vec<TrendEntry>, ScrapeError> {
        let mut entries = Vec::new();
        let mut last_error = None;

        for chunk in options.keywords.chunks(self.concurrency) {
            let results = join_all(chunk.iter().map(|keyword| self.search(keyword, options))).await;
            for (keyword, result) in chunk.iter().zip(results) {
                match result {
                    Ok(entry) => entries.push(entry),
                    Err(e) => {
                        warn!("Search interest failed for keyword {}: {}", keyword, e);
                        last_error = Some(e);
                    }
                }
            }
        }

        match last_error {
            Some(e) if entries.is_empty() => Err(e),
            _ => Ok(entries),
        }
    }
}
