// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::{Html, Selector};
use serde_json::{json, Map, Value};

use crate::domain::models::extraction::StructuredData;

pub const JSON_LD: &str = "json-ld";
pub const MICRODATA: &str = "microdata";
pub const OPEN_GRAPH: &str = "open-graph";

/// 收集页面中的结构化数据
///
/// 依次收集 JSON-LD、Microdata 与 Open Graph。格式错误的 JSON-LD 被跳过，
/// 顶层数组展开为多条记录。
pub fn extract_structured_data(document: &Html) -> Vec<StructuredData> {
    let mut records = Vec::new();
    records.extend(json_ld(document));
    records.extend(microdata(document));
    if let Some(og) = open_graph(document) {
        records.push(og);
    }
    records
}

fn json_ld(document: &Html) -> Vec<StructuredData> {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for script in document.select(&selector) {
        let raw: String = script.text().collect();
        let Ok(value) = serde_json::from_str::<Value>(raw.trim()) else {
            continue;
        };
        match value {
            Value::Array(items) => records.extend(items.into_iter().map(|data| StructuredData {
                kind: JSON_LD.to_string(),
                data,
            })),
            data => records.push(StructuredData {
                kind: JSON_LD.to_string(),
                data,
            }),
        }
    }
    records
}

fn microdata(document: &Html) -> Vec<StructuredData> {
    let (Ok(scope), Ok(prop)) = (Selector::parse("[itemscope]"), Selector::parse("[itemprop]"))
    else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for item in document.select(&scope) {
        let mut properties = Map::new();
        for el in item.select(&prop) {
            let Some(name) = el.value().attr("itemprop") else {
                continue;
            };
            let value = el
                .value()
                .attr("content")
                .or_else(|| el.value().attr("href"))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| el.text().collect::<String>().trim().to_string());
            if !value.is_empty() {
                properties.insert(name.to_string(), Value::String(value));
            }
        }
        if !properties.is_empty() {
            records.push(StructuredData {
                kind: MICRODATA.to_string(),
                data: json!({
                    "itemType": item.value().attr("itemtype"),
                    "properties": properties,
                }),
            });
        }
    }
    records
}

fn open_graph(document: &Html) -> Option<StructuredData> {
    let selector = Selector::parse(r#"meta[property^="og:"]"#).ok()?;
    let mut data = Map::new();
    for meta in document.select(&selector) {
        if let (Some(property), Some(content)) =
            (meta.value().attr("property"), meta.value().attr("content"))
        {
            data.insert(property.to_string(), Value::String(content.to_string()));
        }
    }
    if data.is_empty() {
        None
    } else {
        Some(StructuredData {
            kind: OPEN_GRAPH.to_string(),
            data: Value::Object(data),
        })
    }
}

/// 在 JSON-LD 记录中查找第一个出现的字段（含 `@graph` 内的节点）
pub fn find_json_ld_field<'a>(records: &'a [StructuredData], field: &str) -> Option<&'a Value> {
    fn search<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
        match value {
            Value::Object(map) => map.get(field).or_else(|| {
                map.get("@graph")
                    .and_then(|graph| graph.as_array())
                    .and_then(|nodes| nodes.iter().find_map(|n| search(n, field)))
            }),
            Value::Array(items) => items.iter().find_map(|v| search(v, field)),
            _ => None,
        }
    }

    records
        .iter()
        .filter(|r| r.kind == JSON_LD)
        .find_map(|r| search(&r.data, field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_json_ld_is_skipped() {
        let html = Html::parse_document(
            r#"<html><head>
            <script type="application/ld+json">{ not json </script>
            <script type="application/ld+json">{"@type":"Article","headline":"Hi"}</script>
            </head><body></body></html>"#,
        );
        let records = extract_structured_data(&html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, JSON_LD);
        assert_eq!(records[0].data["headline"], "Hi");
    }

    #[test]
    fn test_microdata_and_open_graph() {
        let html = Html::parse_document(
            r#"<html><head>
            <meta property="og:title" content="OG Title">
            <meta property="og:type" content="article">
            </head><body>
            <div itemscope itemtype="https://schema.org/Person">
              <span itemprop="name">Ada</span>
              <a itemprop="url" href="https://ada.dev">site</a>
            </div></body></html>"#,
        );
        let records = extract_structured_data(&html);
        let micro = records.iter().find(|r| r.kind == MICRODATA).unwrap();
        assert_eq!(micro.data["properties"]["name"], "Ada");
        assert_eq!(micro.data["properties"]["url"], "https://ada.dev");

        let og = records.iter().find(|r| r.kind == OPEN_GRAPH).unwrap();
        assert_eq!(og.data["og:title"], "OG Title");
    }

    #[test]
    fn test_find_field_in_graph() {
        let html = Html::parse_document(
            r#"<script type="application/ld+json">
            {"@graph":[{"@type":"WebSite"},{"@type":"Article","datePublished":"2024-03-01"}]}
            </script>"#,
        );
        let records = extract_structured_data(&html);
        assert_eq!(
            find_json_ld_field(&records, "datePublished").and_then(|v| v.as_str()),
            Some("2024-03-01")
        );
    }
}
