// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;

use crate::domain::models::trend::{MergedTrend, TrendEntry, TrendSource};

/// 保留 `places` 位小数（四舍五入）
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// 跨来源合并趋势条目
///
/// 关键词不区分大小写分组，展示形式取首次出现的写法。
/// `avg_score` 保留两位小数，`popularity` 为分数之和保留一位小数，
/// 结果按 `popularity` 降序排列，相同热度保持首次出现的顺序。
pub fn merge_trends(entries: &[TrendEntry]) -> Vec<MergedTrend> {
    struct Group {
        keyword: String,
        sources: Vec<TrendSource>,
        count: usize,
        total: f64,
    }

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for entry in entries {
        let key = entry.keyword.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Group {
                keyword: entry.keyword.trim().to_string(),
                sources: Vec::new(),
                count: 0,
                total: 0.0,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        if !group.sources.contains(&entry.source) {
            group.sources.push(entry.source);
        }
        group.count += 1;
        group.total += entry.trend_score;
    }

    let mut merged: Vec<MergedTrend> = groups
        .into_iter()
        .map(|g| MergedTrend {
            keyword: g.keyword,
            sources: g.sources,
            count: g.count,
            avg_score: round_to(g.total / g.count as f64, 2),
            popularity: round_to(g.total, 1),
        })
        .collect();
    merged.sort_by(|a, b| b.popularity.total_cmp(&a.popularity));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_merge() {
        let entries = vec![
            TrendEntry::new("AI", TrendSource::Google, 10.0),
            TrendEntry::new("rust", TrendSource::Reddit, 3.0),
            TrendEntry::new("ai", TrendSource::News, 5.0),
        ];
        let merged = merge_trends(&entries);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].keyword, "AI");
        assert_eq!(merged[0].popularity, 15.0);
        assert_eq!(merged[0].avg_score, 7.5);
        assert_eq!(merged[0].count, 2);
        assert_eq!(merged[0].sources, vec![TrendSource::Google, TrendSource::News]);
        assert_eq!(merged[1].keyword, "rust");
    }

    #[test]
    fn test_rounding_and_order() {
        let entries = vec![
            TrendEntry::new("low", TrendSource::Google, 1.26),
            TrendEntry::new("high", TrendSource::Google, 20.0),
            TrendEntry::new("third", TrendSource::Google, 1.0),
            TrendEntry::new("Third", TrendSource::Google, 1.0),
            TrendEntry::new("third", TrendSource::Google, 2.0),
        ];
        let merged = merge_trends(&entries);
        let keywords: Vec<_> = merged.iter().map(|m| m.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["high", "third", "low"]);
        assert_eq!(merged[1].avg_score, 1.33);
        assert_eq!(merged[2].popularity, 1.3);
        assert!(merge_trends(&[]).is_empty());
    }
}
