// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::scrape_job::{DomainError, JobType};

/// 重新抓取频率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeFrequency {
    #[default]
    Daily,
    Weekly,
}

impl ScrapeFrequency {
    /// 该频率对应的过期间隔
    pub fn interval(&self) -> Duration {
        match self {
            ScrapeFrequency::Daily => Duration::days(1),
            ScrapeFrequency::Weekly => Duration::days(7),
        }
    }
}

impl fmt::Display for ScrapeFrequency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScrapeFrequency::Daily => write!(f, "daily"),
            ScrapeFrequency::Weekly => write!(f, "weekly"),
        }
    }
}

impl FromStr for ScrapeFrequency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(ScrapeFrequency::Daily),
            "weekly" => Ok(ScrapeFrequency::Weekly),
            other => Err(DomainError::ValidationError(format!(
                "unknown frequency: {}",
                other
            ))),
        }
    }
}

/// 周期性抓取目标
///
/// 定时扫描会为从未抓取或上次抓取早于截止时间的目标创建任务。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapeTarget {
    pub id: Uuid,
    pub url: String,
    pub job_type: JobType,
    pub frequency: ScrapeFrequency,
    pub user_id: Option<Uuid>,
    pub active: bool,
    pub last_scraped_at: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
}

impl ScrapeTarget {
    pub fn new(url: impl Into<String>, job_type: JobType, frequency: ScrapeFrequency) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            job_type,
            frequency,
            user_id: None,
            active: true,
            last_scraped_at: None,
            created_at: Utc::now().into(),
        }
    }

    /// 在给定截止时间下是否需要重新抓取
    pub fn is_overdue(&self, cutoff: DateTime<Utc>) -> bool {
        self.active
            && self
                .last_scraped_at
                .map(|at| at.with_timezone(&Utc) < cutoff)
                .unwrap_or(true)
    }
}
