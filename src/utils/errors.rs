// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// 抓取错误类型
///
/// 失败信息最终写入任务的 `error` 字段，因此只包含可读描述，
/// 不携带调用栈。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScrapeError {
    /// 页面加载失败、超时或返回非 2xx 状态
    #[error("Navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    /// 目标被 robots 策略排除，调用方不得继续
    #[error("Blocked by robots.txt: {0}")]
    RobotsDisallowed(String),

    /// URL 非法或任务类型不受支持
    #[error("Validation error: {0}")]
    Validation(String),

    /// 二进制资源下载或校验失败
    #[error("Download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    /// 已加载内容的解析失败
    #[error("Extraction failed: {0}")]
    Extraction(String),
}

impl ScrapeError {
    pub fn navigation(url: impl Into<String>, reason: impl ToString) -> Self {
        ScrapeError::Navigation {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn download(url: impl Into<String>, reason: impl ToString) -> Self {
        ScrapeError::Download {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// 持久队列是否应该重试
    ///
    /// robots 拒绝与校验错误重试也不会改变结果。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScrapeError::Navigation { .. }
                | ScrapeError::Download { .. }
                | ScrapeError::Extraction(_)
        )
    }

    /// 指标标签
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Navigation { .. } => "navigation",
            ScrapeError::RobotsDisallowed(_) => "robots_disallowed",
            ScrapeError::Validation(_) => "validation",
            ScrapeError::Download { .. } => "download",
            ScrapeError::Extraction(_) => "extraction",
        }
    }
}
