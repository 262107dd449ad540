// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 专用抽取器
//!
//! 抽取器共享同一流程：礼貌检查、加载页面、解析字段、可选的二进制下载。
//! 解析函数都是同步的纯函数，输入渲染后的 HTML 字符串。

pub mod assets;
pub mod content;
pub mod dom;
pub mod page;
pub mod trends;

use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::config::settings::BrowserSettings;
use crate::engines::browser_session::{LoadedPage, NavigateOptions, PageLoader};
use crate::utils::errors::ScrapeError;
use crate::utils::robots::DomainPolicyStore;

/// 页面获取器
///
/// 在加载前做 URL 校验、robots 许可与同域限速。
pub struct PageFetcher {
    loader: Arc<dyn PageLoader>,
    policy: Arc<DomainPolicyStore>,
    defaults: NavigateOptions,
}

impl PageFetcher {
    pub fn new(
        loader: Arc<dyn PageLoader>,
        policy: Arc<DomainPolicyStore>,
        browser: &BrowserSettings,
    ) -> Self {
        Self {
            loader,
            policy,
            defaults: NavigateOptions::from_settings(browser),
        }
    }

    /// 加载页面
    ///
    /// # 参数
    ///
    /// * `url` - 目标URL，只接受 http 与 https
    /// * `options` - 任务选项，其中的导航覆盖项会被应用
    ///
    /// # 错误
    ///
    /// * `ScrapeError::Validation` - URL 非法
    /// * `ScrapeError::RobotsDisallowed` - 被 robots 排除
    /// * `ScrapeError::Navigation` - 加载失败或超时
    pub async fn fetch(&self, url: &str, options: &Value) -> Result<LoadedPage, ScrapeError> {
        validate_target(url)?;
        self.policy.admit(url).await?;
        let navigate = self.defaults.clone().with_overrides(options);
        let timeout = navigate.timeout;

        // 整体上限为导航超时的 1.5 倍
        match tokio::time::timeout(timeout + timeout / 2, self.loader.load(url, &navigate)).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::navigation(
                url,
                format!("Navigation timeout after {}ms", timeout.as_millis()),
            )),
        }
    }
}

/// 校验目标URL
pub fn validate_target(url: &str) -> Result<Url, ScrapeError> {
    let parsed =
        Url::parse(url).map_err(|e| ScrapeError::Validation(format!("Invalid URL {}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        scheme => Err(ScrapeError::Validation(format!(
            "Unsupported URL scheme {} in {}",
            scheme, url
        ))),
    }
}
