// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::future::BoxFuture;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::settings::BrowserSettings;
use crate::utils::errors::ScrapeError;
use crate::utils::user_agent::random_user_agent;

/// 导航完成条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    /// load 事件
    #[default]
    Load,
    /// load 之后再静置一段时间，近似网络空闲
    NetworkIdle,
}

/// 导航选项
#[derive(Debug, Clone, PartialEq)]
pub struct NavigateOptions {
    pub wait_until: WaitUntil,
    pub timeout: Duration,
    pub wait_for_selector: Option<String>,
    pub pre_script: Option<String>,
}

impl NavigateOptions {
    pub fn from_settings(settings: &BrowserSettings) -> Self {
        Self {
            wait_until: WaitUntil::Load,
            timeout: Duration::from_millis(settings.navigation_timeout_ms),
            wait_for_selector: None,
            pre_script: None,
        }
    }

    /// 应用任务选项中的覆盖项
    ///
    /// 识别 `waitUntil`、`timeoutMs`、`waitForSelector`、`preScript`。
    pub fn with_overrides(mut self, options: &serde_json::Value) -> Self {
        if let Some(wait) = options
            .get("waitUntil")
            .and_then(|v| serde_json::from_value::<WaitUntil>(v.clone()).ok())
        {
            self.wait_until = wait;
        }
        if let Some(ms) = options.get("timeoutMs").and_then(|v| v.as_u64()) {
            self.timeout = Duration::from_millis(ms);
        }
        if let Some(selector) = options.get("waitForSelector").and_then(|v| v.as_str()) {
            self.wait_for_selector = Some(selector.to_string());
        }
        if let Some(script) = options.get("preScript").and_then(|v| v.as_str()) {
            self.pre_script = Some(script.to_string());
        }
        self
    }
}

/// 加载完成的页面
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPage {
    /// 最终URL（跟随重定向后）
    pub url: String,
    pub status: u16,
    pub html: String,
}

/// 页面加载器
///
/// 抽取器通过它获得渲染后的 HTML，测试中用静态实现替换浏览器。
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, url: &str, options: &NavigateOptions) -> Result<LoadedPage, ScrapeError>;
}

/// 浏览器会话
///
/// 独占一个浏览器进程与页面，不在并发抽取之间共享。
/// 只能通过 [`with_browser`] 获得，结束时一定被释放。
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    intercept_task: Option<JoinHandle<()>>,
    selector_timeout: Duration,
    settle_delay: Duration,
}

impl BrowserSession {
    async fn open(settings: &BrowserSettings) -> Result<Self, ScrapeError> {
        let (mut browser, mut handler) = if let Some(ref url) = settings.remote_debugging_url {
            tracing::info!("Connecting to remote Chrome instance at: {}", url);
            Browser::connect(url)
                .await
                .map_err(|e| browser_error(format!("Failed to connect to remote Chrome: {}", e)))?
        } else {
            let config = BrowserConfig::builder()
                .no_sandbox()
                .request_timeout(Duration::from_millis(settings.navigation_timeout_ms))
                .window_size(settings.viewport_width, settings.viewport_height)
                .viewport(Viewport {
                    width: settings.viewport_width,
                    height: settings.viewport_height,
                    ..Default::default()
                })
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage")
                .build()
                .map_err(browser_error)?;
            Browser::launch(config)
                .await
                .map_err(|e| browser_error(format!("Failed to launch Chrome: {}", e)))?
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                handler_task.abort();
                return Err(browser_error(format!("Failed to open page: {}", e)));
            }
        };

        let mut session = Self {
            browser,
            page,
            handler_task,
            intercept_task: None,
            selector_timeout: Duration::from_millis(settings.wait_for_selector_timeout_ms),
            settle_delay: Duration::from_millis(settings.network_idle_settle_ms),
        };

        if let Err(e) = session.configure(settings.block_resources).await {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    /// 设置 User-Agent 并安装资源拦截
    async fn configure(&mut self, block_resources: bool) -> Result<(), ScrapeError> {
        self.page
            .set_user_agent(random_user_agent())
            .await
            .map_err(browser_error)?;

        if !block_resources {
            return Ok(());
        }

        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(browser_error)?;
        let intercept_page = self.page.clone();
        self.intercept_task = Some(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let fail =
                    FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
                if let Err(e) = intercept_page.execute(fail).await {
                    tracing::debug!("Failed to abort blocked request: {}", e);
                }
            }
        }));

        let patterns = [
            ResourceType::Stylesheet,
            ResourceType::Font,
            ResourceType::Image,
        ]
        .into_iter()
        .map(|resource_type| RequestPattern::builder().resource_type(resource_type).build())
        .collect::<Vec<_>>();
        self.page
            .execute(EnableParams::builder().patterns(patterns).build())
            .await
            .map_err(browser_error)?;
        Ok(())
    }

    /// 导航到目标URL
    ///
    /// # 返回值
    ///
    /// 主文档的 HTTP 状态码
    ///
    /// # 错误
    ///
    /// 超时、加载失败或非 2xx 状态均返回 `ScrapeError::Navigation`
    pub async fn navigate(&self, url: &str, options: &NavigateOptions) -> Result<u16, ScrapeError> {
        let work = async {
            if let Some(ref script) = options.pre_script {
                // 在导航前注入，页面脚本执行之前生效
                self.page
                    .evaluate_on_new_document(script.clone())
                    .await
                    .map_err(|e| ScrapeError::navigation(url, e))?;
            }

            let response = self
                .page
                .goto(url)
                .await
                .map_err(|e| ScrapeError::navigation(url, e))?
                .wait_for_navigation_response()
                .await
                .map_err(|e| ScrapeError::navigation(url, e))?;

            let status = response
                .as_ref()
                .and_then(|request| request.response.as_ref())
                .map(|resp| resp.status)
                .ok_or_else(|| ScrapeError::navigation(url, "no response received"))?;

            if !(200..300).contains(&status) {
                return Err(ScrapeError::navigation(url, format!("HTTP {}", status)));
            }

            if options.wait_until == WaitUntil::NetworkIdle {
                tokio::time::sleep(self.settle_delay).await;
            }

            if let Some(ref selector) = options.wait_for_selector {
                self.wait_for_selector(url, selector).await?;
            }

            Ok(status as u16)
        };

        tokio::time::timeout(options.timeout, work)
            .await
            .map_err(|_| {
                ScrapeError::navigation(
                    url,
                    format!("timed out after {}ms", options.timeout.as_millis()),
                )
            })?
    }

    async fn wait_for_selector(&self, url: &str, selector: &str) -> Result<(), ScrapeError> {
        let deadline = tokio::time::Instant::now() + self.selector_timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ScrapeError::navigation(
                    url,
                    format!("selector {} not found", selector),
                ));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// 执行 JS 之后的完整 DOM
    pub async fn rendered_html(&self) -> Result<String, ScrapeError> {
        self.page
            .content()
            .await
            .map_err(|e| ScrapeError::Extraction(format!("Failed to read page content: {}", e)))
    }

    /// 当前页面URL
    pub async fn current_url(&self) -> Option<String> {
        self.page.url().await.ok().flatten()
    }

    async fn close(mut self) {
        if let Some(task) = self.intercept_task.take() {
            task.abort();
        }
        if let Err(e) = self.page.clone().close().await {
            tracing::debug!("Failed to close page: {}", e);
        }
        if let Err(e) = self.browser.close().await {
            tracing::debug!("Failed to close browser: {}", e);
        }
        self.handler_task.abort();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // 被取消的 future 不会走到 close，这里兜底回收后台任务
        if let Some(task) = self.intercept_task.take() {
            task.abort();
        }
        self.handler_task.abort();
    }
}

fn browser_error(e: impl ToString) -> ScrapeError {
    ScrapeError::Navigation {
        url: "about:blank".to_string(),
        reason: e.to_string(),
    }
}

/// 在独占的浏览器会话中执行 `f`
///
/// 无论 `f` 成功还是失败，会话都会被关闭。
///
/// # 参数
///
/// * `settings` - 浏览器配置
/// * `f` - 使用会话的异步操作
pub async fn with_browser<T, F>(settings: &BrowserSettings, f: F) -> Result<T, ScrapeError>
where
    F: for<'a> FnOnce(&'a mut BrowserSession) -> BoxFuture<'a, Result<T, ScrapeError>>,
{
    let mut session = BrowserSession::open(settings).await?;
    let result = f(&mut session).await;
    session.close().await;
    result
}

/// 基于 Chromium 的页面加载器
pub struct ChromiumPageLoader {
    settings: BrowserSettings,
}

impl ChromiumPageLoader {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl PageLoader for ChromiumPageLoader {
    async fn load(&self, url: &str, options: &NavigateOptions) -> Result<LoadedPage, ScrapeError> {
        let target = url.to_string();
        let options = options.clone();
        with_browser(&self.settings, move |session| {
            Box::pin(async move {
                let status = session.navigate(&target, &options).await?;
                let html = session.rendered_html().await?;
                let final_url = session.current_url().await.unwrap_or(target);
                Ok(LoadedPage {
                    url: final_url,
                    status,
                    html,
                })
            })
        })
        .await
    }
}
