// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 资源抽取：图片、视频、文档与音频

pub mod audio;
pub mod documents;
pub mod images;
pub mod media;
pub mod videos;

use std::sync::Arc;

use chrono::Utc;
use scraper::Html;
use serde_json::Value;
use tracing::info;

use crate::config::settings::AssetSettings;
use crate::domain::models::extraction::{AssetResult, AssetSummary};
use crate::extractors::PageFetcher;
use crate::utils::errors::ScrapeError;

use self::images::{ImageFilter, OptimizeOptions};
use self::media::{option_flag, AssetDownloader};
use self::videos::VideoFilter;

/// 资源抽取选项
#[derive(Debug, Clone, PartialEq)]
pub struct AssetOptions {
    pub include_images: bool,
    pub include_videos: bool,
    pub include_documents: bool,
    pub include_audio: bool,
    /// 下载图片与视频文件
    pub download: bool,
    pub image_filter: ImageFilter,
    pub video_filter: VideoFilter,
    pub optimize: Option<OptimizeOptions>,
}

impl Default for AssetOptions {
    fn default() -> Self {
        Self::from_options(&Value::Null)
    }
}

impl AssetOptions {
    /// 读取任务选项
    ///
    /// `includeImages`、`includeVideos`、`includeDocuments`、`includeAudio`
    /// 默认都开启；`downloadAssets` 默认关闭。
    pub fn from_options(options: &Value) -> Self {
        Self {
            include_images: option_flag(options, "includeImages", true),
            include_videos: option_flag(options, "includeVideos", true),
            include_documents: option_flag(options, "includeDocuments", true),
            include_audio: option_flag(options, "includeAudio", true),
            download: option_flag(options, "downloadAssets", false),
            image_filter: ImageFilter::from_options(options),
            video_filter: VideoFilter::from_options(options),
            optimize: OptimizeOptions::from_options(options),
        }
    }
}

/// 从 HTML 中发现资源（不下载）
pub fn discover_assets(
    html: &str,
    url: &str,
    options: &AssetOptions,
    settings: &AssetSettings,
) -> AssetResult {
    let document = Html::parse_document(html);

    let images = if options.include_images {
        options
            .image_filter
            .apply(images::discover_images(&document, url))
    } else {
        Vec::new()
    };
    let videos = if options.include_videos {
        options
            .video_filter
            .apply(videos::discover_videos(&document, url))
    } else {
        Vec::new()
    };
    let documents = if options.include_documents {
        documents::discover_documents(&document, url, &settings.document_extensions)
    } else {
        Vec::new()
    };
    let audio = if options.include_audio {
        audio::discover_audio(&document, url)
    } else {
        Vec::new()
    };

    let mut result = AssetResult {
        url: url.to_string(),
        images,
        videos,
        documents,
        audio,
        failures: Vec::new(),
        summary: AssetSummary::default(),
        scraped_at: Utc::now(),
    };
    result.summary = summarize(&result);
    result
}

fn summarize(result: &AssetResult) -> AssetSummary {
    let downloaded = result.images.iter().filter(|i| i.binary.is_some()).count()
        + result.videos.iter().filter(|v| v.binary.is_some()).count();
    AssetSummary {
        images: result.images.len(),
        videos: result.videos.len(),
        documents: result.documents.len(),
        audio: result.audio.len(),
        downloaded,
        failed: result.failures.len(),
    }
}

/// 资源抽取器
pub struct AssetExtractor {
    fetcher: Arc<PageFetcher>,
    downloader: Arc<AssetDownloader>,
    settings: AssetSettings,
}

impl AssetExtractor {
    pub fn new(fetcher: Arc<PageFetcher>, downloader: Arc<AssetDownloader>, settings: AssetSettings) -> Self {
        Self {
            fetcher,
            downloader,
            settings,
        }
    }

    pub fn fetcher(&self) -> &PageFetcher {
        &self.fetcher
    }

    /// 加载页面并发现资源，开启下载时再分批下载
    ///
    /// 单个资源下载失败记录在 `failures` 中，不会使整个任务失败。
    pub async fn extract(&self, url: &str, options: &Value) -> Result<AssetResult, ScrapeError> {
        let page = self.fetcher.fetch(url, options).await?;
        self.extract_loaded(&page.html, &page.url, options).await
    }

    /// 对已加载的 HTML 做资源抽取
    pub async fn extract_loaded(
        &self,
        html: &str,
        url: &str,
        options: &Value,
    ) -> Result<AssetResult, ScrapeError> {
        let asset_options = AssetOptions::from_options(options);
        let mut result = discover_assets(html, url, &asset_options, &self.settings);

        if asset_options.download {
            let (images, image_failures) = self
                .downloader
                .download_images(std::mem::take(&mut result.images), asset_options.optimize.as_ref())
                .await;
            let (videos, video_failures) = self
                .downloader
                .download_videos(std::mem::take(&mut result.videos))
                .await;
            result.images = images;
            result.videos = videos;
            result.failures.extend(image_failures);
            result.failures.extend(video_failures);
        }

        result.summary = summarize(&result);
        info!(
            "Discovered assets on {}: {} images, {} videos, {} documents, {} audio ({} downloaded, {} failed)",
            url,
            result.summary.images,
            result.summary.videos,
            result.summary.documents,
            result.summary.audio,
            result.summary.downloaded,
            result.summary.failed
        );
        Ok(result)
    }
}
