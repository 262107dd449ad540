// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 资源下载与校验
//!
//! 下载按固定批大小分块执行，单个资源失败只记录在结果里，不影响整批。

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use image::{DynamicImage, GenericImageView};
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::settings::AssetSettings;
use crate::domain::models::extraction::{
    AssetFailure, BinaryMetadata, DominantColor, ImageAsset, Thumbnail, VideoAsset, VideoSourceKind,
};
use crate::domain::repositories::storage_repository::StorageRepository;
use crate::extractors::assets::images::{
    dominant_colors, encode, fit_inside, format_extension, thumbnails, OptimizeOptions,
    TargetFormat, DEFAULT_QUALITY,
};
use crate::utils::errors::ScrapeError;
use crate::utils::hashing::{content_hash, storage_file_name};
use crate::utils::url_utils::file_extension;
use crate::utils::user_agent::random_user_agent;

/// 资源类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    fn mime_prefix(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/",
            MediaKind::Video => "video/",
            MediaKind::Audio => "audio/",
        }
    }
}

/// 媒体校验器
///
/// 扩展名白名单、大小上限与最小尺寸都来自部署配置。
#[derive(Debug, Clone)]
pub struct MediaValidator {
    image_extensions: Vec<String>,
    video_extensions: Vec<String>,
    audio_extensions: Vec<String>,
    max_file_bytes: u64,
    min_width: u32,
    min_height: u32,
}

/// 校验通过的图片
#[derive(Debug)]
pub struct ValidatedImage {
    /// SVG 等矢量图不解码
    pub image: Option<DynamicImage>,
    pub extension: String,
}

impl MediaValidator {
    pub fn from_settings(settings: &AssetSettings) -> Self {
        Self {
            image_extensions: settings.image_extensions.clone(),
            video_extensions: settings.video_extensions.clone(),
            audio_extensions: settings.audio_extensions.clone(),
            max_file_bytes: settings.max_file_bytes,
            min_width: settings.min_image_width,
            min_height: settings.min_image_height,
        }
    }

    fn allowed(&self, kind: MediaKind) -> &[String] {
        match kind {
            MediaKind::Image => &self.image_extensions,
            MediaKind::Video => &self.video_extensions,
            MediaKind::Audio => &self.audio_extensions,
        }
    }

    /// URL 路径的扩展名是否在任一白名单中
    pub fn is_valid_media_url(&self, url: &str) -> bool {
        file_extension(url)
            .map(|ext| {
                [MediaKind::Image, MediaKind::Video, MediaKind::Audio]
                    .iter()
                    .any(|kind| self.allowed(*kind).contains(&ext))
            })
            .unwrap_or(false)
    }

    fn check_size(&self, url: &str, len: usize) -> Result<(), ScrapeError> {
        if len as u64 > self.max_file_bytes {
            return Err(ScrapeError::download(
                url,
                format!("File size too large: {} bytes", len),
            ));
        }
        if len == 0 {
            return Err(ScrapeError::download(url, "Empty response body"));
        }
        Ok(())
    }

    /// 校验下载的图片
    ///
    /// 响应类型必须以 `image/` 开头，实际格式在白名单内，
    /// 解码后的尺寸不小于最小宽高。
    pub fn validate_image(
        &self,
        url: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<ValidatedImage, ScrapeError> {
        self.check_size(url, bytes.len())?;
        if !content_type.starts_with("image/") {
            return Err(ScrapeError::download(
                url,
                format!("Invalid content type: {}", content_type),
            ));
        }

        if content_type.starts_with("image/svg") {
            return self.require_allowed(url, MediaKind::Image, "svg").map(|ext| ValidatedImage {
                image: None,
                extension: ext,
            });
        }

        let format = image::guess_format(bytes)
            .map_err(|_| ScrapeError::download(url, "Unknown file type"))?;
        let extension = self.require_allowed(url, MediaKind::Image, format_extension(format))?;
        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| ScrapeError::download(url, format!("Corrupt or invalid image: {}", e)))?;
        let (width, height) = decoded.dimensions();
        if width < self.min_width || height < self.min_height {
            return Err(ScrapeError::download(
                url,
                format!("Image too small: {}x{}", width, height),
            ));
        }
        Ok(ValidatedImage {
            image: Some(decoded),
            extension,
        })
    }

    /// 校验音视频
    ///
    /// 返回文件扩展名。响应类型缺失或为通用二进制时按URL扩展名判断。
    pub fn validate_stream(
        &self,
        url: &str,
        content_type: &str,
        bytes: &[u8],
        kind: MediaKind,
    ) -> Result<String, ScrapeError> {
        self.check_size(url, bytes.len())?;
        let extension = if content_type.starts_with(kind.mime_prefix()) {
            let subtype = content_type[kind.mime_prefix().len()..]
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_lowercase();
            match subtype.as_str() {
                "quicktime" => "mov".to_string(),
                "x-matroska" => "mkv".to_string(),
                "x-msvideo" => "avi".to_string(),
                "mpeg" if kind == MediaKind::Audio => "mp3".to_string(),
                "x-wav" | "wave" => "wav".to_string(),
                other => other.to_string(),
            }
        } else if content_type.is_empty() || content_type.starts_with("application/octet-stream") {
            file_extension(url).unwrap_or_default()
        } else {
            return Err(ScrapeError::download(
                url,
                format!("Invalid content type: {}", content_type),
            ));
        };
        self.require_allowed(url, kind, &extension)
    }

    fn require_allowed(&self, url: &str, kind: MediaKind, ext: &str) -> Result<String, ScrapeError> {
        let ext = if ext == "jpeg" { "jpg" } else { ext };
        let allowed = self.allowed(kind);
        if allowed.iter().any(|a| a == ext || (ext == "jpg" && a == "jpeg")) {
            Ok(ext.to_string())
        } else {
            Err(ScrapeError::download(
                url,
                format!("Media type {} not allowed", ext),
            ))
        }
    }
}

struct ProcessedImage {
    bytes: Vec<u8>,
    extension: String,
    content_type: String,
    width: Option<u32>,
    height: Option<u32>,
    format: Option<String>,
    colors: Vec<DominantColor>,
    thumbnails: Vec<(&'static str, u32, u32, Vec<u8>)>,
}

/// 在阻塞线程池中完成解码后的处理
fn process_image(
    raw: Vec<u8>,
    content_type: String,
    validated: ValidatedImage,
    optimize: Option<OptimizeOptions>,
) -> ProcessedImage {
    let Some(image) = validated.image else {
        return ProcessedImage {
            bytes: raw,
            extension: validated.extension.clone(),
            content_type,
            width: None,
            height: None,
            format: Some(validated.extension),
            colors: Vec::new(),
            thumbnails: Vec::new(),
        };
    };

    let colors = dominant_colors(&image);
    let mut processed = ProcessedImage {
        width: Some(image.width()),
        height: Some(image.height()),
        format: Some(validated.extension.clone()),
        bytes: raw,
        extension: validated.extension,
        content_type,
        colors,
        thumbnails: Vec::new(),
    };

    let Some(options) = optimize else {
        return processed;
    };

    let resized = fit_inside(&image, options.max_width, options.max_height);
    if let Some(format) = options.format {
        match encode(&resized, format, options.quality) {
            Ok(bytes) => {
                processed.bytes = bytes;
                processed.extension = format.extension().to_string();
                processed.content_type = format.content_type().to_string();
                processed.format = Some(format.extension().to_string());
                processed.width = Some(resized.width());
                processed.height = Some(resized.height());
            }
            Err(e) => warn!("Image optimization failed, keeping original: {}", e),
        }
    }

    if options.thumbnails {
        let thumb_format = options
            .format
            .unwrap_or(TargetFormat::Jpeg);
        for (name, thumb) in thumbnails(&image) {
            match encode(&thumb, thumb_format, DEFAULT_QUALITY) {
                Ok(bytes) => processed
                    .thumbnails
                    .push((name, thumb.width(), thumb.height(), bytes)),
                Err(e) => warn!("Thumbnail {} failed: {}", name, e),
            }
        }
    }

    processed
}

/// 资源下载器
pub struct AssetDownloader {
    client: Client,
    storage: Arc<dyn StorageRepository>,
    validator: MediaValidator,
    settings: AssetSettings,
}

impl AssetDownloader {
    pub fn new(settings: AssetSettings, storage: Arc<dyn StorageRepository>) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.download_timeout_ms))
            .build()
            .map_err(|e| ScrapeError::Validation(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            storage,
            validator: MediaValidator::from_settings(&settings),
            settings,
        })
    }

    pub fn validator(&self) -> &MediaValidator {
        &self.validator
    }

    /// 下载原始字节，超过大小上限立即中止
    async fn fetch(&self, url: &str, accept: &str) -> Result<(Vec<u8>, String), ScrapeError> {
        let mut response = self
            .client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| ScrapeError::download(url, e))?;

        if !response.status().is_success() {
            return Err(ScrapeError::download(
                url,
                format!("HTTP {}", response.status().as_u16()),
            ));
        }
        if response
            .content_length()
            .is_some_and(|len| len > self.settings.max_file_bytes)
        {
            return Err(ScrapeError::download(url, "File size too large"));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ScrapeError::download(url, e))?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.settings.max_file_bytes {
                return Err(ScrapeError::download(url, "File size too large"));
            }
        }
        Ok((body, content_type))
    }

    async fn store(&self, url: &str, key: &str, bytes: &[u8]) -> Result<(), ScrapeError> {
        self.storage
            .save(key, bytes)
            .await
            .map_err(|e| ScrapeError::download(url, format!("Failed to store file: {}", e)))
    }

    /// 下载并处理单张图片
    pub async fn download_image(
        &self,
        url: &str,
        optimize: Option<&OptimizeOptions>,
    ) -> Result<BinaryMetadata, ScrapeError> {
        let (raw, content_type) = self.fetch(url, "image/*,*/*;q=0.8").await?;
        let original_hash = content_hash(&raw);

        // 解码与编码都是 CPU 密集操作
        let validator = self.validator.clone();
        let target = url.to_string();
        let optimize = optimize.cloned();
        let processed = tokio::task::spawn_blocking(move || {
            let validated = validator.validate_image(&target, &content_type, &raw)?;
            Ok::<_, ScrapeError>(process_image(raw, content_type, validated, optimize))
        })
        .await
        .map_err(|e| ScrapeError::download(url, format!("Image processing panicked: {}", e)))??;

        let file_name = storage_file_name(url, &processed.extension);
        let key = format!("images/{}", file_name);
        self.store(url, &key, &processed.bytes).await?;

        let stem = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| file_name.clone());
        let mut thumbs = Vec::new();
        for (name, width, height, bytes) in &processed.thumbnails {
            let ext = image::guess_format(bytes)
                .map(format_extension)
                .unwrap_or("jpg");
            let thumb_key = format!("images/thumbnails/{}_{}.{}", stem, name, ext);
            self.store(url, &thumb_key, bytes).await?;
            thumbs.push(Thumbnail {
                name: name.to_string(),
                width: *width,
                height: *height,
                storage_key: thumb_key,
            });
        }

        metrics::counter!("harvest_assets_downloaded_total", "kind" => "image").increment(1);
        debug!("Image stored at {}", key);

        Ok(BinaryMetadata {
            storage_key: key,
            content_type: processed.content_type,
            size_bytes: processed.bytes.len() as u64,
            content_hash: original_hash,
            width: processed.width,
            height: processed.height,
            format: processed.format,
            dominant_colors: processed.colors,
            thumbnails: thumbs,
        })
    }

    /// 下载单个视频文件
    pub async fn download_video(&self, url: &str) -> Result<BinaryMetadata, ScrapeError> {
        let (raw, content_type) = self
            .fetch(url, "video/mp4,video/webm,video/*,*/*")
            .await?;
        let extension = self
            .validator
            .validate_stream(url, &content_type, &raw, MediaKind::Video)?;

        let key = format!("videos/{}", storage_file_name(url, &extension));
        self.store(url, &key, &raw).await?;
        metrics::counter!("harvest_assets_downloaded_total", "kind" => "video").increment(1);

        Ok(BinaryMetadata {
            storage_key: key,
            content_type: if content_type.is_empty() {
                format!("video/{}", extension)
            } else {
                content_type
            },
            size_bytes: raw.len() as u64,
            content_hash: content_hash(&raw),
            format: Some(extension),
            ..Default::default()
        })
    }

    /// 分批下载图片
    ///
    /// 每批 `download_concurrency` 个并发，失败的条目保留发现信息并记入失败列表。
    pub async fn download_images(
        &self,
        images: Vec<ImageAsset>,
        optimize: Option<&OptimizeOptions>,
    ) -> (Vec<ImageAsset>, Vec<AssetFailure>) {
        let chunk_size = self.settings.download_concurrency.max(1);
        let mut done = Vec::with_capacity(images.len());
        let mut failures = Vec::new();

        let mut remaining = images.into_iter().peekable();
        while remaining.peek().is_some() {
            let batch: Vec<ImageAsset> = remaining.by_ref().take(chunk_size).collect();
            let results = join_all(
                batch
                    .iter()
                    .map(|image| self.download_image(&image.url, optimize)),
            )
            .await;
            for (mut image, result) in batch.into_iter().zip(results) {
                match result {
                    Ok(binary) => image.binary = Some(binary),
                    Err(e) => {
                        warn!("Failed to download image {}: {}", image.url, e);
                        failures.push(AssetFailure {
                            url: image.url.clone(),
                            error: e.to_string(),
                        });
                    }
                }
                done.push(image);
            }
        }
        (done, failures)
    }

    /// 分批下载视频
    ///
    /// 只下载原生与背景视频，平台嵌入视频原样保留。
    pub async fn download_videos(&self, videos: Vec<VideoAsset>) -> (Vec<VideoAsset>, Vec<AssetFailure>) {
        let chunk_size = self.settings.video_download_concurrency.max(1);
        let (embedded, downloadable): (Vec<_>, Vec<_>) = videos
            .into_iter()
            .partition(|v| v.source == VideoSourceKind::Embed);

        let mut done = Vec::with_capacity(downloadable.len() + embedded.len());
        let mut failures = Vec::new();
        for batch in downloadable.chunks(chunk_size) {
            let results = join_all(batch.iter().map(|video| self.download_video(&video.url))).await;
            for (video, result) in batch.iter().zip(results) {
                let mut video = video.clone();
                match result {
                    Ok(binary) => video.binary = Some(binary),
                    Err(e) => {
                        warn!("Failed to download video {}: {}", video.url, e);
                        failures.push(AssetFailure {
                            url: video.url.clone(),
                            error: e.to_string(),
                        });
                    }
                }
                done.push(video);
            }
        }
        done.extend(embedded);
        (done, failures)
    }
}

/// 读取布尔选项
pub(crate) fn option_flag(options: &Value, key: &str, default: bool) -> bool {
    options.get(key).and_then(Value::as_bool).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 200, 30])));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn validator() -> MediaValidator {
        MediaValidator::from_settings(&AssetSettings::default())
    }

    #[test]
    fn test_image_validation() {
        let v = validator();
        let ok = v
            .validate_image("https://a.test/x.png", "image/png", &png(200, 150))
            .unwrap();
        assert_eq!(ok.extension, "png");
        assert!(ok.image.is_some());

        let small = v.validate_image("https://a.test/x.png", "image/png", &png(50, 50));
        assert!(matches!(small, Err(ScrapeError::Download { .. })));

        let html = v.validate_image("https://a.test/x.png", "text/html", &png(200, 200));
        assert!(html.unwrap_err().to_string().contains("Invalid content type"));
    }

    #[test]
    fn test_custom_allow_list() {
        let settings = AssetSettings {
            image_extensions: vec!["jpg".to_string()],
            ..AssetSettings::default()
        };
        let v = MediaValidator::from_settings(&settings);
        let err = v
            .validate_image("https://a.test/x.png", "image/png", &png(200, 200))
            .unwrap_err();
        assert!(err.to_string().contains("not allowed"));
        assert!(!v.is_valid_media_url("https://a.test/x.png"));
        assert!(v.is_valid_media_url("https://a.test/clip.mp4"));
    }

    #[test]
    fn test_stream_validation() {
        let v = validator();
        assert_eq!(
            v.validate_stream("https://a.test/v", "video/mp4", b"....", MediaKind::Video)
                .unwrap(),
            "mp4"
        );
        assert_eq!(
            v.validate_stream(
                "https://a.test/clip.webm",
                "application/octet-stream",
                b"....",
                MediaKind::Video
            )
            .unwrap(),
            "webm"
        );
        assert!(v
            .validate_stream("https://a.test/v.flv", "video/x-flv", b"..", MediaKind::Video)
            .is_err());
        assert!(v
            .validate_stream("https://a.test/v.mp4", "video/mp4", b"", MediaKind::Video)
            .is_err());
    }
}
