// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 图片发现、过滤与二进制处理

use std::collections::{HashMap, HashSet};
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde_json::Value;

use crate::domain::models::extraction::{DominantColor, ImageAsset, ImageSourceKind};
use crate::extractors::dom::{closest, parse_dimension, placement_context, select, select_in};
use crate::utils::url_utils::{dedup_key, file_extension, normalize_url};

static BACKGROUND_IMAGE_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"background-image:\s*url\(['"]?([^'")]+)['"]?\)"#).ok()
});

/// 缩略图尺寸（名称, 边长）
pub const THUMBNAIL_SIZES: [(&str, u32); 3] = [("small", 256), ("medium", 512), ("large", 1024)];

/// 重新编码的默认质量
pub const DEFAULT_QUALITY: u8 = 80;

/// 发现页面中的图片
///
/// 来源包括 `<img>`（`src`、`data-src`、`data-lazy`）、内联样式中的
/// `background-image` 与 `<picture><source srcset>`。结果按规范化URL去重。
pub fn discover_images(document: &Html, base_url: &str) -> Vec<ImageAsset> {
    let mut images = Vec::new();

    for img in select(document, "img") {
        let attrs = img.value();
        let Some(src) = ["src", "data-src", "data-lazy"]
            .iter()
            .find_map(|name| attrs.attr(name).map(str::trim).filter(|v| !v.is_empty()))
        else {
            continue;
        };
        if src.starts_with("data:") {
            continue;
        }
        images.push(ImageAsset {
            url: normalize_url(src, Some(base_url)),
            alt: non_empty(attrs.attr("alt")),
            title: non_empty(attrs.attr("title")),
            width: parse_dimension(attrs.attr("width")),
            height: parse_dimension(attrs.attr("height")),
            class: non_empty(attrs.attr("class")),
            source: ImageSourceKind::Img,
            context: placement_context(img),
            binary: None,
        });
    }

    if let Some(re) = BACKGROUND_IMAGE_RE.as_ref() {
        for el in select(document, "[style*=\"background-image\"]") {
            let style = el.value().attr("style").unwrap_or_default();
            let Some(captures) = re.captures(style) else {
                continue;
            };
            images.push(ImageAsset {
                url: normalize_url(&captures[1], Some(base_url)),
                alt: non_empty(el.value().attr("aria-label")),
                title: non_empty(el.value().attr("title")),
                width: None,
                height: None,
                class: non_empty(el.value().attr("class")),
                source: ImageSourceKind::Background,
                context: placement_context(el),
                binary: None,
            });
        }
    }

    for source in select(document, "picture source[srcset]") {
        let srcset = source.value().attr("srcset").unwrap_or_default();
        let alt = closest(source, "picture")
            .and_then(|picture| select_in(picture, "img").into_iter().next())
            .and_then(|img| non_empty(img.value().attr("alt")));
        for candidate in srcset_urls(srcset) {
            images.push(ImageAsset {
                url: normalize_url(candidate, Some(base_url)),
                alt: alt.clone(),
                title: non_empty(source.value().attr("title")),
                width: None,
                height: None,
                class: None,
                source: ImageSourceKind::Picture,
                context: placement_context(source),
                binary: None,
            });
        }
    }

    dedup_images(images)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `srcset` 中的候选URL
pub fn srcset_urls(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
}

/// 按规范化URL去重，保留首次出现的条目
pub fn dedup_images(images: Vec<ImageAsset>) -> Vec<ImageAsset> {
    let mut seen = HashSet::new();
    images
        .into_iter()
        .filter(|img| seen.insert(dedup_key(&img.url)))
        .collect()
}

/// 图片过滤条件
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFilter {
    pub min_width: u32,
    pub min_height: u32,
    pub exclude_navigation: bool,
    pub exclude_header: bool,
    pub exclude_footer: bool,
    /// 只保留正文中或紧邻文本的图片
    pub content_images_only: bool,
    /// 允许的扩展名，为空时不过滤
    pub allowed_types: Vec<String>,
    /// 排除图标与小尺寸 logo
    pub exclude_small_images: bool,
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self {
            min_width: 0,
            min_height: 0,
            exclude_navigation: false,
            exclude_header: false,
            exclude_footer: false,
            content_images_only: false,
            allowed_types: Vec::new(),
            exclude_small_images: true,
        }
    }
}

impl ImageFilter {
    /// 从任务选项读取过滤条件
    ///
    /// 识别 `minWidth`、`minHeight`、`excludeNavigation`、`excludeHeader`、
    /// `excludeFooter`、`contentImagesOnly`、`allowedTypes`、`excludeSmallImages`。
    pub fn from_options(options: &Value) -> Self {
        let flag = |key: &str, default: bool| {
            options.get(key).and_then(Value::as_bool).unwrap_or(default)
        };
        let dimension = |key: &str| {
            options
                .get(key)
                .and_then(Value::as_u64)
                .map(|v| v.min(u32::MAX as u64) as u32)
                .unwrap_or(0)
        };
        Self {
            min_width: dimension("minWidth"),
            min_height: dimension("minHeight"),
            exclude_navigation: flag("excludeNavigation", false),
            exclude_header: flag("excludeHeader", false),
            exclude_footer: flag("excludeFooter", false),
            content_images_only: flag("contentImagesOnly", false),
            allowed_types: options
                .get("allowedTypes")
                .and_then(Value::as_array)
                .map(|types| {
                    types
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_lowercase)
                        .collect()
                })
                .unwrap_or_default(),
            exclude_small_images: flag("excludeSmallImages", true),
        }
    }

    /// 应用过滤条件
    ///
    /// 最小尺寸按声明的宽高判断，未声明的按 0 处理。
    pub fn apply(&self, images: Vec<ImageAsset>) -> Vec<ImageAsset> {
        images.into_iter().filter(|img| self.accepts(img)).collect()
    }

    pub fn accepts(&self, image: &ImageAsset) -> bool {
        if (self.min_width > 0 || self.min_height > 0)
            && (image.width.unwrap_or(0) < self.min_width
                || image.height.unwrap_or(0) < self.min_height)
        {
            return false;
        }
        let ctx = &image.context;
        if (self.exclude_navigation && ctx.in_nav)
            || (self.exclude_header && ctx.in_header)
            || (self.exclude_footer && ctx.in_footer)
        {
            return false;
        }
        if self.content_images_only && !(ctx.in_article || ctx.near_text) {
            return false;
        }
        if !self.allowed_types.is_empty() {
            let ext = file_extension(&image.url).unwrap_or_default();
            if !self.allowed_types.contains(&ext) {
                return false;
            }
        }
        !(self.exclude_small_images && is_icon(image))
    }
}

/// 图标或小尺寸 logo
///
/// URL 含 `icon`/`favicon`，或含 `logo` 且声明的宽或高小于 100。
pub fn is_icon(image: &ImageAsset) -> bool {
    let url = image.url.to_lowercase();
    if url.contains("icon") || url.contains("favicon") {
        return true;
    }
    url.contains("logo") && (image.width.unwrap_or(0) < 100 || image.height.unwrap_or(0) < 100)
}

/// 重新编码的目标格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Webp,
    Jpeg,
    Png,
}

impl TargetFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "webp" => Some(Self::Webp),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Webp => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// 下载后的优化选项
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeOptions {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub format: Option<TargetFormat>,
    pub quality: u8,
    pub thumbnails: bool,
}

impl OptimizeOptions {
    /// 读取 `optimize`、`maxWidth`、`maxHeight`、`format`、`quality`、`generateThumbnails`
    ///
    /// 未开启 `optimize` 时返回 `None`。
    pub fn from_options(options: &Value) -> Option<Self> {
        let optimize = options.get("optimize").and_then(Value::as_bool).unwrap_or(false);
        let thumbnails = options
            .get("generateThumbnails")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !optimize && !thumbnails {
            return None;
        }
        let dimension = |key: &str| {
            options
                .get(key)
                .and_then(Value::as_u64)
                .map(|v| v.min(u32::MAX as u64) as u32)
        };
        Some(Self {
            max_width: optimize.then(|| dimension("maxWidth")).flatten(),
            max_height: optimize.then(|| dimension("maxHeight")).flatten(),
            format: optimize
                .then(|| options.get("format").and_then(Value::as_str))
                .flatten()
                .and_then(TargetFormat::parse),
            quality: options
                .get("quality")
                .and_then(Value::as_u64)
                .map(|q| q.clamp(1, 100) as u8)
                .unwrap_or(DEFAULT_QUALITY),
            thumbnails,
        })
    }
}

/// 按比例缩放到不超过给定尺寸，不放大
pub fn fit_inside(image: &DynamicImage, max_width: Option<u32>, max_height: Option<u32>) -> DynamicImage {
    let (width, height) = image.dimensions();
    let max_w = max_width.unwrap_or(width).max(1);
    let max_h = max_height.unwrap_or(height).max(1);
    if width <= max_w && height <= max_h {
        return image.clone();
    }
    image.resize(max_w, max_h, FilterType::Lanczos3)
}

/// 编码为目标格式
///
/// WebP 编码器只支持无损模式，`quality` 仅对 JPEG 生效。
pub fn encode(image: &DynamicImage, format: TargetFormat, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    match format {
        TargetFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))?;
        }
        TargetFormat::Png => {
            image.write_with_encoder(PngEncoder::new(&mut buffer))?;
        }
        TargetFormat::Webp => {
            let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut buffer))?;
        }
    }
    Ok(buffer.into_inner())
}

/// 识别二进制格式对应的扩展名
pub fn format_extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Png => "png",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Ico => "ico",
        ImageFormat::Avif => "avif",
        _ => "bin",
    }
}

/// 主色调
///
/// 缩放到 64x64 后按 32 级量化每个通道，返回出现最多的 6 种颜色及其占比。
pub fn dominant_colors(image: &DynamicImage) -> Vec<DominantColor> {
    let sample = image.resize_exact(64, 64, FilterType::Nearest).to_rgb8();
    let total = sample.pixels().len();
    if total == 0 {
        return Vec::new();
    }

    let mut buckets: HashMap<[u8; 3], usize> = HashMap::new();
    for pixel in sample.pixels() {
        let [r, g, b] = pixel.0;
        *buckets.entry([r / 32 * 32, g / 32 * 32, b / 32 * 32]).or_default() += 1;
    }

    let mut ranked: Vec<_> = buckets.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(6)
        .map(|(rgb, count)| DominantColor {
            hex: format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2]),
            rgb,
            ratio: (count as f64 / total as f64 * 1000.0).round() / 10.0,
        })
        .collect()
}

/// 缩略图（small 256、medium 512、large 1024，等比缩放到边长以内）
///
/// 原图比目标尺寸小时跳过对应档位。
pub fn thumbnails(image: &DynamicImage) -> Vec<(&'static str, DynamicImage)> {
    let (width, height) = image.dimensions();
    THUMBNAIL_SIZES
        .iter()
        .filter(|(_, size)| width > *size || height > *size)
        .map(|(name, size)| (*name, image.thumbnail(*size, *size)))
        .collect()
}
