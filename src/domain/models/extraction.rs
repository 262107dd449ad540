// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 抽取结果模型
//!
//! 这些结构不单独持久化，序列化后就是 `ScrapeJob.result`。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 结构化数据记录（JSON-LD、Microdata、Open Graph）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructuredData {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
}

/// 页面元数据
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub og_image: Option<String>,
    pub og_url: Option<String>,
    pub og_type: Option<String>,
    pub author: Option<String>,
    pub canonical: Option<String>,
}

/// 链接信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkInfo {
    pub url: String,
    pub text: String,
    pub is_internal: bool,
    pub is_no_follow: bool,
    pub position: usize,
}

/// 标题大纲条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub id: Option<String>,
    pub position: usize,
}

/// 社交平台链接
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
}

/// 联系方式（启发式，未经验证）
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContactInfo {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub addresses: Vec<String>,
}

/// 元素在页面中的位置标记
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlacementContext {
    pub in_header: bool,
    pub in_nav: bool,
    pub in_footer: bool,
    pub in_article: bool,
    pub in_sidebar: bool,
    pub near_text: bool,
    pub in_hero: bool,
    pub is_modal: bool,
}

/// 图片来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageSourceKind {
    Img,
    Background,
    Picture,
}

/// 颜色
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DominantColor {
    pub hex: String,
    pub rgb: [u8; 3],
    /// 占比（百分比，保留一位小数）
    pub ratio: f64,
}

/// 缩略图
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Thumbnail {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub storage_key: String,
}

/// 下载后的二进制元数据
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BinaryMetadata {
    pub storage_key: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub content_hash: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub dominant_colors: Vec<DominantColor>,
    pub thumbnails: Vec<Thumbnail>,
}

/// 页面图片引用
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    pub url: String,
    pub alt: Option<String>,
    pub title: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub class: Option<String>,
    pub source: ImageSourceKind,
    pub context: PlacementContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<BinaryMetadata>,
}

/// `<source>` 子元素
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaSource {
    pub url: String,
    pub mime_type: Option<String>,
    pub media: Option<String>,
}

/// 视频来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VideoSourceKind {
    Html5,
    Embed,
    Background,
}

/// 视频资源
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoAsset {
    pub url: String,
    pub source: VideoSourceKind,
    pub platform: Option<String>,
    pub video_id: Option<String>,
    pub thumbnail: Option<String>,
    pub poster: Option<String>,
    pub controls: bool,
    pub autoplay: bool,
    pub muted: bool,
    pub looped: bool,
    pub sources: Vec<MediaSource>,
    pub context: PlacementContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<BinaryMetadata>,
}

/// 文档链接
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAsset {
    pub url: String,
    pub text: String,
    pub extension: String,
    pub context: PlacementContext,
}

/// 音频资源
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioAsset {
    pub url: String,
    pub controls: bool,
    pub autoplay: bool,
    pub looped: bool,
    pub sources: Vec<MediaSource>,
    pub context: PlacementContext,
}

/// 单个资源处理失败记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetFailure {
    pub url: String,
    pub error: String,
}

/// 网站页面抽取结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub url: String,
    pub metadata: PageMetadata,
    pub links: Vec<LinkInfo>,
    pub images: Vec<ImageAsset>,
    pub headings: Vec<Heading>,
    pub technologies: Vec<String>,
    pub social_links: Vec<SocialLink>,
    pub contact_info: ContactInfo,
    pub structured_data: Vec<StructuredData>,
    pub content_hash: String,
    pub scraped_at: DateTime<Utc>,
}

/// 正文中的图片
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentImage {
    pub url: String,
    pub alt: Option<String>,
    pub caption: Option<String>,
    pub position: usize,
}

/// 内容页元数据
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub canonical: Option<String>,
    pub robots: Option<String>,
    pub viewport: Option<String>,
    pub language: Option<String>,
    pub charset: Option<String>,
}

/// 社交互动信号
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SocialMetrics {
    pub shares: u64,
    pub social_links: Vec<SocialLink>,
}

/// 面包屑
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Breadcrumb {
    pub text: String,
    pub url: Option<String>,
}

/// 内容结构统计
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentStructure {
    pub paragraphs: usize,
    pub lists: usize,
    pub list_items: usize,
    pub tables: usize,
    pub blockquotes: usize,
    pub code_blocks: usize,
    /// h1..h6 各级标题数量
    pub headings: BTreeMap<String, usize>,
}

/// 文章内容抽取结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentResult {
    pub url: String,
    pub title: String,
    /// 内容区域选择器得到的原始文本
    pub content: String,
    /// 可读性算法清洗后的文本
    pub clean_content: String,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub modified_date: Option<String>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub images: Vec<ContentImage>,
    pub links: Vec<LinkInfo>,
    pub headings: Vec<Heading>,
    pub structured_data: Vec<StructuredData>,
    pub metadata: ContentMetadata,
    pub social_metrics: SocialMetrics,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub structure: ContentStructure,
    pub word_count: usize,
    pub character_count: usize,
    pub reading_time: usize,
    pub content_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<serde_json::Value>,
    pub scraped_at: DateTime<Utc>,
}

/// 资源统计
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetSummary {
    pub images: usize,
    pub videos: usize,
    pub documents: usize,
    pub audio: usize,
    pub downloaded: usize,
    pub failed: usize,
}

/// 资源发现结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetResult {
    pub url: String,
    pub images: Vec<ImageAsset>,
    pub videos: Vec<VideoAsset>,
    pub documents: Vec<DocumentAsset>,
    pub audio: Vec<AudioAsset>,
    pub failures: Vec<AssetFailure>,
    pub summary: AssetSummary,
    pub scraped_at: DateTime<Utc>,
}
