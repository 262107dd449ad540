// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 文章内容抽取
//!
//! 文本类字段在移除脚本、导航、页头页脚、侧栏与广告之后的文档上计算；
//! 元数据、结构化数据与面包屑使用完整文档。

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::models::extraction::{
    Breadcrumb, ContentImage, ContentMetadata, ContentResult, ContentStructure, SocialLink,
    SocialMetrics, StructuredData,
};
use crate::domain::services::text_analysis::TextAnalyzer;
use crate::engines::browser_session::LoadedPage;
use crate::extractors::dom::{
    clean_whitespace, closest, first, first_attr, first_text, meta_content, select, select_in,
    strip_elements, visible_text,
};
use crate::extractors::page::{collect_links, extract_headings, social_platform, split_list};
use crate::extractors::PageFetcher;
use crate::utils::errors::ScrapeError;
use crate::utils::hashing::content_hash;
use crate::utils::structured_data::{extract_structured_data, find_json_ld_field};
use crate::utils::url_utils::{dedup_key, normalize_url};

/// 抽取前移除的元素
pub const BOILERPLATE_SELECTOR: &str =
    "script, style, noscript, nav, header, footer, aside, .advertisement, .ad, .social-share";

/// 阅读速度（词/分钟）
pub const WORDS_PER_MINUTE: usize = 200;

const TITLE_SELECTORS: [&str; 8] = [
    "h1.entry-title",
    "h1.post-title",
    "h1.article-title",
    ".entry-header h1",
    ".post-header h1",
    "article h1",
    "h1",
    "title",
];

const CONTENT_SELECTORS: [&str; 13] = [
    "article .entry-content",
    "article .post-content",
    "article .content",
    ".entry-content",
    ".post-content",
    ".article-content",
    ".content-body",
    "main article",
    "main .content",
    "[role=\"main\"] article",
    "article",
    ".post",
    ".entry",
];

const AUTHOR_SELECTORS: [&str; 7] = [
    ".author .name",
    ".by-author",
    ".post-author",
    ".entry-author",
    "[rel=\"author\"]",
    ".author",
    "[itemprop=\"author\"]",
];

const PUBLISHED_SELECTORS: [&str; 7] = [
    "time[datetime][pubdate]",
    "time[datetime]",
    ".published",
    ".post-date",
    ".entry-date",
    ".publish-date",
    "[itemprop=\"datePublished\"]",
];

const PUBLISHED_META: [&str; 3] = [
    "meta[property=\"article:published_time\"]",
    "meta[name=\"pubdate\"]",
    "meta[name=\"date\"]",
];

const MODIFIED_SELECTORS: [&str; 4] = [
    "time[datetime][class*=\"modified\"]",
    ".modified",
    ".updated",
    "[itemprop=\"dateModified\"]",
];

const TAG_SELECTORS: [&str; 7] = [
    ".tags a",
    ".tag a",
    ".post-tags a",
    ".entry-tags a",
    "[rel=\"tag\"]",
    ".hashtag",
    "[itemprop=\"keywords\"]",
];

const CATEGORY_SELECTORS: [&str; 5] = [
    ".categories a",
    ".category a",
    ".post-categories a",
    ".entry-categories a",
    "[rel=\"category\"]",
];

const CONTENT_IMAGE_SELECTORS: [&str; 5] = [
    "article img",
    ".entry-content img",
    ".post-content img",
    ".content img",
    "main img",
];

const CONTENT_LINK_SELECTORS: [&str; 5] = [
    "article a[href]",
    ".entry-content a[href]",
    ".post-content a[href]",
    ".content a[href]",
    "main a[href]",
];

const BREADCRUMB_SELECTORS: [&str; 4] = [
    ".breadcrumb a",
    ".breadcrumbs a",
    "[role=\"navigation\"] a",
    ".navigation a",
];

const SHARE_SELECTORS: [&str; 3] = [".share-count", ".social-count", "[data-share-count]"];

/// 内容页统计的社交平台
const CONTENT_SOCIAL_PLATFORMS: [&str; 5] =
    ["facebook", "twitter", "linkedin", "instagram", "youtube"];

static ISO_DATE_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").ok());

/// 抽取文章内容
///
/// # 参数
///
/// * `html` - 渲染后的 HTML
/// * `url` - 页面最终URL
pub fn extract_content(html: &str, url: &str) -> ContentResult {
    let full = Html::parse_document(html);
    let mut stripped = full.clone();
    strip_elements(&mut stripped, BOILERPLATE_SELECTOR);

    let structured_data = extract_structured_data(&full);
    let content = extract_main_content(&stripped);
    let clean_content = extract_readable_content(&stripped, url, &content);
    let word_count = count_words(&clean_content);

    ContentResult {
        url: url.to_string(),
        title: extract_title(&stripped),
        author: extract_author(&stripped, &full, &structured_data),
        published_date: extract_date(&stripped, &full, &PUBLISHED_SELECTORS, &PUBLISHED_META)
            .or_else(|| json_ld_date(&structured_data, "datePublished")),
        modified_date: extract_date(
            &stripped,
            &full,
            &MODIFIED_SELECTORS,
            &["meta[property=\"article:modified_time\"]"],
        )
        .or_else(|| json_ld_date(&structured_data, "dateModified")),
        tags: extract_tags(&stripped, &full),
        categories: extract_categories(&stripped, &structured_data),
        images: extract_content_images(&stripped, url),
        links: collect_links(
            CONTENT_LINK_SELECTORS
                .iter()
                .flat_map(|css| select(&stripped, css)),
            url,
        ),
        headings: extract_headings(&stripped),
        metadata: extract_content_metadata(&full, url),
        social_metrics: extract_social_metrics(&full, url),
        breadcrumbs: extract_breadcrumbs(&full, url),
        structure: analyze_structure(&stripped),
        word_count,
        character_count: clean_content.chars().count(),
        reading_time: reading_time(word_count),
        content_hash: content_hash(&clean_content),
        structured_data,
        content,
        clean_content,
        analysis: None,
        scraped_at: Utc::now(),
    }
}

/// 标题：文章标题类选择器、`h1`、`<title>`，最后是 OG/Twitter 标题
pub fn extract_title(document: &Html) -> String {
    first_text(document, &TITLE_SELECTORS)
        .or_else(|| meta_content(document, "meta[property=\"og:title\"]"))
        .or_else(|| meta_content(document, "meta[name=\"twitter:title\"]"))
        .map(|t| clean_whitespace(&t))
        .unwrap_or_default()
}

fn joined_text(elements: Vec<ElementRef<'_>>) -> String {
    clean_whitespace(
        &elements
            .into_iter()
            .map(visible_text)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// 主体内容：各内容区域选择器中文本最长的一个，都没有时取 `<body>`
pub fn extract_main_content(document: &Html) -> String {
    let best = CONTENT_SELECTORS
        .iter()
        .map(|css| joined_text(select(document, css)))
        .max_by_key(|text| text.len())
        .unwrap_or_default();
    if !best.is_empty() {
        return best;
    }
    first(document, "body").map(visible_text).unwrap_or_default()
}

/// 可读性清洗后的文本
///
/// 算法失败或结果为空时回退到主体内容。
pub fn extract_readable_content(document: &Html, url: &str, fallback: &str) -> String {
    let Ok(base) = Url::parse(url) else {
        return fallback.to_string();
    };
    let html = document.html();
    match readability::extractor::extract(&mut html.as_bytes(), &base) {
        Ok(product) => {
            let text = clean_whitespace(&product.text);
            if text.is_empty() {
                fallback.to_string()
            } else {
                text
            }
        }
        Err(e) => {
            debug!("Readability extraction failed for {}, using main content: {}", url, e);
            fallback.to_string()
        }
    }
}

/// 空白分词的词数
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// 阅读时间（分钟，向上取整）
pub fn reading_time(word_count: usize) -> usize {
    word_count.div_ceil(WORDS_PER_MINUTE)
}

fn json_ld_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
        Value::Array(items) => items.iter().find_map(json_ld_name),
        _ => None,
    }
    .map(|s| clean_whitespace(&s))
    .filter(|s| !s.is_empty())
}

/// 作者：选择器回退链、`meta[name=author]`、JSON-LD `author`
pub fn extract_author(
    stripped: &Html,
    full: &Html,
    structured_data: &[StructuredData],
) -> Option<String> {
    first_text(stripped, &AUTHOR_SELECTORS)
        .or_else(|| meta_content(full, "meta[name=\"author\"]"))
        .map(|a| clean_whitespace(&a))
        .or_else(|| find_json_ld_field(structured_data, "author").and_then(json_ld_name))
}

/// 解析常见日期格式，输出 RFC 3339（UTC，毫秒精度）
pub fn parse_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let format = |dt: DateTime<Utc>| dt.to_rfc3339_opts(SecondsFormat::Millis, true);

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(format(dt.with_timezone(&Utc)));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(format(dt.with_timezone(&Utc)));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(format(naive.and_utc()));
        }
    }
    for pattern in ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%m/%d/%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, pattern) {
            return date.and_hms_opt(0, 0, 0).map(|naive| format(naive.and_utc()));
        }
    }

    let captures = ISO_DATE_RE.as_ref()?.captures(raw)?;
    NaiveDate::parse_from_str(captures.get(0)?.as_str(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| format(naive.and_utc()))
}

fn extract_date(stripped: &Html, full: &Html, selectors: &[&str], metas: &[&str]) -> Option<String> {
    selectors
        .iter()
        .find_map(|css| {
            let el = first(stripped, css)?;
            let value = el
                .value()
                .attr("datetime")
                .or_else(|| el.value().attr("content"))
                .map(str::to_string)
                .unwrap_or_else(|| visible_text(el));
            parse_date(&value)
        })
        .or_else(|| {
            metas
                .iter()
                .find_map(|css| meta_content(full, css).and_then(|v| parse_date(&v)))
        })
}

fn json_ld_date(
    structured_data: &[StructuredData],
    field: &str,
) -> Option<String> {
    find_json_ld_field(structured_data, field)
        .and_then(Value::as_str)
        .and_then(parse_date)
}

fn collect_unique(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|v| clean_whitespace(&v))
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// 标签：标签链接与 `meta[name=keywords]`
pub fn extract_tags(stripped: &Html, full: &Html) -> Vec<String> {
    let from_dom = TAG_SELECTORS
        .iter()
        .flat_map(|css| select(stripped, css))
        .map(|el| {
            el.value()
                .attr("content")
                .map(str::to_string)
                .unwrap_or_else(|| visible_text(el))
        });
    let from_meta = meta_content(full, "meta[name=\"keywords\"]")
        .map(|raw| split_list(&raw))
        .unwrap_or_default();
    collect_unique(from_dom.chain(from_meta))
}

/// 分类：分类链接与 JSON-LD `articleSection`
pub fn extract_categories(
    stripped: &Html,
    structured_data: &[StructuredData],
) -> Vec<String> {
    let from_dom = CATEGORY_SELECTORS
        .iter()
        .flat_map(|css| select(stripped, css))
        .map(visible_text);
    let from_json_ld = match find_json_ld_field(structured_data, "articleSection") {
        Some(Value::String(section)) => vec![section.clone()],
        Some(Value::Array(sections)) => sections
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    collect_unique(from_dom.chain(from_json_ld))
}

fn image_caption(img: ElementRef<'_>) -> Option<String> {
    if let Some(figure) = closest(img, "figure") {
        let caption = joined_text(select_in(figure, "figcaption"));
        if !caption.is_empty() {
            return Some(caption);
        }
    }
    let parent = img.parent().and_then(ElementRef::wrap)?;
    let caption = joined_text(select_in(parent, ".caption, .wp-caption-text"));
    (!caption.is_empty()).then_some(caption)
}

/// 正文图片，按规范化URL去重，`position` 为去重后的顺序号
pub fn extract_content_images(document: &Html, url: &str) -> Vec<ContentImage> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();
    for img in CONTENT_IMAGE_SELECTORS.iter().flat_map(|css| select(document, css)) {
        let attrs = img.value();
        let Some(src) = ["src", "data-src", "data-lazy"]
            .iter()
            .find_map(|name| attrs.attr(name).map(str::trim).filter(|v| !v.is_empty()))
        else {
            continue;
        };
        let normalized = normalize_url(src, Some(url));
        if !seen.insert(dedup_key(&normalized)) {
            continue;
        }
        images.push(ContentImage {
            url: normalized,
            alt: attrs.attr("alt").map(str::to_string).filter(|a| !a.is_empty()),
            caption: image_caption(img),
            position: images.len(),
        });
    }
    images
}

/// 内容页元数据
pub fn extract_content_metadata(document: &Html, url: &str) -> ContentMetadata {
    ContentMetadata {
        title: first_text(document, &["title"]),
        description: meta_content(document, "meta[name=\"description\"]"),
        keywords: meta_content(document, "meta[name=\"keywords\"]")
            .map(|raw| split_list(&raw))
            .unwrap_or_default(),
        canonical: first_attr(document, &[("link[rel=\"canonical\"]", "href")])
            .map(|href| normalize_url(&href, Some(url))),
        robots: meta_content(document, "meta[name=\"robots\"]"),
        viewport: meta_content(document, "meta[name=\"viewport\"]"),
        language: first_attr(
            document,
            &[
                ("html", "lang"),
                ("meta[http-equiv=\"content-language\"]", "content"),
            ],
        ),
        charset: first_attr(
            document,
            &[
                ("meta[charset]", "charset"),
                ("meta[http-equiv=\"content-type\"]", "content"),
            ],
        ),
    }
}

fn digits(text: &str) -> u64 {
    let only: String = text.chars().filter(char::is_ascii_digit).collect();
    only.parse().unwrap_or(0)
}

/// 社交互动信号：分享计数之和与五个平台的链接
pub fn extract_social_metrics(document: &Html, url: &str) -> SocialMetrics {
    let shares = SHARE_SELECTORS
        .iter()
        .flat_map(|css| select(document, css))
        .map(|el| {
            el.value()
                .attr("data-share-count")
                .map(digits)
                .filter(|count| *count > 0)
                .unwrap_or_else(|| digits(&visible_text(el)))
        })
        .fold(0u64, u64::saturating_add);

    let mut seen = HashSet::new();
    let social_links = select(document, "a[href]")
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .map(|href| normalize_url(href, Some(url)))
        .filter_map(|href| {
            let platform = social_platform(&href)?;
            (CONTENT_SOCIAL_PLATFORMS.contains(&platform) && seen.insert(dedup_key(&href))).then(
                || SocialLink {
                    platform: platform.to_string(),
                    url: href,
                },
            )
        })
        .collect();

    SocialMetrics {
        shares,
        social_links,
    }
}

/// 面包屑：使用第一个有结果的选择器
pub fn extract_breadcrumbs(document: &Html, url: &str) -> Vec<Breadcrumb> {
    BREADCRUMB_SELECTORS
        .iter()
        .map(|css| {
            select(document, css)
                .into_iter()
                .filter_map(|a| {
                    let text = visible_text(a);
                    let href = a.value().attr("href")?;
                    (!text.is_empty()).then(|| Breadcrumb {
                        text,
                        url: Some(normalize_url(href, Some(url))),
                    })
                })
                .collect::<Vec<_>>()
        })
        .find(|crumbs| !crumbs.is_empty())
        .unwrap_or_default()
}

/// 内容结构统计
pub fn analyze_structure(document: &Html) -> ContentStructure {
    let count = |css: &str| select(document, css).len();
    let headings: BTreeMap<String, usize> = (1..=6)
        .map(|level| (format!("h{}", level), count(&format!("h{}", level))))
        .collect();
    ContentStructure {
        paragraphs: count("p"),
        lists: count("ul, ol"),
        list_items: count("li"),
        tables: count("table"),
        blockquotes: count("blockquote"),
        code_blocks: count("pre, code"),
        headings,
    }
}

/// 内容抽取器
///
/// 配置了文本分析器时，抽取结果会在超时限制内附加 `analysis` 字段；
/// 分析失败或超时只记录日志。
pub struct ContentExtractor {
    fetcher: Arc<PageFetcher>,
    analyzer: Option<Arc<dyn TextAnalyzer>>,
    analysis_timeout: Duration,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<PageFetcher>) -> Self {
        Self {
            fetcher,
            analyzer: None,
            analysis_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn TextAnalyzer>, timeout: Duration) -> Self {
        self.analyzer = Some(analyzer);
        self.analysis_timeout = timeout;
        self
    }

    pub fn fetcher(&self) -> &PageFetcher {
        &self.fetcher
    }

    /// 解析已加载的页面
    pub async fn parse(&self, page: LoadedPage) -> Result<ContentResult, ScrapeError> {
        // 解析与可读性算法都是同步 CPU 操作
        tokio::task::spawn_blocking(move || extract_content(&page.html, &page.url))
            .await
            .map_err(|e| ScrapeError::Extraction(format!("Content extraction panicked: {}", e)))
    }

    /// 附加文本分析结果
    ///
    /// # 返回值
    ///
    /// 成功附加分析结果时返回 true
    pub async fn enrich(&self, result: &mut ContentResult) -> bool {
        let Some(analyzer) = &self.analyzer else {
            return false;
        };
        if result.clean_content.is_empty() {
            return false;
        }
        match tokio::time::timeout(self.analysis_timeout, analyzer.analyze(&result.clean_content)).await {
            Ok(Ok(analysis)) => {
                result.analysis = Some(analysis);
                true
            }
            Ok(Err(e)) => {
                warn!("Text analysis failed for {}: {:#}", result.url, e);
                false
            }
            Err(_) => {
                warn!(
                    "Text analysis timed out after {}s for {}",
                    self.analysis_timeout.as_secs(),
                    result.url
                );
                false
            }
        }
    }

    /// 加载、解析并分析页面内容
    pub async fn extract(&self, url: &str, options: &Value) -> Result<ContentResult, ScrapeError> {
        let page = self.fetcher.fetch(url, options).await?;
        let mut result = self.parse(page).await?;
        self.enrich(&mut result).await;
        info!(
            "Content scrape completed for: {} ({} words)",
            url, result.word_count
        );
        Ok(result)
    }
}
