// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 网站页面抽取
//!
//! 元数据回退链、链接分类、图片清单、标题大纲、社交链接、
//! 联系方式与技术指纹。所有规则都是启发式的，取不到时返回空值而不报错。

use std::collections::HashSet;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};

use crate::domain::models::extraction::{
    ContactInfo, Heading, LinkInfo, PageMetadata, PageResult, SocialLink,
};
use crate::extractors::assets::images::discover_images;
use crate::extractors::dom::{first, first_attr, first_text, meta_content, select, visible_text};
use crate::utils::hashing::content_hash;
use crate::utils::structured_data::extract_structured_data;
use crate::utils::url_utils::{dedup_key, extract_domain, is_same_domain, normalize_url};

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").ok());

static PHONE_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(\+?\d{1,3}[-.\s]?)?\(?\d{2,4}\)?[-.\s]?\d{3,4}[-.\s]?\d{3,4}").ok()
});

/// 社交平台（域名, 平台名）
pub const SOCIAL_PLATFORMS: [(&str, &str); 9] = [
    ("facebook.com", "facebook"),
    ("twitter.com", "twitter"),
    ("x.com", "twitter"),
    ("linkedin.com", "linkedin"),
    ("instagram.com", "instagram"),
    ("youtube.com", "youtube"),
    ("tiktok.com", "tiktok"),
    ("pinterest.com", "pinterest"),
    ("github.com", "github"),
];

const ADDRESS_SELECTORS: [&str; 4] = [
    "[itemprop=\"address\"]",
    ".address",
    "#address",
    ".contact-address",
];

/// 抽取网站页面
///
/// # 参数
///
/// * `html` - 渲染后的 HTML
/// * `url` - 页面最终URL，用作相对链接的基准
///
/// # 返回值
///
/// 页面抽取结果
pub fn extract_page(html: &str, url: &str) -> PageResult {
    let document = Html::parse_document(html);
    let body_text = first(&document, "body").map(visible_text).unwrap_or_default();

    PageResult {
        url: url.to_string(),
        metadata: extract_metadata(&document, url),
        links: extract_links(&document, url),
        images: discover_images(&document, url),
        headings: extract_headings(&document),
        technologies: detect_technologies(&document),
        social_links: extract_social_links(&document, url),
        contact_info: extract_contact_info(&document, &body_text),
        structured_data: extract_structured_data(&document),
        content_hash: content_hash(&body_text),
        scraped_at: Utc::now(),
    }
}

/// 页面元数据
///
/// 标题与描述按 `<title>`/meta、Open Graph、Twitter Card 的顺序回退。
pub fn extract_metadata(document: &Html, url: &str) -> PageMetadata {
    let title = first_text(document, &["title"])
        .or_else(|| meta_content(document, "meta[property=\"og:title\"]"))
        .or_else(|| meta_content(document, "meta[name=\"twitter:title\"]"));
    let description = meta_content(document, "meta[name=\"description\"]")
        .or_else(|| meta_content(document, "meta[property=\"og:description\"]"))
        .or_else(|| meta_content(document, "meta[name=\"twitter:description\"]"));
    let keywords = meta_content(document, "meta[name=\"keywords\"]")
        .map(|raw| split_list(&raw))
        .unwrap_or_default();

    PageMetadata {
        title,
        description,
        keywords,
        og_image: meta_content(document, "meta[property=\"og:image\"]")
            .map(|src| normalize_url(&src, Some(url))),
        og_url: meta_content(document, "meta[property=\"og:url\"]"),
        og_type: meta_content(document, "meta[property=\"og:type\"]"),
        author: meta_content(document, "meta[name=\"author\"]"),
        canonical: first_attr(document, &[("link[rel=\"canonical\"]", "href")])
            .map(|href| normalize_url(&href, Some(url))),
    }
}

/// 逗号分隔的列表
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 页面中的所有链接
///
/// 只保留 http(s) 链接，按规范化URL去重，`position` 为去重后的顺序号。
pub fn extract_links(document: &Html, url: &str) -> Vec<LinkInfo> {
    collect_links(select(document, "a[href]"), url)
}

pub(crate) fn collect_links<'a>(
    anchors: impl IntoIterator<Item = ElementRef<'a>>,
    url: &str,
) -> Vec<LinkInfo> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in anchors {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let normalized = normalize_url(href, Some(url));
        if !normalized.starts_with("http://") && !normalized.starts_with("https://") {
            continue;
        }
        if !seen.insert(dedup_key(&normalized)) {
            continue;
        }
        let rel = anchor.value().attr("rel").unwrap_or_default().to_lowercase();
        links.push(LinkInfo {
            is_internal: is_same_domain(&normalized, url),
            is_no_follow: rel.split_whitespace().any(|r| r == "nofollow"),
            text: visible_text(anchor),
            url: normalized,
            position: links.len(),
        });
    }
    links
}

/// 标题大纲（h1..h6，按文档顺序）
pub fn extract_headings(document: &Html) -> Vec<Heading> {
    select(document, "h1, h2, h3, h4, h5, h6")
        .into_iter()
        .filter_map(|el| {
            let level = el.value().name().trim_start_matches('h').parse::<u8>().ok()?;
            let text = visible_text(el);
            if text.is_empty() {
                return None;
            }
            Some((level, text, el.value().attr("id").map(str::to_string)))
        })
        .enumerate()
        .map(|(position, (level, text, id))| Heading {
            level,
            text,
            id,
            position,
        })
        .collect()
}

/// 识别链接所属的社交平台
pub fn social_platform(url: &str) -> Option<&'static str> {
    let domain = extract_domain(url)?;
    let host = domain.trim_start_matches("www.").trim_start_matches("m.");
    SOCIAL_PLATFORMS
        .iter()
        .find(|(platform_domain, _)| {
            host == *platform_domain || host.ends_with(&format!(".{}", platform_domain))
        })
        .map(|(_, name)| *name)
}

/// 社交平台链接，同一URL只出现一次
pub fn extract_social_links(document: &Html, url: &str) -> Vec<SocialLink> {
    let mut seen = HashSet::new();
    select(document, "a[href]")
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .map(|href| normalize_url(href, Some(url)))
        .filter_map(|href| {
            let platform = social_platform(&href)?;
            seen.insert(dedup_key(&href)).then(|| SocialLink {
                platform: platform.to_string(),
                url: href,
            })
        })
        .collect()
}

/// 联系方式
///
/// 邮箱与电话来自可见文本上的正则匹配，`mailto:`/`tel:` 链接也会被收集。
pub fn extract_contact_info(document: &Html, body_text: &str) -> ContactInfo {
    let mut emails = Vec::new();
    let mut phones = Vec::new();

    if let Some(re) = EMAIL_RE.as_ref() {
        emails.extend(re.find_iter(body_text).map(|m| m.as_str().to_string()));
    }
    for anchor in select(document, "a[href^=\"mailto:\"]") {
        if let Some(href) = anchor.value().attr("href") {
            let address = href.trim_start_matches("mailto:");
            let address = address.split('?').next().unwrap_or_default();
            if !address.is_empty() {
                emails.push(address.to_string());
            }
        }
    }

    if let Some(re) = PHONE_RE.as_ref() {
        phones.extend(
            re.find_iter(body_text)
                .map(|m| m.as_str().trim().to_string())
                .filter(|p| p.chars().filter(|c| c.is_ascii_digit()).count() >= 7),
        );
    }
    for anchor in select(document, "a[href^=\"tel:\"]") {
        if let Some(href) = anchor.value().attr("href") {
            let number = href.trim_start_matches("tel:").trim();
            if !number.is_empty() {
                phones.push(number.to_string());
            }
        }
    }

    let addresses = ADDRESS_SELECTORS
        .iter()
        .flat_map(|css| select(document, css))
        .map(visible_text)
        .filter(|text| !text.is_empty())
        .collect();

    ContactInfo {
        emails: unique(emails, |e| e.to_lowercase()),
        phones: unique(phones, |p| p.chars().filter(char::is_ascii_digit).collect()),
        addresses: unique(addresses, |a: &String| a.clone()),
    }
}

fn unique<F>(items: Vec<String>, key: F) -> Vec<String>
where
    F: Fn(&String) -> String,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}

/// 技术指纹
///
/// 依据脚本内容子串与 DOM 属性做廉价的签名检查。
pub fn detect_technologies(document: &Html) -> Vec<String> {
    let scripts = select(document, "script");
    let script_text: String = scripts
        .iter()
        .map(|s| s.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n");
    let script_srcs: String = scripts
        .iter()
        .filter_map(|s| s.value().attr("src"))
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();
    let has = |css: &str| first(document, css).is_some();
    let has_attr_prefix = |prefix: &str| {
        select(document, "*")
            .into_iter()
            .any(|el| el.value().attrs().any(|(name, _)| name.starts_with(prefix)))
    };

    let mut technologies = Vec::new();
    let mut detect = |name: &str, found: bool| {
        if found {
            technologies.push(name.to_string());
        }
    };

    detect(
        "React",
        script_text.contains("React") || has("[data-reactroot]") || has("#__next"),
    );
    detect(
        "Vue.js",
        script_text.contains("Vue") || has_attr_prefix("data-v-"),
    );
    detect(
        "Angular",
        script_text.contains("ng-") || has("[ng-app], [ng-version]") || has_attr_prefix("ng-"),
    );
    detect(
        "jQuery",
        script_text.to_lowercase().contains("jquery") || script_srcs.contains("jquery"),
    );
    detect(
        "Bootstrap",
        has("link[href*=\"bootstrap\"]") || (has(".container") && has(".row")),
    );
    detect(
        "WordPress",
        has("meta[name=\"generator\"][content*=\"WordPress\"]") || script_srcs.contains("wp-content"),
    );
    detect(
        "Shopify",
        script_text.contains("Shopify") || has(".shopify") || script_srcs.contains("cdn.shopify.com"),
    );
    detect(
        "Google Analytics",
        script_text.contains("gtag")
            || script_text.contains("ga(")
            || script_srcs.contains("googletagmanager.com"),
    );

    technologies
}
