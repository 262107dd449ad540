// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 视频发现：原生 `<video>`、平台嵌入与内联样式背景视频

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::Value;

use crate::domain::models::extraction::{MediaSource, VideoAsset, VideoSourceKind};
use crate::extractors::dom::{placement_context, select, select_in};
use crate::utils::url_utils::{dedup_key, normalize_url};

static YOUTUBE_ID_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(?:youtube(?:-nocookie)?\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
    )
    .ok()
});

static VIMEO_ID_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)vimeo\.com/(?:video/)?(\d+)").ok());

static DAILYMOTION_ID_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)dailymotion\.com/(?:embed/)?video/([a-z0-9]+)").ok());

static BACKGROUND_VIDEO_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)url\(['"]?([^'")]+\.(?:mp4|webm|ogg))['"]?\)"#).ok());

/// 可识别的嵌入平台（URL 片段, 平台名）
const EMBED_PLATFORMS: [(&str, &str); 8] = [
    ("youtube.com", "youtube"),
    ("youtube-nocookie.com", "youtube"),
    ("youtu.be", "youtube"),
    ("vimeo.com", "vimeo"),
    ("dailymotion", "dailymotion"),
    ("twitch", "twitch"),
    ("wistia", "wistia"),
    ("brightcove", "brightcove"),
];

fn capture(re: &Lazy<Option<Regex>>, haystack: &str) -> Option<String> {
    re.as_ref()?
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// 从 YouTube 链接中取出 11 位视频 ID
pub fn youtube_id(url: &str) -> Option<String> {
    capture(&YOUTUBE_ID_RE, url)
}

pub fn vimeo_id(url: &str) -> Option<String> {
    capture(&VIMEO_ID_RE, url)
}

/// 识别嵌入平台及视频 ID
pub fn embed_platform(src: &str) -> Option<(&'static str, Option<String>)> {
    let lower = src.to_lowercase();
    let (_, platform) = EMBED_PLATFORMS
        .iter()
        .find(|(fragment, _)| lower.contains(fragment))?;
    let id = match *platform {
        "youtube" => youtube_id(src),
        "vimeo" => vimeo_id(src),
        "dailymotion" => capture(&DAILYMOTION_ID_RE, src),
        _ => None,
    };
    Some((*platform, id))
}

fn has_attr(el: ElementRef<'_>, name: &str) -> bool {
    el.value().attr(name).is_some()
}

fn media_sources(el: ElementRef<'_>, base_url: &str) -> Vec<MediaSource> {
    select_in(el, "source[src]")
        .into_iter()
        .filter_map(|source| {
            let src = source.value().attr("src")?.trim();
            (!src.is_empty()).then(|| MediaSource {
                url: normalize_url(src, Some(base_url)),
                mime_type: source.value().attr("type").map(str::to_string),
                media: source.value().attr("media").map(str::to_string),
            })
        })
        .collect()
}

/// 发现页面中的视频
pub fn discover_videos(document: &Html, base_url: &str) -> Vec<VideoAsset> {
    let mut videos = Vec::new();

    for video in select(document, "video") {
        let sources = media_sources(video, base_url);
        let url = match video.value().attr("src").map(str::trim).filter(|s| !s.is_empty()) {
            Some(src) => normalize_url(src, Some(base_url)),
            None => match sources.first() {
                Some(first) => first.url.clone(),
                None => continue,
            },
        };
        videos.push(VideoAsset {
            url,
            source: VideoSourceKind::Html5,
            platform: None,
            video_id: None,
            thumbnail: None,
            poster: video
                .value()
                .attr("poster")
                .map(|p| normalize_url(p, Some(base_url))),
            controls: has_attr(video, "controls"),
            autoplay: has_attr(video, "autoplay"),
            muted: has_attr(video, "muted"),
            looped: has_attr(video, "loop"),
            sources,
            context: placement_context(video),
            binary: None,
        });
    }

    for iframe in select(document, "iframe[src]") {
        let src = iframe.value().attr("src").unwrap_or_default();
        let Some((platform, video_id)) = embed_platform(src) else {
            continue;
        };
        let thumbnail = match (platform, &video_id) {
            ("youtube", Some(id)) => Some(format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", id)),
            _ => None,
        };
        videos.push(VideoAsset {
            url: normalize_url(src, Some(base_url)),
            source: VideoSourceKind::Embed,
            platform: Some(platform.to_string()),
            video_id,
            thumbnail,
            poster: None,
            controls: true,
            autoplay: src.contains("autoplay=1"),
            muted: src.contains("mute=1") || src.contains("muted=1"),
            looped: src.contains("loop=1"),
            sources: Vec::new(),
            context: placement_context(iframe),
            binary: None,
        });
    }

    if let Some(re) = BACKGROUND_VIDEO_RE.as_ref() {
        for el in select(document, "[style*=\"background\"]") {
            let style = el.value().attr("style").unwrap_or_default();
            let Some(captures) = re.captures(style) else {
                continue;
            };
            videos.push(VideoAsset {
                url: normalize_url(&captures[1], Some(base_url)),
                source: VideoSourceKind::Background,
                platform: None,
                video_id: None,
                thumbnail: None,
                poster: None,
                controls: false,
                autoplay: true,
                muted: true,
                looped: true,
                sources: Vec::new(),
                context: placement_context(el),
                binary: None,
            });
        }
    }

    let mut seen = HashSet::new();
    videos.retain(|v| seen.insert(dedup_key(&v.url)));
    videos
}

/// 视频过滤条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoFilter {
    /// 允许的来源（html5、embed、background），为空时不过滤
    pub video_types: Vec<VideoSourceKind>,
    /// 允许的嵌入平台，为空时不过滤；原生视频不受影响
    pub platforms: Vec<String>,
    /// 排除导航与页头中的视频
    pub exclude_navigation: bool,
    /// 只保留正文与首屏横幅中的视频
    pub content_videos_only: bool,
}

impl VideoFilter {
    pub fn from_options(options: &Value) -> Self {
        let strings = |key: &str| -> Vec<String> {
            options
                .get(key)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_lowercase)
                        .collect()
                })
                .unwrap_or_default()
        };
        Self {
            video_types: strings("videoTypes")
                .into_iter()
                .filter_map(|t| serde_json::from_value(Value::String(t)).ok())
                .collect(),
            platforms: strings("platforms"),
            exclude_navigation: options
                .get("excludeNavigation")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            content_videos_only: options
                .get("contentVideosOnly")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    pub fn apply(&self, videos: Vec<VideoAsset>) -> Vec<VideoAsset> {
        videos
            .into_iter()
            .filter(|v| self.video_types.is_empty() || self.video_types.contains(&v.source))
            .filter(|v| match &v.platform {
                Some(platform) => self.platforms.is_empty() || self.platforms.contains(platform),
                None => true,
            })
            .filter(|v| !(self.exclude_navigation && (v.context.in_nav || v.context.in_header)))
            .filter(|v| !self.content_videos_only || v.context.in_article || v.context.in_hero)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<body>
      <section class="hero"><video autoplay muted loop poster="/poster.jpg">
        <source src="/intro.webm" type="video/webm"><source src="/intro.mp4" type="video/mp4">
      </video></section>
      <article>
        <iframe src="//www.youtube.com/embed/dQw4w9WgXcQ?autoplay=1"></iframe>
        <iframe src="https://player.vimeo.com/video/76979871"></iframe>
        <iframe src="https://fast.wistia.net/embed/iframe/abc"></iframe>
        <iframe src="https://maps.google.com/x"></iframe>
      </article>
      <div style="background: url('/loop.MP4') no-repeat">bg</div>
      <video src="/intro.webm"></video>
    </body>"#;

    #[test]
    fn test_discover_videos() {
        let videos = discover_videos(&Html::parse_document(PAGE), "https://v.test/page");
        assert_eq!(videos.len(), 5);

        let hero = &videos[0];
        assert_eq!(hero.url, "https://v.test/intro.webm");
        assert_eq!(hero.sources.len(), 2);
        assert_eq!(hero.poster.as_deref(), Some("https://v.test/poster.jpg"));
        assert!(hero.autoplay && hero.muted && hero.looped && !hero.controls);
        assert!(hero.context.in_hero);

        let youtube = &videos[1];
        assert_eq!(youtube.platform.as_deref(), Some("youtube"));
        assert_eq!(youtube.video_id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(
            youtube.thumbnail.as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/maxresdefault.jpg")
        );
        assert!(youtube.url.starts_with("https://www.youtube.com/embed/"));
        assert!(youtube.autoplay);

        assert_eq!(videos[2].video_id.as_deref(), Some("76979871"));
        assert_eq!(videos[3].platform.as_deref(), Some("wistia"));
        assert_eq!(videos[4].source, VideoSourceKind::Background);
    }

    #[test]
    fn test_video_filter() {
        let videos = discover_videos(&Html::parse_document(PAGE), "https://v.test/page");
        let filter = VideoFilter::from_options(&serde_json::json!({
            "videoTypes": ["embed"],
            "platforms": ["youtube", "vimeo"],
        }));
        let kept = filter.apply(videos.clone());
        assert_eq!(kept.len(), 2);

        let content_only = VideoFilter {
            content_videos_only: true,
            ..Default::default()
        };
        assert_eq!(content_only.apply(videos).len(), 4);
    }

    #[test]
    fn test_platform_ids() {
        assert_eq!(
            youtube_id("https://youtu.be/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=1").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            embed_platform("https://www.dailymotion.com/embed/video/x7tgad0"),
            Some(("dailymotion", Some("x7tgad0".to_string())))
        );
        assert_eq!(embed_platform("https://example.com/player"), None);
    }
}
