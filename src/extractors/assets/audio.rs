// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;

use scraper::Html;

use crate::domain::models::extraction::{AudioAsset, MediaSource};
use crate::extractors::dom::{placement_context, select, select_in};
use crate::utils::url_utils::{dedup_key, normalize_url};

/// 发现 `<audio>` 元素
///
/// 没有 `src` 时取第一个 `<source>` 作为主URL，其余来源保留在 `sources` 中。
pub fn discover_audio(document: &Html, base_url: &str) -> Vec<AudioAsset> {
    let mut seen = HashSet::new();
    let mut audio = Vec::new();

    for el in select(document, "audio") {
        let sources: Vec<MediaSource> = select_in(el, "source[src]")
            .into_iter()
            .filter_map(|source| {
                let src = source.value().attr("src")?.trim();
                (!src.is_empty()).then(|| MediaSource {
                    url: normalize_url(src, Some(base_url)),
                    mime_type: source.value().attr("type").map(str::to_string),
                    media: None,
                })
            })
            .collect();

        let url = match el.value().attr("src").map(str::trim).filter(|s| !s.is_empty()) {
            Some(src) => normalize_url(src, Some(base_url)),
            None => match sources.first() {
                Some(first) => first.url.clone(),
                None => continue,
            },
        };
        if !seen.insert(dedup_key(&url)) {
            continue;
        }

        audio.push(AudioAsset {
            url,
            controls: el.value().attr("controls").is_some(),
            autoplay: el.value().attr("autoplay").is_some(),
            looped: el.value().attr("loop").is_some(),
            sources,
            context: placement_context(el),
        });
    }
    audio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_audio() {
        let html = Html::parse_document(
            r#"<article>
              <audio controls src="/ep1.mp3"></audio>
              <audio loop><source src="/theme.ogg" type="audio/ogg"><source src="/theme.mp3"></audio>
              <audio src="/EP1.mp3"></audio>
              <audio></audio>
            </article>"#,
        );
        let audio = discover_audio(&html, "https://pod.test/show/");
        assert_eq!(audio.len(), 2);
        assert_eq!(audio[0].url, "https://pod.test/ep1.mp3");
        assert!(audio[0].controls && audio[0].context.in_article);
        assert_eq!(audio[1].url, "https://pod.test/theme.ogg");
        assert_eq!(audio[1].sources.len(), 2);
        assert_eq!(audio[1].sources[0].mime_type.as_deref(), Some("audio/ogg"));
        assert!(audio[1].looped);
    }
}
