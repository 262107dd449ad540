// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;

use scraper::Html;

use crate::domain::models::extraction::DocumentAsset;
use crate::extractors::dom::{placement_context, select, visible_text};
use crate::utils::url_utils::{dedup_key, file_extension, normalize_url};

/// 扫描指向文档文件的链接
///
/// 扩展名必须在 `extensions` 白名单中，按规范化URL去重。
pub fn discover_documents(document: &Html, base_url: &str, extensions: &[String]) -> Vec<DocumentAsset> {
    let mut seen = HashSet::new();
    select(document, "a[href]")
        .into_iter()
        .filter_map(|link| {
            let href = link.value().attr("href")?.trim();
            if href.is_empty() || href.starts_with('#') || href.starts_with("mailto:") {
                return None;
            }
            let url = normalize_url(href, Some(base_url));
            let extension = file_extension(&url)?;
            if !extensions.contains(&extension) || !seen.insert(dedup_key(&url)) {
                return None;
            }
            let text = visible_text(link);
            Some(DocumentAsset {
                text: if text.is_empty() {
                    link.value().attr("title").unwrap_or_default().to_string()
                } else {
                    text
                },
                url,
                extension,
                context: placement_context(link),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::AssetSettings;

    #[test]
    fn test_discover_documents() {
        let html = Html::parse_document(
            r#"<body><footer>
              <a href="/files/Report.PDF?v=2">Annual report</a>
              <a href="/files/report.pdf?v=2">dup</a>
              <a href="/sheet.xlsx" title="Budget"></a>
              <a href="/page.html">page</a>
              <a href="/archive.zip">zip</a>
            </footer></body>"#,
        );
        let docs = discover_documents(
            &html,
            "https://d.test/",
            &AssetSettings::default().document_extensions,
        );
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].extension, "pdf");
        assert_eq!(docs[0].text, "Annual report");
        assert!(docs[0].context.in_footer);
        assert_eq!(docs[1].text, "Budget");
        assert_eq!(docs[1].extension, "xlsx");
    }
}
