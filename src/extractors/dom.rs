// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! DOM 查询辅助函数
//!
//! 选择器解析失败时返回空结果，抽取逻辑据此回退而不是报错。

use scraper::{ElementRef, Html, Node, Selector};

use crate::domain::models::extraction::PlacementContext;

/// 查询整个文档
pub fn select<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// 查询元素的后代
pub fn select_in<'a>(element: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => element.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// 第一个匹配的元素
pub fn first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

/// 把连续空白折叠为单个空格
pub fn clean_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 元素的可见文本
///
/// 跳过 script、style、noscript、template 中的文本，空白被折叠。
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in element.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| matches!(el.name(), "script" | "style" | "noscript" | "template"))
                .unwrap_or(false)
        });
        if !hidden {
            parts.push(&**text);
        }
    }
    clean_whitespace(&parts.join(" "))
}

/// 选择器回退链：返回第一个非空文本
pub fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        select(document, css)
            .into_iter()
            .map(visible_text)
            .find(|text| !text.is_empty())
    })
}

/// 选择器回退链：返回第一个非空属性值
pub fn first_attr(document: &Html, selectors: &[(&str, &str)]) -> Option<String> {
    selectors.iter().find_map(|(css, attr)| {
        select(document, css).into_iter().find_map(|el| {
            el.value()
                .attr(attr)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
    })
}

/// `<meta>` 的 content
pub fn meta_content(document: &Html, css: &str) -> Option<String> {
    first_attr(document, &[(css, "content")])
}

/// 元素自身或祖先是否匹配选择器
pub fn closest<'a>(element: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    if selector.matches(&element) {
        return Some(element);
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| selector.matches(ancestor))
}

/// 从文档树中移除所有匹配的元素
pub fn strip_elements(document: &mut Html, css: &str) {
    let Ok(selector) = Selector::parse(css) else {
        return;
    };
    let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// 解析尺寸属性（`300`、`300px`）
pub fn parse_dimension(value: Option<&str>) -> Option<u32> {
    let raw = value?.trim().trim_end_matches("px");
    raw.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u32)
}

/// 元素在页面中的位置标记
pub fn placement_context(element: ElementRef<'_>) -> PlacementContext {
    let near_text = element
        .parent()
        .and_then(ElementRef::wrap)
        .map(|parent| {
            let mut length = visible_text(parent).len();
            for sibling in parent.next_siblings().chain(parent.prev_siblings()) {
                if let Some(sibling) = ElementRef::wrap(sibling) {
                    length += visible_text(sibling).len();
                }
            }
            length > 50
        })
        .unwrap_or(false);

    PlacementContext {
        in_header: closest(element, "header, .header").is_some(),
        in_nav: closest(element, "nav, .nav, .navigation").is_some(),
        in_footer: closest(element, "footer, .footer").is_some(),
        in_article: closest(element, "article, .article, .post, .content").is_some(),
        in_sidebar: closest(element, "aside, .sidebar").is_some(),
        near_text,
        in_hero: closest(element, ".hero, .banner, .jumbotron, [class*=\"hero\"]").is_some(),
        is_modal: closest(element, ".modal, .popup, .lightbox, [role=\"dialog\"]").is_some(),
    }
}
