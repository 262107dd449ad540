// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 规范化URL
///
/// 相对路径与协议相对路径基于 `base` 解析为绝对URL，片段被移除。
/// 解析失败时原样返回输入，从不报错。结果是幂等的。
///
/// # 参数
///
/// * `url` - 待规范化的URL
/// * `base` - 可选的基准URL
pub fn normalize_url(url: &str, base: Option<&str>) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return url.to_string();
    }

    let parsed = match Url::parse(trimmed) {
        Ok(u) => Ok(u),
        Err(ParseError::RelativeUrlWithoutBase) => match base.and_then(|b| Url::parse(b).ok()) {
            Some(base_url) => resolve_url(&base_url, trimmed),
            None => Err(ParseError::RelativeUrlWithoutBase),
        },
        Err(e) => Err(e),
    };

    match parsed {
        Ok(mut u) => {
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => url.to_string(),
    }
}

/// 提取域名
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// 去重键
///
/// 大小写与末尾斜杠不同的URL视为同一资源。
pub fn dedup_key(normalized: &str) -> String {
    let lower = normalized.to_lowercase();
    let trimmed = lower.trim_end_matches('/');
    if trimmed.is_empty() {
        lower
    } else {
        trimmed.to_string()
    }
}

/// 两个URL是否属于同一主机（忽略 `www.` 前缀）
pub fn is_same_domain(a: &str, b: &str) -> bool {
    match (extract_domain(a), extract_domain(b)) {
        (Some(x), Some(y)) => x.trim_start_matches("www.") == y.trim_start_matches("www."),
        _ => false,
    }
}

/// URL 路径的文件扩展名（小写，不含点）
pub fn file_extension(url: &str) -> Option<String> {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or_default().to_string());
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 {
        return None;
    }
    Some(ext.to_lowercase())
}
