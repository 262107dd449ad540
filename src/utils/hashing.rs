// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::utils::url_utils::extract_domain;

/// 内容哈希（SHA-256，小写十六进制）
///
/// 两段内容哈希相等即视为重复，不做模糊匹配。
pub fn content_hash(content: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(content.as_ref()))
}

/// 生成存储文件名：`{domain}_{hash8}_{timestamp}.{ext}`
pub fn storage_file_name(url: &str, extension: &str) -> String {
    let domain = extract_domain(url)
        .map(|d| {
            d.chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect::<String>()
        })
        .unwrap_or_else(|| "unknown".to_string());
    let hash = content_hash(url);
    format!(
        "{}_{}_{}.{}",
        domain,
        &hash[..8],
        Utc::now().timestamp_millis(),
        extension.trim_start_matches('.')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(content_hash("same"), content_hash("same"));
        assert_ne!(content_hash("a"), content_hash("b"));
    }

    #[test]
    fn test_storage_file_name_shape() {
        let name = storage_file_name("https://cdn.example.com/a.png", "webp");
        assert!(name.starts_with("cdn_example_com_"));
        assert!(name.ends_with(".webp"));
        assert_eq!(name.split('_').nth(3).map(|h| h.len()), Some(8));
    }
}
