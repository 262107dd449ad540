// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use reqwest::Client;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::infrastructure::cache::redis_client::RedisClient;
use crate::utils::errors::ScrapeError;

const ROBOTS_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

/// 单个域名的 robots 规则
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsPolicy {
    pub disallowed_paths: Vec<String>,
    pub allowed_paths: Vec<String>,
    /// 抓取间隔（毫秒），未声明时为 None
    pub crawl_delay_ms: Option<u64>,
    pub sitemaps: Vec<String>,
}

#[derive(Default)]
struct GroupRules {
    disallowed: Vec<String>,
    allowed: Vec<String>,
    crawl_delay_ms: Option<u64>,
}

impl RobotsPolicy {
    /// 抓取失败时使用的宽松策略：全部允许，无延迟
    pub fn permissive() -> Self {
        Self::default()
    }

    /// 解析 robots.txt
    ///
    /// 只采纳 `User-agent` 为 `*` 或名称包含在 `product_token` 中的分组；
    /// 存在专属分组时忽略通配分组。
    ///
    /// # 参数
    ///
    /// * `content` - robots.txt 原文
    /// * `product_token` - 本爬虫的产品标识
    pub fn parse(content: &str, product_token: &str) -> Self {
        let token = product_token.to_lowercase();
        let mut wildcard = GroupRules::default();
        let mut specific = GroupRules::default();
        let mut specific_found = false;
        let mut sitemaps = Vec::new();

        // 当前分组是否适用于我们：(通配, 专属)
        let mut current = (false, false);
        let mut in_agent_lines = false;

        for raw in content.lines() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !in_agent_lines {
                        current = (false, false);
                    }
                    in_agent_lines = true;
                    let agent = value.to_lowercase();
                    if agent == "*" {
                        current.0 = true;
                    } else if !agent.is_empty() && token.contains(&agent) {
                        current.1 = true;
                        specific_found = true;
                    }
                }
                "sitemap" => {
                    // sitemap 不属于任何分组
                    if !value.is_empty() {
                        sitemaps.push(value.to_string());
                    }
                }
                "disallow" | "allow" | "crawl-delay" => {
                    in_agent_lines = false;
                    let targets: Vec<&mut GroupRules> = match current {
                        (true, true) => vec![&mut wildcard, &mut specific],
                        (true, false) => vec![&mut wildcard],
                        (false, true) => vec![&mut specific],
                        (false, false) => Vec::new(),
                    };
                    for group in targets {
                        match key.as_str() {
                            "disallow" if !value.is_empty() => {
                                group.disallowed.push(value.to_string())
                            }
                            "allow" if !value.is_empty() => group.allowed.push(value.to_string()),
                            "crawl-delay" => {
                                if let Ok(secs) = value.parse::<f64>() {
                                    if secs >= 0.0 {
                                        group.crawl_delay_ms = Some((secs * 1000.0).round() as u64);
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => {
                    in_agent_lines = false;
                }
            }
        }

        let chosen = if specific_found { specific } else { wildcard };
        Self {
            disallowed_paths: chosen.disallowed,
            allowed_paths: chosen.allowed,
            crawl_delay_ms: chosen.crawl_delay_ms,
            sitemaps,
        }
    }

    /// 检查URL是否被允许
    ///
    /// 最长匹配的规则生效；Allow 与 Disallow 等长时 Allow 优先。
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let mut path = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        let longest = |rules: &[String]| {
            rules
                .iter()
                .filter(|rule| pattern_matches(rule, &path))
                .map(|rule| rule.len())
                .max()
        };

        match (longest(&self.disallowed_paths), longest(&self.allowed_paths)) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(deny), Some(allow)) => allow >= deny,
        }
    }
}

/// 按 robots 语义检查URL
pub fn is_allowed(url: &str, policy: &RobotsPolicy) -> bool {
    policy.is_allowed(url)
}

/// 规则匹配：前缀匹配，`*` 匹配任意字符序列，末尾 `$` 锚定结尾
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };
    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts[0];
    if !path.starts_with(first) {
        return false;
    }
    let mut pos = first.len();
    if parts.len() == 1 {
        return !anchored || pos == path.len();
    }

    let last_index = parts.len() - 1;
    for (i, part) in parts.iter().enumerate().skip(1) {
        if i == last_index && anchored {
            return path.len() >= pos + part.len() && path.ends_with(part);
        }
        match path[pos..].find(part) {
            Some(idx) => pos += idx + part.len(),
            None => return false,
        }
    }
    true
}

/// robots.txt 来源
#[async_trait]
pub trait RobotsSource: Send + Sync {
    /// 获取域名的 robots.txt 原文
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(content))` - 获取成功
    /// * `Ok(None)` - 站点没有 robots.txt
    /// * `Err` - 网络或服务端错误
    async fn fetch(&self, domain: &str) -> Result<Option<String>>;
}

/// 通过 HTTP 获取 robots.txt，可选 Redis 二级缓存
pub struct HttpRobotsSource {
    client: Client,
    scheme: String,
    redis_client: Option<Arc<RedisClient>>,
    redis_ttl_secs: u64,
}

impl HttpRobotsSource {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            scheme: "https".to_string(),
            redis_client: None,
            redis_ttl_secs: 86_400,
        })
    }

    /// 指定协议（测试环境下使用 http）
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    pub fn with_redis(mut self, redis_client: Arc<RedisClient>, ttl: Duration) -> Self {
        self.redis_client = Some(redis_client);
        self.redis_ttl_secs = ttl.as_secs();
        self
    }
}

#[async_trait]
impl RobotsSource for HttpRobotsSource {
    async fn fetch(&self, domain: &str) -> Result<Option<String>> {
        let redis_key = format!("robots:{}", domain);
        if let Some(ref redis) = self.redis_client {
            if let Ok(Some(content)) = redis.get(&redis_key).await {
                return Ok(Some(content));
            }
        }

        let robots_url = format!("{}://{}/robots.txt", self.scheme, domain);
        let resp = self.client.get(&robots_url).send().await?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(anyhow::anyhow!("Server error: {}", status));
        }
        if !status.is_success() {
            // 404、403 等视为没有 robots.txt
            return Ok(None);
        }

        let content = resp.text().await?;
        if let Some(ref redis) = self.redis_client {
            if let Err(e) = redis.set(&redis_key, &content, self.redis_ttl_secs).await {
                tracing::debug!("Failed to cache robots.txt for {}: {}", domain, e);
            }
        }
        Ok(Some(content))
    }
}

#[derive(Clone)]
struct CachedPolicy {
    policy: Arc<RobotsPolicy>,
    expires_at: Instant,
}

/// 域名策略存储
///
/// 持有进程内共享的两份可变状态：robots 规则缓存与每个域名的请求时钟。
/// 以依赖注入的方式传给抽取器，测试可以替换来源并暂停时钟。
pub struct DomainPolicyStore {
    source: Arc<dyn RobotsSource>,
    product_token: String,
    robots_cache: Mutex<LruCache<String, CachedPolicy>>,
    last_request: DashMap<String, Instant>,
    ttl: Duration,
    default_interval: Duration,
    respect_robots: bool,
}

impl DomainPolicyStore {
    /// 创建策略存储
    ///
    /// # 参数
    ///
    /// * `source` - robots.txt 来源
    /// * `product_token` - 匹配 robots 分组时使用的产品标识
    /// * `default_interval` - 未声明 Crawl-delay 时同域请求的最小间隔
    /// * `ttl` - robots 缓存有效期
    pub fn new(
        source: Arc<dyn RobotsSource>,
        product_token: impl Into<String>,
        default_interval: Duration,
        ttl: Duration,
    ) -> Self {
        Self {
            source,
            product_token: product_token.into(),
            robots_cache: Mutex::new(LruCache::new(ROBOTS_CACHE_CAPACITY)),
            last_request: DashMap::new(),
            ttl,
            default_interval,
            respect_robots: true,
        }
    }

    /// 关闭 robots 检查（仍保留限速）
    pub fn ignoring_robots(mut self) -> Self {
        self.respect_robots = false;
        self
    }

    /// 获取域名的 robots 规则（带缓存）
    ///
    /// 获取失败时返回并缓存宽松策略，从不报错。
    pub async fn fetch_robots(&self, domain: &str) -> Arc<RobotsPolicy> {
        let key = domain.to_lowercase();
        {
            let mut cache = self.robots_cache.lock();
            if let Some(cached) = cache.get(&key) {
                if cached.expires_at > Instant::now() {
                    return cached.policy.clone();
                }
            }
        }

        let policy = match self.source.fetch(&key).await {
            Ok(Some(content)) => RobotsPolicy::parse(&content, &self.product_token),
            Ok(None) => RobotsPolicy::permissive(),
            Err(e) => {
                tracing::warn!("Failed to fetch robots.txt for {}: {}", key, e);
                RobotsPolicy::permissive()
            }
        };
        let policy = Arc::new(policy);

        self.robots_cache.lock().put(
            key,
            CachedPolicy {
                policy: policy.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        policy
    }

    /// 同域请求的最小间隔：Crawl-delay 优先，否则使用默认值
    pub fn interval_for(&self, policy: &RobotsPolicy) -> Duration {
        policy
            .crawl_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_interval)
    }

    /// 等待直到距离该域名上一次请求至少过去 `min_interval`
    ///
    /// 在持有条目锁期间预定时间槽，并发调用方因此依次排队。
    pub async fn respect_rate_limit(&self, domain: &str, min_interval: Duration) {
        let now = Instant::now();
        let slot = match self.last_request.entry(domain.to_lowercase()) {
            Entry::Occupied(mut entry) => {
                let slot = (*entry.get() + min_interval).max(now);
                entry.insert(slot);
                slot
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                now
            }
        };

        if slot > now {
            tracing::debug!(
                "Rate limiting {}: waiting {}ms",
                domain,
                (slot - now).as_millis()
            );
            tokio::time::sleep_until(slot).await;
        }
    }

    /// 访问前的礼貌检查：robots 许可与同域限速
    ///
    /// # 错误
    ///
    /// * `ScrapeError::Validation` - URL 无法解析出域名
    /// * `ScrapeError::RobotsDisallowed` - 被 robots 规则排除
    pub async fn admit(&self, url: &str) -> Result<(), ScrapeError> {
        let domain = policy_key(url)
            .ok_or_else(|| ScrapeError::Validation(format!("Invalid URL: {}", url)))?;

        let policy = self.fetch_robots(&domain).await;
        if self.respect_robots && !policy.is_allowed(url) {
            metrics::counter!("harvest_robots_blocked_total").increment(1);
            return Err(ScrapeError::RobotsDisallowed(url.to_string()));
        }

        let interval = self.interval_for(&policy);
        self.respect_rate_limit(&domain, interval).await;
        Ok(())
    }
}

/// 策略键：主机名，非默认端口时附带端口
pub fn policy_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "\
User-agent: *
Disallow: /private/
Allow: /private/open
Crawl-delay: 1.5
Sitemap: https://x.com/sitemap.xml

User-agent: otherbot
Disallow: /
";

    #[test]
    fn test_parse_wildcard_group() {
        let policy = RobotsPolicy::parse(ROBOTS, "harvestrs-bot");
        assert_eq!(policy.disallowed_paths, vec!["/private/".to_string()]);
        assert_eq!(policy.allowed_paths, vec!["/private/open".to_string()]);
        assert_eq!(policy.crawl_delay_ms, Some(1500));
        assert_eq!(policy.sitemaps, vec!["https://x.com/sitemap.xml".to_string()]);
    }

    #[test]
    fn test_specific_group_overrides_wildcard() {
        let content = "User-agent: *\nDisallow: /a\n\nUser-agent: harvestrs\nDisallow: /b\n";
        let policy = RobotsPolicy::parse(content, "harvestrs-bot/1.0");
        assert_eq!(policy.disallowed_paths, vec!["/b".to_string()]);
    }

    #[test]
    fn test_disallow_private_allows_public() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow: /private/\n", "bot");
        assert!(!is_allowed("https://x.com/private/page", &policy));
        assert!(is_allowed("https://x.com/public", &policy));
    }

    #[test]
    fn test_longer_allow_overrides_disallow() {
        let policy = RobotsPolicy::parse(ROBOTS, "bot");
        assert!(policy.is_allowed("https://x.com/private/open/doc"));
        assert!(!policy.is_allowed("https://x.com/private/closed"));
    }

    #[test]
    fn test_wildcard_and_anchor_patterns() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow: /*.pdf$\nDisallow: /tmp*\n", "bot");
        assert!(!policy.is_allowed("https://x.com/docs/a.pdf"));
        assert!(policy.is_allowed("https://x.com/docs/a.pdf?download=1"));
        assert!(!policy.is_allowed("https://x.com/tmpfiles"));
        assert!(policy.is_allowed("https://x.com/docs/a.html"));
    }

    #[test]
    fn test_empty_disallow_allows_everything() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow:\n", "bot");
        assert!(policy.is_allowed("https://x.com/anything"));
    }

    #[test]
    fn test_policy_key_keeps_non_default_port() {
        assert_eq!(policy_key("http://127.0.0.1:8080/x"), Some("127.0.0.1:8080".into()));
        assert_eq!(policy_key("https://Example.com/x"), Some("example.com".into()));
    }

    struct FailingSource;

    #[async_trait]
    impl RobotsSource for FailingSource {
        async fn fetch(&self, _domain: &str) -> Result<Option<String>> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_is_permissive() {
        let store = DomainPolicyStore::new(
            Arc::new(FailingSource),
            "bot",
            Duration::from_millis(2000),
            Duration::from_secs(86_400),
        );
        let policy = store.fetch_robots("x.com").await;
        assert!(policy.is_allowed("https://x.com/private/page"));
        assert_eq!(policy.crawl_delay_ms, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_spaces_same_domain_requests() {
        let store = DomainPolicyStore::new(
            Arc::new(FailingSource),
            "bot",
            Duration::from_millis(2000),
            Duration::from_secs(86_400),
        );
        let start = Instant::now();
        store
            .respect_rate_limit("x.com", Duration::from_millis(2000))
            .await;
        let first = Instant::now();
        store
            .respect_rate_limit("x.com", Duration::from_millis(2000))
            .await;
        let second = Instant::now();

        assert_eq!(first, start);
        assert!(second - first >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_per_domain() {
        let store = DomainPolicyStore::new(
            Arc::new(FailingSource),
            "bot",
            Duration::from_millis(2000),
            Duration::from_secs(86_400),
        );
        let start = Instant::now();
        store.respect_rate_limit("a.com", Duration::from_secs(2)).await;
        store.respect_rate_limit("b.com", Duration::from_secs(2)).await;
        assert_eq!(Instant::now(), start);
    }
}
