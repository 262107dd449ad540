// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 每个分节都有默认值，配置文件与环境变量只需覆盖差异项
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP 服务配置
    pub server: ServerSettings,
    /// 数据库配置，未设置 URL 时不使用数据库
    pub database: DatabaseSettings,
    /// Redis配置
    pub redis: RedisSettings,
    /// 任务队列配置
    pub queue: QueueSettings,
    /// 浏览器配置
    pub browser: BrowserSettings,
    /// 礼貌抓取配置
    pub politeness: PolitenessSettings,
    /// 资源抽取配置
    pub assets: AssetSettings,
    /// 趋势来源配置
    pub trends: TrendSettings,
    /// 定时任务配置
    pub schedule: ScheduleSettings,
    /// 存储配置
    pub storage: StorageSettings,
    /// 文本分析配置
    pub analysis: AnalysisSettings,
    /// 日志与指标配置
    pub telemetry: TelemetrySettings,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: Option<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 连接超时时间（秒）
    pub connect_timeout: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 20,
            min_connections: 2,
            connect_timeout: 10,
            idle_timeout: 300,
        }
    }
}

/// Redis配置设置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    /// Redis连接URL
    pub url: Option<String>,
}

/// 执行策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStrategy {
    /// 数据库可用时使用持久队列，否则直接执行
    #[default]
    Auto,
    Durable,
    Direct,
}

/// 任务队列配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub strategy: QueueStrategy,
    /// 工作器数量
    pub workers: usize,
    /// 最大尝试次数
    pub max_attempts: u32,
    /// 首次重试的退避时间（毫秒）
    pub backoff_ms: u64,
    /// 退避抖动因子 (0.0-1.0)
    pub retry_jitter: f64,
    /// 租约时长（秒），超时未完成的任务被视为停滞
    pub lease_secs: u64,
    /// 空闲时的轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 默认优先级
    pub default_priority: i32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            strategy: QueueStrategy::Auto,
            workers: 5,
            max_attempts: 3,
            backoff_ms: 2000,
            retry_jitter: 0.1,
            lease_secs: 300,
            poll_interval_ms: 1000,
            default_priority: 5,
        }
    }
}

/// 浏览器配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// 导航超时（毫秒）
    pub navigation_timeout_ms: u64,
    /// 等待选择器超时（毫秒）
    pub wait_for_selector_timeout_ms: u64,
    /// 近似网络空闲的静置时间（毫秒）
    pub network_idle_settle_ms: u64,
    /// 远程调试地址，设置后连接已有的浏览器而不是启动新进程
    pub remote_debugging_url: Option<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// 是否拦截样式、字体与图片请求
    pub block_resources: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            wait_for_selector_timeout_ms: 10_000,
            network_idle_settle_ms: 500,
            remote_debugging_url: None,
            viewport_width: 1366,
            viewport_height: 768,
            block_resources: true,
        }
    }
}

/// 礼貌抓取配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolitenessSettings {
    /// robots.txt 分组匹配使用的产品标识
    pub user_agent_token: String,
    /// 同域请求默认最小间隔（毫秒）
    pub default_crawl_delay_ms: u64,
    pub robots_cache_ttl_secs: u64,
    pub robots_fetch_timeout_ms: u64,
    pub respect_robots: bool,
}

impl Default for PolitenessSettings {
    fn default() -> Self {
        Self {
            user_agent_token: "harvestrs-bot".to_string(),
            default_crawl_delay_ms: 2000,
            robots_cache_ttl_secs: 86_400,
            robots_fetch_timeout_ms: 10_000,
            respect_robots: true,
        }
    }
}

/// 资源抽取配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// 图片下载的批大小
    pub download_concurrency: usize,
    /// 视频下载的批大小
    pub video_download_concurrency: usize,
    pub download_timeout_ms: u64,
    /// 单个文件的最大字节数
    pub max_file_bytes: u64,
    pub min_image_width: u32,
    pub min_image_height: u32,
    pub image_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
    pub audio_extensions: Vec<String>,
    pub document_extensions: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            download_concurrency: 5,
            video_download_concurrency: 2,
            download_timeout_ms: 30_000,
            max_file_bytes: 50 * 1024 * 1024,
            min_image_width: 100,
            min_image_height: 100,
            image_extensions: strings(&["jpg", "jpeg", "png", "gif", "webp", "svg"]),
            video_extensions: strings(&["mp4", "avi", "mov", "webm", "mkv"]),
            audio_extensions: strings(&["mp3", "wav", "ogg", "aac"]),
            document_extensions: strings(&[
                "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "rtf",
            ]),
        }
    }
}

/// 趋势来源配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendSettings {
    pub google_base_url: String,
    pub reddit_base_url: String,
    pub news_base_url: String,
    /// 新闻接口密钥，未设置时新闻来源不产生条目
    pub news_api_key: Option<String>,
    pub twitter_base_url: String,
    /// 热门话题接口的 Bearer 令牌，未设置时该来源不产生条目
    pub twitter_bearer_token: Option<String>,
    /// 热门话题默认地区（WOEID，1 为全球）
    pub twitter_woeid: u64,
    /// 未指定来源时使用的来源
    pub default_sources: Vec<String>,
    /// 多关键词抓取时每批的并发数
    pub batch_concurrency: usize,
    pub request_timeout_ms: u64,
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self {
            google_base_url: "https://trends.google.com".to_string(),
            reddit_base_url: "https://www.reddit.com".to_string(),
            news_base_url: "https://newsapi.org".to_string(),
            news_api_key: None,
            twitter_base_url: "https://api.twitter.com".to_string(),
            twitter_bearer_token: None,
            twitter_woeid: 1,
            default_sources: strings(&["google"]),
            batch_concurrency: 3,
            request_timeout_ms: 15_000,
        }
    }
}

/// 定时任务配置（6 段 cron，含秒）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub enabled: bool,
    /// 每日页面扫描
    pub daily_sweep: String,
    /// 每周内容扫描
    pub weekly_sweep: String,
    /// 每小时趋势扫描
    pub trend_sweep: String,
    /// 清理
    pub cleanup: String,
    /// 终态任务保留天数
    pub retention_days: i64,
    /// 下载文件保留天数
    pub file_retention_days: u64,
    /// 单次扫描最多创建的任务数
    pub sweep_batch_size: u64,
    /// 趋势扫描的热门关键词数量
    pub hot_keyword_limit: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_sweep: "0 0 2 * * *".to_string(),
            weekly_sweep: "0 0 3 * * Sun".to_string(),
            trend_sweep: "0 0 * * * *".to_string(),
            cleanup: "0 0 1 * * *".to_string(),
            retention_days: 30,
            file_retention_days: 7,
            sweep_batch_size: 100,
            hot_keyword_limit: 20,
        }
    }
}

/// 存储配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// 本地存储路径
    pub local_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            local_path: "./storage".to_string(),
        }
    }
}

/// 文本分析配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub api_base_url: String,
    pub timeout_secs: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 30,
        }
    }
}

/// 日志与指标配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub json_logs: bool,
    /// Prometheus 监听地址，未设置时不导出指标
    pub metrics_addr: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            json_logs: false,
            metrics_addr: Some("0.0.0.0:9000".to_string()),
        }
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 加载顺序：内置默认值、`config/default`、`config/{APP_ENVIRONMENT}`、
    /// 以 `HARVEST` 为前缀的环境变量（如 `HARVEST__DATABASE__URL`）
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_env_prefix("HARVEST")
    }

    /// 使用指定的环境变量前缀加载配置
    pub fn with_env_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("queue.strategy", "auto")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod settings_test;
