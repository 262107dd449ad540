// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use harvestrs::config::settings::{QueueStrategy, Settings};
use harvestrs::domain::repositories::job_repository::JobRepository;
use harvestrs::domain::repositories::storage_repository::StorageRepository;
use harvestrs::domain::repositories::target_repository::TargetRepository;
use harvestrs::domain::repositories::trend_repository::TrendRepository;
use harvestrs::domain::services::notification_service::NotificationPublisher;
use harvestrs::domain::services::text_analysis::LlmTextAnalyzer;
use harvestrs::engines::browser_session::ChromiumPageLoader;
use harvestrs::extractors::assets::media::AssetDownloader;
use harvestrs::extractors::assets::AssetExtractor;
use harvestrs::extractors::content::ContentExtractor;
use harvestrs::extractors::trends::TrendExtractor;
use harvestrs::extractors::PageFetcher;
use harvestrs::infrastructure::cache::redis_client::RedisClient;
use harvestrs::infrastructure::database::connection;
use harvestrs::infrastructure::notifications::{
    LogNotificationPublisher, RedisNotificationPublisher,
};
use harvestrs::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use harvestrs::infrastructure::repositories::memory::{
    InMemoryJobRepository, InMemoryTargetRepository, InMemoryTrendRepository,
};
use harvestrs::infrastructure::repositories::target_repo_impl::TargetRepositoryImpl;
use harvestrs::infrastructure::repositories::trend_repo_impl::TrendRepositoryImpl;
use harvestrs::infrastructure::storage::LocalStorage;
use harvestrs::presentation::routes;
use harvestrs::queue::direct_runner::DirectJobRunner;
use harvestrs::queue::durable_runner::DurableJobRunner;
use harvestrs::queue::executor::JobExecutor;
use harvestrs::queue::handlers::{
    AssetHandler, ContentHandler, HandlerRegistry, PageHandler, TrendHandler,
};
use harvestrs::queue::runner::{resolve_strategy, JobRunner};
use harvestrs::queue::scheduler::SweepScheduler;
use harvestrs::utils::retry_policy::RetryPolicy;
use harvestrs::utils::robots::{DomainPolicyStore, HttpRobotsSource};
use harvestrs::utils::telemetry;
use harvestrs::workers::manager::WorkerManager;
use migration::{Migrator, MigratorTrait};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let settings = Settings::new()?;

    // 2. Initialize logging and metrics
    telemetry::init_telemetry(settings.telemetry.json_logs);
    info!("Starting harvestrs...");
    if let Some(addr) = &settings.telemetry.metrics_addr {
        harvestrs::infrastructure::metrics::init_metrics(addr);
    }

    let strategy = resolve_strategy(settings.queue.strategy, settings.database.url.is_some())?;
    info!("Queue strategy: {:?}", strategy);

    // 3. Connect to database
    let (jobs, targets, trends): (
        Arc<dyn JobRepository>,
        Arc<dyn TargetRepository>,
        Arc<dyn TrendRepository>,
    ) = match &settings.database.url {
        Some(url) => {
            let db = Arc::new(connection::create_pool(url, &settings.database).await?);
            info!("Database connection established");
            Migrator::up(db.as_ref(), None).await?;
            info!("Database migrations applied");
            (
                Arc::new(JobRepositoryImpl::new(db.clone())),
                Arc::new(TargetRepositoryImpl::new(db.clone())),
                Arc::new(TrendRepositoryImpl::new(db)),
            )
        }
        None => {
            warn!("No database configured, job state is kept in memory");
            (
                Arc::new(InMemoryJobRepository::new()),
                Arc::new(InMemoryTargetRepository::new()),
                Arc::new(InMemoryTrendRepository::new()),
            )
        }
    };

    // 4. Initialize Redis Client
    let redis = match &settings.redis.url {
        Some(url) => match RedisClient::new(url).await {
            Ok(client) => match client.ping().await {
                Ok(()) => {
                    info!("Redis client initialized");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    warn!("Redis unreachable, continuing without it: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Invalid Redis configuration, continuing without it: {}", e);
                None
            }
        },
        None => None,
    };
    let notifier: Arc<dyn NotificationPublisher> = match &redis {
        Some(client) => Arc::new(RedisNotificationPublisher::new(client.clone())),
        None => Arc::new(LogNotificationPublisher),
    };

    // 5. Initialize storage, politeness and extractors
    let storage: Arc<dyn StorageRepository> = Arc::new(LocalStorage::from_settings(&settings.storage));

    let politeness = &settings.politeness;
    let robots_ttl = Duration::from_secs(politeness.robots_cache_ttl_secs);
    let mut robots_source = HttpRobotsSource::new(
        Duration::from_millis(politeness.robots_fetch_timeout_ms),
        &politeness.user_agent_token,
    )?;
    if let Some(client) = &redis {
        robots_source = robots_source.with_redis(client.clone(), robots_ttl);
    }
    let mut policy = DomainPolicyStore::new(
        Arc::new(robots_source),
        politeness.user_agent_token.clone(),
        Duration::from_millis(politeness.default_crawl_delay_ms),
        robots_ttl,
    );
    if !politeness.respect_robots {
        policy = policy.ignoring_robots();
    }

    let loader = Arc::new(ChromiumPageLoader::new(settings.browser.clone()));
    let fetcher = Arc::new(PageFetcher::new(loader, Arc::new(policy), &settings.browser));

    let mut content = ContentExtractor::new(fetcher.clone());
    let analysis = &settings.analysis;
    match (&analysis.api_key, analysis.enabled) {
        (Some(key), true) => {
            let timeout = Duration::from_secs(analysis.timeout_secs);
            let analyzer = LlmTextAnalyzer::new(
                key.clone(),
                analysis.model.clone(),
                analysis.api_base_url.clone(),
                timeout,
            )?;
            content = content.with_analyzer(Arc::new(analyzer), timeout);
            info!("Text analysis enabled with model {}", analysis.model);
        }
        (None, true) => warn!("Text analysis enabled but no API key configured"),
        _ => {}
    }

    let downloader = Arc::new(AssetDownloader::new(settings.assets.clone(), storage.clone())?);
    let assets = AssetExtractor::new(fetcher.clone(), downloader, settings.assets.clone());
    let trend_extractor = TrendExtractor::from_settings(settings.trends.clone())?;

    let handlers = HandlerRegistry::new(
        Arc::new(PageHandler::new(fetcher)),
        Arc::new(ContentHandler::new(Arc::new(content))),
        Arc::new(AssetHandler::new(Arc::new(assets))),
        Arc::new(TrendHandler::new(Arc::new(trend_extractor), trends.clone())),
    );
    let executor = JobExecutor::new(jobs.clone(), handlers, notifier);

    // 6. Start workers
    let mut worker_manager = None;
    let runner: Arc<dyn JobRunner> = match strategy {
        QueueStrategy::Durable => {
            let retry = RetryPolicy::exponential(Duration::from_millis(settings.queue.backoff_ms))
                .with_jitter(settings.queue.retry_jitter);
            let mut manager = WorkerManager::new(executor.with_retry(retry), settings.queue.clone());
            manager.start_workers(settings.queue.workers);
            worker_manager = Some(manager);
            Arc::new(DurableJobRunner::new(jobs.clone(), settings.queue.clone()))
        }
        _ => Arc::new(DirectJobRunner::new(executor, settings.queue.clone())),
    };

    // 7. Start scheduled sweeps
    let mut scheduler = if settings.schedule.enabled {
        let sweeper = SweepScheduler::new(
            runner.clone(),
            jobs,
            targets,
            trends,
            settings.schedule.clone(),
        )
        .with_storage(storage)
        .with_trend_sources(settings.trends.default_sources.clone());
        Some(Arc::new(sweeper).start().await?)
    } else {
        None
    };

    // 8. Start HTTP server
    let app = routes::routes(runner);
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(mut manager) = worker_manager {
        manager.shutdown(Duration::from_secs(30)).await;
    }
    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            warn!("Failed to stop scheduler: {}", e);
        }
    }
    info!("harvestrs stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
