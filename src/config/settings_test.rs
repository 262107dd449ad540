// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::*;

#[test]
fn test_defaults_match_documented_values() {
    let settings = Settings::with_env_prefix("HARVEST_DEFAULTS_TEST").unwrap();

    assert_eq!(settings.server.port, 3000);
    assert_eq!(settings.queue.strategy, QueueStrategy::Auto);
    assert_eq!(settings.queue.max_attempts, 3);
    assert_eq!(settings.queue.backoff_ms, 2000);
    assert_eq!(settings.queue.workers, 5);
    assert_eq!(settings.browser.navigation_timeout_ms, 30_000);
    assert_eq!(settings.browser.viewport_width, 1366);
    assert_eq!(settings.politeness.default_crawl_delay_ms, 2000);
    assert_eq!(settings.politeness.robots_cache_ttl_secs, 86_400);
    assert_eq!(settings.schedule.daily_sweep, "0 0 2 * * *");
    assert_eq!(settings.schedule.retention_days, 30);
    assert!(settings
        .assets
        .image_extensions
        .contains(&"webp".to_string()));
    assert!(settings.database.url.is_none());
}

#[test]
fn test_environment_overrides() {
    std::env::set_var("HARVEST_ENV_TEST__QUEUE__WORKERS", "9");
    std::env::set_var("HARVEST_ENV_TEST__QUEUE__STRATEGY", "direct");
    std::env::set_var("HARVEST_ENV_TEST__DATABASE__URL", "postgres://localhost/harvest");

    let settings = Settings::with_env_prefix("HARVEST_ENV_TEST").unwrap();

    assert_eq!(settings.queue.workers, 9);
    assert_eq!(settings.queue.strategy, QueueStrategy::Direct);
    assert_eq!(
        settings.database.url.as_deref(),
        Some("postgres://localhost/harvest")
    );
}
