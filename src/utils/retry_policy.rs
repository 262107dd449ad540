// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::ScrapeError;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// 重试策略配置
///
/// 尝试次数上限由任务自身的 `max_attempts` 决定，策略只负责退避计算。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 初始退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 抖动因子 (0.0-1.0)，为 0 时不加抖动
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(2000),
            max_backoff: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    /// 持久队列使用的指数退避策略
    pub fn exponential(initial_backoff: Duration) -> Self {
        Self {
            initial_backoff,
            ..Self::default()
        }
    }

    /// 设置抖动因子，超出 0.0-1.0 的值会被截断
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// 计算第 `attempt` 次失败后的退避时间
    ///
    /// `initial_backoff * multiplier^(attempt-1)`，不超过 `max_backoff`
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let backoff_secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped_backoff = backoff_secs.min(self.max_backoff.as_secs_f64());

        let final_backoff = if self.jitter_factor > 0.0 && capped_backoff > 0.0 {
            let jitter_range = capped_backoff * self.jitter_factor;
            let jitter = rand::random_range(-jitter_range..=jitter_range);
            (capped_backoff + jitter).max(0.0)
        } else {
            capped_backoff
        };

        Duration::from_secs_f64(final_backoff)
    }

    /// 计算下次重试时间
    pub fn next_retry_time(&self, attempt: u32, base_time: DateTime<Utc>) -> DateTime<Utc> {
        let backoff = self.calculate_backoff(attempt);
        base_time + chrono::Duration::milliseconds(backoff.as_millis() as i64)
    }

    /// 已尝试 `attempt` 次（上限 `max_attempts`）后是否应该重试
    pub fn should_retry(&self, error: &ScrapeError, attempt: u32, max_attempts: u32) -> bool {
        attempt < max_attempts && error.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_backoff_exponential() {
        let policy = RetryPolicy::exponential(Duration::from_millis(2000));

        assert_eq!(policy.calculate_backoff(1), Duration::from_millis(2000));
        assert_eq!(policy.calculate_backoff(2), Duration::from_millis(4000));
        assert_eq!(policy.calculate_backoff(3), Duration::from_millis(8000));
    }

    #[test]
    fn test_calculate_backoff_with_jitter() {
        let policy = RetryPolicy::exponential(Duration::from_secs(1)).with_jitter(0.1);

        let backoff = policy.calculate_backoff(2);
        // 接近 2 秒，允许 ±10% 抖动
        assert!(backoff >= Duration::from_millis(1800));
        assert!(backoff <= Duration::from_millis(2200));
    }

    #[test]
    fn test_calculate_backoff_max_limit() {
        let mut policy = RetryPolicy::default();
        policy.max_backoff = Duration::from_secs(5);

        assert_eq!(policy.calculate_backoff(10), Duration::from_secs(5));
    }

    #[test]
    fn test_should_retry_respects_attempts_and_error_kind() {
        let policy = RetryPolicy::default();
        let nav = ScrapeError::navigation("https://a.com", "timeout");
        let robots = ScrapeError::RobotsDisallowed("https://a.com".into());

        assert!(policy.should_retry(&nav, 1, 3));
        assert!(policy.should_retry(&nav, 2, 3));
        assert!(!policy.should_retry(&nav, 3, 3));
        assert!(!policy.should_retry(&robots, 1, 3));
    }

    #[test]
    fn test_next_retry_time() {
        use chrono::TimeZone;

        let policy = RetryPolicy::default();
        let base_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        assert_eq!(
            policy.next_retry_time(2, base_time),
            base_time + chrono::Duration::seconds(4)
        );
    }
}
