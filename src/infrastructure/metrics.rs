// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 初始化指标导出
///
/// 地址无法解析或端口被占用时只记录警告，服务照常启动。
pub fn init_metrics(listen_addr: &str) {
    let addr: SocketAddr = match listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", listen_addr, e);
            return;
        }
    };

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return;
    }

    describe_counter!(
        "harvest_jobs_total",
        "Total number of finished scrape jobs by type and outcome"
    );
    describe_counter!(
        "harvest_job_errors_total",
        "Total number of failed scrape jobs by error kind"
    );
    describe_histogram!(
        "harvest_extraction_seconds",
        "Duration of extraction handlers in seconds"
    );
    describe_counter!(
        "harvest_robots_blocked_total",
        "Total number of URLs rejected by robots.txt"
    );
    describe_counter!(
        "harvest_assets_downloaded_total",
        "Total number of downloaded binary assets"
    );

    info!("Metrics exporter listening on {}", addr);
}
