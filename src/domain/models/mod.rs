// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 抓取任务（scrape_job）：一次抓取请求及其状态机
/// - 抽取结果（extraction）：页面、内容、资源抽取的结构化输出
/// - 趋势（trend）：趋势条目与合并结果
/// - 抓取目标（target）：需要周期性重新抓取的站点
pub mod extraction;
pub mod scrape_job;
pub mod target;
pub mod trend;
