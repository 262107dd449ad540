// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 具体实现由基础设施层提供（数据库实现与内存实现）。
///
/// 包含的仓库接口：
/// - 任务仓库（job_repository）：抓取任务的持久化与队列领取
/// - 目标仓库（target_repository）：周期性抓取目标
/// - 趋势仓库（trend_repository）：趋势关键词记录与热门查询
/// - 存储仓库（storage_repository）：下载资源的文件存储
pub mod job_repository;
pub mod storage_repository;
pub mod target_repository;
pub mod trend_repository;
