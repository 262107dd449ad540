// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含系统的技术实现细节，负责与外部系统的交互。
///
/// 包含的子模块：
/// - 缓存（cache）：Redis客户端
/// - 数据库（database）：数据库连接和实体映射
/// - 指标（metrics）：Prometheus 指标导出
/// - 通知（notifications）：任务事件发布
/// - 仓库实现（repositories）：领域仓库接口的数据库与内存实现
/// - 存储（storage）：下载文件的存储
///
/// 基础设施层依赖于领域层的抽象接口，领域层不依赖这里的任何实现。
pub mod cache;
pub mod database;
pub mod metrics;
pub mod notifications;
pub mod repositories;
pub mod storage;
