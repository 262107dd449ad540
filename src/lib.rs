// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含任务、目标、趋势等核心实体以及仓库与服务接口
pub mod domain;

/// 引擎模块
///
/// 驱动无头浏览器加载页面
pub mod engines;

/// 抽取器模块
///
/// 页面、正文、资源与趋势四类抽取
pub mod extractors;

/// 基础设施模块
///
/// 提供外部服务集成，如数据库、缓存、存储等
pub mod infrastructure;

/// 表示层模块
///
/// 处理HTTP请求和响应
pub mod presentation;

/// 队列模块
///
/// 任务执行策略、执行器与定时扫描
pub mod queue;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 持久队列的后台工作器与管理
pub mod workers;
