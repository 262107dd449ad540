// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置，包括数据库、Redis、队列、浏览器、
/// 礼貌抓取、资源、趋势与定时任务等配置
pub mod settings;
