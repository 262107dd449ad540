// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 该模块定义了核心流程依赖的外部协作者接口：
/// - 通知服务（notification_service）：任务事件的发布
/// - 文本分析（text_analysis）：正文的可选增强分析
pub mod notification_service;
pub mod text_analysis;
