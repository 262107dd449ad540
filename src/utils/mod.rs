// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工具模块
///
/// HTML 抽取工具集：URL 规范化、结构化数据、内容哈希、
/// robots 规则与同域限速、User-Agent 轮换，以及错误类型、
/// 重试策略与日志初始化
pub mod errors;
pub mod hashing;
pub mod retry_policy;
pub mod robots;
pub mod structured_data;
pub mod telemetry;
pub mod url_utils;
pub mod user_agent;
