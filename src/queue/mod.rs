// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 任务执行契约（runner）及其两种策略：持久队列（durable_runner）
/// 与直接执行（direct_runner）。执行器（executor）负责状态机推进，
/// 处理器（handlers）按任务类型分派抽取，调度器（scheduler）负责定时扫描。
pub mod direct_runner;
pub mod durable_runner;
pub mod executor;
pub mod handlers;
pub mod runner;
pub mod scheduler;
