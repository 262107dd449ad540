// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 持久队列的工作器池：工作器循环领取任务，管理器负责启动与优雅关闭
pub mod job_worker;
pub mod manager;
pub mod worker;

pub use worker::Worker;
