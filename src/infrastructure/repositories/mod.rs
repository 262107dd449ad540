// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供领域仓库接口的具体实现：基于SeaORM的数据库实现，
/// 以及无数据库时使用的内存实现
pub mod job_repo_impl;
pub mod memory;
pub mod target_repo_impl;
pub mod trend_repo_impl;
