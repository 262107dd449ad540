// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 无头浏览器会话与页面加载
pub mod browser_session;
