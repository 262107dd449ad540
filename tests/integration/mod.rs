// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod api_tests;
pub mod helpers;
pub mod politeness_test;
pub mod repository_test;
pub mod runner_test;
pub mod trends_test;
