// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod page_inspector;
pub mod rate_limiter;
pub mod search_engine;
pub mod search_scraper;
pub mod traits;
