// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供工作者池、任务处理器接口和关键词抓取处理器
pub mod pool;
pub mod scrape_handler;
pub mod worker;

pub use pool::WorkerPool;
pub use worker::TaskHandler;
