// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供任务编码、延迟任务队列和队列维护功能
pub mod scheduler;
pub mod task_encoder;
pub mod task_queue;
