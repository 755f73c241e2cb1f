// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 关键词（keyword）：一个关键词抓取作业及其状态机
/// - 任务（task）：延迟队列中的任务记录与编码后的任务描述
pub mod keyword;
pub mod task;
