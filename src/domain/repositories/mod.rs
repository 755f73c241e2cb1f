// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 关键词仓库（keyword_repository）：关键词作业记录的读取与状态写入
/// - 任务仓库（task_repository）：延迟队列任务的领取、确认与重排
pub mod keyword_repository;
pub mod task_repository;
