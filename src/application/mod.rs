// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含任务分发和关键词上传等用例实现
pub mod dispatcher;
pub mod dto;
pub mod usecases;
