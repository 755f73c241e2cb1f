// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用用例模块
///
/// 负责协调领域对象完成特定的业务操作
pub mod upload_keywords;
