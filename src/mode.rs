// 该文件是 Tianyan （天眼） 项目的一部分。
// src/mode.rs - 检测模式
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{fmt, str::FromStr};

use serde::Serialize;
use thiserror::Error;

use crate::fusion::FusionStrategy;

/// 检测器（模型）标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelId {
  Airplane,
  Ship,
  Combined,
}

impl ModelId {
  pub const ALL: [ModelId; 3] = [ModelId::Airplane, ModelId::Ship, ModelId::Combined];

  pub fn as_str(&self) -> &'static str {
    match self {
      ModelId::Airplane => "airplane",
      ModelId::Ship => "ship",
      ModelId::Combined => "combined",
    }
  }
}

impl fmt::Display for ModelId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 检测模式，决定调用哪些检测器以及如何融合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  #[default]
  Airplane,
  Ship,
  /// 分别运行飞机与船舶模型后拼接结果
  Both,
  /// 单个联合训练的模型
  Combined,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("无效的检测模式: '{0}'，可选值为 airplane, ship, both, combined")]
pub struct InvalidModeError(pub String);

impl Mode {
  pub const ALL: [Mode; 4] = [Mode::Airplane, Mode::Ship, Mode::Both, Mode::Combined];

  pub fn as_str(&self) -> &'static str {
    match self {
      Mode::Airplane => "airplane",
      Mode::Ship => "ship",
      Mode::Both => "both",
      Mode::Combined => "combined",
    }
  }

  /// 按调用顺序排列的检测器，融合时也按此顺序拼接
  pub fn models(&self) -> &'static [ModelId] {
    match self {
      Mode::Airplane => &[ModelId::Airplane],
      Mode::Ship => &[ModelId::Ship],
      Mode::Both => &[ModelId::Airplane, ModelId::Ship],
      Mode::Combined => &[ModelId::Combined],
    }
  }

  pub fn fusion(&self) -> FusionStrategy {
    match self {
      Mode::Both => FusionStrategy::Union,
      Mode::Airplane | Mode::Ship | Mode::Combined => FusionStrategy::Identity,
    }
  }
}

impl fmt::Display for Mode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Mode {
  type Err = InvalidModeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Mode::ALL
      .into_iter()
      .find(|mode| mode.as_str() == s)
      .ok_or_else(|| InvalidModeError(s.to_string()))
  }
}
