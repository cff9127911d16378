// 该文件是 Tianyan （天眼） 项目的一部分。
// src/fusion.rs - 多模型结果融合
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

use tracing::{debug, warn};

use crate::detection::DetectionSet;

/// 融合策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionStrategy {
  /// 单模型，原样返回
  Identity,
  /// 按调用顺序拼接，不做去重或 NMS
  Union,
}

/// 融合各检测器的结果，`sets` 必须按模式定义的调用顺序排列
pub fn fuse(strategy: FusionStrategy, sets: Vec<DetectionSet>) -> DetectionSet {
  match strategy {
    FusionStrategy::Identity => {
      if sets.len() != 1 {
        warn!("单模型融合收到 {} 组结果，按顺序拼接", sets.len());
        return concat(sets);
      }
      sets.into_iter().next().unwrap_or_default()
    }
    FusionStrategy::Union => concat(sets),
  }
}

fn concat(sets: Vec<DetectionSet>) -> DetectionSet {
  let total = sets.iter().map(DetectionSet::len).sum::<usize>();
  let mut fused = DetectionSet::new();
  for set in sets {
    fused.append(set);
  }
  debug!("融合得到 {} 个目标", total);
  fused
}
