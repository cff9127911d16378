// 该文件是 Tianyan （天眼） 项目的一部分。
// src/normalize.rs - 模型输出规范化
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

use thiserror::Error;
use tracing::debug;

use crate::{
  detection::{Detection, DetectionSet, ImageBounds},
  mode::ModelId,
  model::{DetectResult, LabelMap},
};

const CONFIDENCE_SCALE: f32 = 10_000.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
  #[error("类别编号 {0} 不在标签映射中")]
  UnknownClass(u32),
}

/// 将模型原始输出转换为检测结果集合，保持原有顺序
///
/// 边框坐标截断为整数并裁剪到图像范围内，裁剪后面积为零的边框被丢弃。
pub fn normalize(
  result: &DetectResult,
  labels: &LabelMap,
  source_model: ModelId,
  bounds: ImageBounds,
) -> Result<DetectionSet, NormalizeError> {
  let mut set = DetectionSet::new();

  for item in result.items.iter() {
    let label = labels
      .get(item.class_id)
      .ok_or(NormalizeError::UnknownClass(item.class_id))?;

    let Some(bbox) = clip_bbox(&item.bbox, bounds) else {
      debug!("丢弃退化边框: {:?} ({})", item.bbox, source_model);
      continue;
    };

    set.push(Detection {
      label: label.to_string(),
      confidence: round_confidence(item.score),
      bbox,
      source_model,
    });
  }

  Ok(set)
}

/// 置信度限制在 [0, 1] 并保留 4 位小数
pub fn round_confidence(score: f32) -> f32 {
  if !score.is_finite() {
    return 0.0;
  }
  (score.clamp(0.0, 1.0) * CONFIDENCE_SCALE).round() / CONFIDENCE_SCALE
}

fn clip_bbox(bbox: &[f32; 4], bounds: ImageBounds) -> Option<[i32; 4]> {
  if bounds.width == 0 || bounds.height == 0 || bbox.iter().any(|v| v.is_nan()) {
    return None;
  }

  let max_x = (bounds.width - 1) as f32;
  let max_y = (bounds.height - 1) as f32;
  let clip = |v: f32, max: f32| v.clamp(0.0, max).trunc() as i32;

  let x1 = clip(bbox[0].min(bbox[2]), max_x);
  let y1 = clip(bbox[1].min(bbox[3]), max_y);
  let x2 = clip(bbox[0].max(bbox[2]), max_x);
  let y2 = clip(bbox[1].max(bbox[3]), max_y);

  (x1 < x2 && y1 < y2).then_some([x1, y1, x2, y2])
}
