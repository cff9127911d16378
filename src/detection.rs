// 该文件是 Tianyan （天眼） 项目的一部分。
// src/detection.rs - 检测结果定义
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

use serde::Serialize;

use crate::mode::ModelId;

/// 单个检测目标
///
/// 序列化时字段顺序固定为 `class`, `confidence`, `bbox`，
/// 与记录文件的格式一致；`source_model` 只用于追溯，不写入记录。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  /// 类别名称
  #[serde(rename = "class")]
  pub label: String,
  /// 置信度，范围 [0, 1]，保留 4 位小数
  pub confidence: f32,
  /// 像素坐标 [x1, y1, x2, y2]，x1 < x2 且 y1 < y2
  pub bbox: [i32; 4],
  /// 产生该结果的模型
  #[serde(skip)]
  pub source_model: ModelId,
}

/// 有序的检测结果集合，顺序即产生顺序
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DetectionSet {
  items: Vec<Detection>,
}

impl DetectionSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  pub fn push(&mut self, detection: Detection) {
    self.items.push(detection);
  }

  /// 追加另一个集合，保持两者各自的顺序
  pub fn append(&mut self, other: DetectionSet) {
    self.items.extend(other.items);
  }

  pub fn as_slice(&self) -> &[Detection] {
    &self.items
  }
}

impl From<Vec<Detection>> for DetectionSet {
  fn from(items: Vec<Detection>) -> Self {
    Self { items }
  }
}

impl FromIterator<Detection> for DetectionSet {
  fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
    Self {
      items: iter.into_iter().collect(),
    }
  }
}

impl IntoIterator for DetectionSet {
  type Item = Detection;
  type IntoIter = std::vec::IntoIter<Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.into_iter()
  }
}

impl<'a> IntoIterator for &'a DetectionSet {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

/// 图像像素边界 [0, width) x [0, height)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBounds {
  pub width: u32,
  pub height: u32,
}

impl ImageBounds {
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub fn of(image: &image::RgbImage) -> Self {
    Self::new(image.width(), image.height())
  }

  /// 判断边框是否完全位于图像内
  pub fn contains(&self, bbox: &[i32; 4]) -> bool {
    let [x1, y1, x2, y2] = *bbox;
    x1 >= 0
      && y1 >= 0
      && x1 < x2
      && y1 < y2
      && (x2 as i64) < self.width as i64
      && (y2 as i64) < self.height as i64
  }
}
