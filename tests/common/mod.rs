// 该文件是 Tianyan （天眼） 项目的一部分。
// tests/common/mod.rs - 集成测试用的脚本化检测器
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

#![allow(dead_code)]

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  thread,
  time::Duration,
};

use image::{Rgb, RgbImage};

pub use tianyan::{
  Detection, DetectionSet, ErrorKind, Mode, ModelId, Pipeline, PipelineError,
  input::InputImage,
  model::{DetectItem, DetectResult, DetectorRegistry, LabelMap, Model, ModelBuilder, ModelError},
  output::{Annotator, ArtifactWriter, ImageEncoding},
};

pub const BACKGROUND: Rgb<u8> = Rgb([0, 64, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// 按脚本返回固定结果的检测器
#[derive(Clone)]
pub struct ScriptedModel {
  labels: LabelMap,
  items: Vec<DetectItem>,
  delay: Option<Duration>,
  fail: bool,
  calls: Arc<AtomicUsize>,
}

impl ScriptedModel {
  pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
    Self {
      labels: LabelMap::from_names(labels),
      items: Vec::new(),
      delay: None,
      fail: false,
      calls: Arc::new(AtomicUsize::new(0)),
    }
  }

  pub fn detect(mut self, class_id: u32, score: f32, bbox: [f32; 4]) -> Self {
    self.items.push(DetectItem::new(class_id, score, bbox));
    self
  }

  pub fn delayed(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn failing(mut self) -> Self {
    self.fail = true;
    self
  }

  /// 推理调用计数，构造前取出
  pub fn calls(&self) -> Arc<AtomicUsize> {
    Arc::clone(&self.calls)
  }
}

impl Model for ScriptedModel {
  fn infer(&self, _image: &RgbImage) -> Result<DetectResult, ModelError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      thread::sleep(delay);
    }
    if self.fail {
      return Err(ModelError::Runtime("脚本化推理失败".to_string()));
    }
    Ok(DetectResult::from(self.items.clone()))
  }

  fn labels(&self) -> &LabelMap {
    &self.labels
  }
}

/// 每次构造返回同一脚本的副本，并记录构造次数
pub struct ScriptedBuilder {
  model: ScriptedModel,
  builds: Arc<AtomicUsize>,
}

impl ScriptedBuilder {
  pub fn new(model: ScriptedModel) -> Self {
    Self {
      model,
      builds: Arc::new(AtomicUsize::new(0)),
    }
  }

  pub fn builds(&self) -> Arc<AtomicUsize> {
    Arc::clone(&self.builds)
  }
}

impl ModelBuilder for ScriptedBuilder {
  fn build(&self) -> Result<Box<dyn Model>, ModelError> {
    self.builds.fetch_add(1, Ordering::SeqCst);
    Ok(Box::new(self.model.clone()))
  }
}

/// 模型文件无法加载
pub struct BrokenBuilder {
  attempts: Arc<AtomicUsize>,
}

impl BrokenBuilder {
  pub fn new() -> Self {
    Self {
      attempts: Arc::new(AtomicUsize::new(0)),
    }
  }

  pub fn attempts(&self) -> Arc<AtomicUsize> {
    Arc::clone(&self.attempts)
  }
}

impl ModelBuilder for BrokenBuilder {
  fn build(&self) -> Result<Box<dyn Model>, ModelError> {
    self.attempts.fetch_add(1, Ordering::SeqCst);
    Err(ModelError::Invalid("模型文件损坏".to_string()))
  }
}

pub fn canvas(width: u32, height: u32) -> RgbImage {
  RgbImage::from_pixel(width, height, BACKGROUND)
}

pub fn input(filename: &str) -> InputImage {
  InputImage::new(filename, canvas(120, 100))
}

/// PNG 输出便于逐像素比较
pub fn pipeline(registry: DetectorRegistry, dir: &Path) -> anyhow::Result<Pipeline> {
  Ok(Pipeline::new(
    Arc::new(registry),
    Annotator::new()?,
    ArtifactWriter::new(dir).with_encoding(ImageEncoding::Png),
  ))
}

pub fn count(counter: &Arc<AtomicUsize>) -> usize {
  counter.load(Ordering::SeqCst)
}

pub fn files_in(dir: &Path) -> anyhow::Result<usize> {
  Ok(std::fs::read_dir(dir)?.count())
}
