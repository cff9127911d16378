// 该文件是 Tianyan （天眼） 项目的一部分。
// src/model.rs - 模型
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

use std::{collections::BTreeMap, str::FromStr};

use image::RgbImage;
use thiserror::Error;
use url::Url;

/// 检测模型
///
/// 实现者持有已加载的权重，`infer` 只读访问模型，可被多个线程同时调用。
pub trait Model: Send + Sync {
  fn infer(&self, image: &RgbImage) -> Result<DetectResult, ModelError>;
  fn labels(&self) -> &LabelMap;
}

/// 模型构造器，负责加载权重
pub trait ModelBuilder: Send + Sync {
  fn build(&self) -> Result<Box<dyn Model>, ModelError>;
}

/// 模型原始输出中的单个目标
#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，原图像素坐标
}

impl DetectItem {
  pub fn new(class_id: u32, score: f32, bbox: [f32; 4]) -> Self {
    Self {
      class_id,
      score,
      bbox,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型加载错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  Invalid(String),
  #[error("模型未配置")]
  NotConfigured,
  #[error("不支持的模型方案: {0}")]
  SchemeMismatch(String),
  #[error("模型参数错误: {0}")]
  Option(String),
  #[error("推理失败: {0}")]
  Runtime(String),
  #[cfg(feature = "model_yolo26")]
  #[error("RKNN 错误: {0}")]
  Rknn(#[from] rknpu::Error),
}

/// 类别编号到名称的映射
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
  names: BTreeMap<u32, String>,
}

impl LabelMap {
  /// 按顺序编号，第 i 个名称对应类别 i
  pub fn from_names<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: names
        .into_iter()
        .enumerate()
        .map(|(id, name)| (id as u32, name.into()))
        .collect(),
    }
  }

  pub fn get(&self, class_id: u32) -> Option<&str> {
    self.names.get(&class_id).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

impl FromStr for LabelMap {
  type Err = ModelError;

  /// 解析逗号分隔的名称列表，例如 `airplane,ship`
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let names: Vec<&str> = s.split(',').map(str::trim).collect();
    if names.iter().any(|name| name.is_empty()) {
      return Err(ModelError::Option(format!("标签列表包含空名称: '{}'", s)));
    }
    Ok(Self::from_names(names))
  }
}

/// 通过 URL 查询参数描述的模型选项
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOptions {
  pub path: String,
  pub labels: LabelMap,
  pub classes: usize,
  pub confidence: f32,
}

pub const DEFAULT_CONFIDENCE: f32 = 0.5;

impl ModelOptions {
  pub fn from_url(url: &Url) -> Result<Self, ModelError> {
    let mut labels = None;
    let mut classes = None;
    let mut confidence = DEFAULT_CONFIDENCE;

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "labels" => labels = Some(value.parse::<LabelMap>()?),
        "classes" => {
          classes = Some(
            value
              .parse::<usize>()
              .map_err(|e| ModelError::Option(format!("classes={}: {}", value, e)))?,
          )
        }
        "conf" => {
          confidence = value
            .parse::<f32>()
            .map_err(|e| ModelError::Option(format!("conf={}: {}", value, e)))?
        }
        other => return Err(ModelError::Option(format!("未知参数: {}", other))),
      }
    }

    let labels = labels.ok_or_else(|| ModelError::Option("缺少 labels 参数".to_string()))?;
    let classes = classes.unwrap_or(labels.len());
    if classes == 0 {
      return Err(ModelError::Option("类别数量不能为 0".to_string()));
    }
    if !(0.0..=1.0).contains(&confidence) {
      return Err(ModelError::Option(format!(
        "置信度阈值必须在 [0, 1] 内: {}",
        confidence
      )));
    }

    Ok(Self {
      path: crate::decode_url_path(url)
        .map_err(|e| ModelError::Option(format!("{}: {}", url.path(), e)))?,
      labels,
      classes,
      confidence,
    })
  }
}

pub mod registry;
pub use self::registry::DetectorRegistry;

#[cfg(feature = "model_yolo26")]
mod yolo26;
#[cfg(feature = "model_yolo26")]
pub use self::yolo26::{Yolo26, Yolo26Builder};

/// 根据 URL 方案创建模型构造器
pub fn builder_from_url(url: &Url) -> Result<Box<dyn ModelBuilder>, ModelError> {
  #[cfg(feature = "model_yolo26")]
  {
    use crate::{FromUrl, FromUrlWithScheme};

    if url.scheme() == Yolo26Builder::SCHEME {
      return Ok(Box::new(Yolo26Builder::from_url(url)?));
    }
  }
  Err(ModelError::SchemeMismatch(url.scheme().to_string()))
}
