// 该文件是 Tianyan （天眼） 项目的一部分。
// src/model/yolo26.rs - YOLO26 RKNPU 检测模型
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

use std::sync::Mutex;

use image::{RgbImage, imageops::FilterType};
use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectItem, DetectResult, LabelMap, Model, ModelBuilder, ModelError, ModelOptions},
};

const YOLO26_NUM_INPUTS: u32 = 1;
const YOLO26_NUM_OUTPUTS: u32 = 6;
const YOLO26_INPUT_W: u32 = 640;
const YOLO26_INPUT_H: u32 = 640;
const YOLO26_HEAD_SIZES: [(usize, usize); 3] = [(80, 80), (40, 40), (20, 20)];
const YOLO26_STRIDES: [f32; 3] = [8.0, 16.0, 32.0];

pub struct Yolo26 {
  // RKNN 上下文的输入与执行不可重入
  context: Mutex<Context>,
  labels: LabelMap,
  classes: usize,
  confidence: f32,
}

pub struct Yolo26Builder {
  options: ModelOptions,
}

impl FromUrlWithScheme for Yolo26Builder {
  const SCHEME: &'static str = "yolo26";
}

impl FromUrl for Yolo26Builder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::SchemeMismatch(url.scheme().to_string()));
    }

    Ok(Yolo26Builder {
      options: ModelOptions::from_url(url)?,
    })
  }
}

impl Yolo26Builder {
  pub fn load(&self) -> Result<Yolo26, ModelError> {
    info!("加载模型文件: {}", self.options.path);
    let model_data = std::fs::read(&self.options.path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&model_data, InitFlags::default())?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(ModelError::Invalid(format!("无法查询 SDK 版本: {}", e)));
      }
    }

    let num_inputs = context.num_inputs()?;
    let num_outputs = context.num_outputs()?;

    if num_inputs != YOLO26_NUM_INPUTS || num_outputs != YOLO26_NUM_OUTPUTS {
      error!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        YOLO26_NUM_INPUTS, YOLO26_NUM_OUTPUTS, num_inputs, num_outputs
      );
      return Err(ModelError::Invalid(format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        YOLO26_NUM_INPUTS, YOLO26_NUM_OUTPUTS, num_inputs, num_outputs
      )));
    }

    Ok(Yolo26 {
      context: Mutex::new(context),
      labels: self.options.labels.clone(),
      classes: self.options.classes,
      confidence: self.options.confidence,
    })
  }
}

impl ModelBuilder for Yolo26Builder {
  fn build(&self) -> Result<Box<dyn Model>, ModelError> {
    Ok(Box::new(self.load()?))
  }
}

/// 根据张量大小匹配回归和分类输出
/// 返回 (reg, cls) 元组，如果大小不匹配则返回 None
fn match_reg_cls_tensors<'a>(
  tensor1: &'a [f32],
  tensor2: &'a [f32],
  reg_expected: usize,
  cls_expected: usize,
) -> Option<(&'a [f32], &'a [f32])> {
  if tensor1.len() == reg_expected && tensor2.len() == cls_expected {
    Some((tensor1, tensor2))
  } else if tensor1.len() == cls_expected && tensor2.len() == reg_expected {
    Some((tensor2, tensor1))
  } else {
    None
  }
}

impl Yolo26 {
  /// 解码三个检测头，bbox 为相对输入尺寸的归一化坐标
  fn decode(&self, output: &rknpu::Output) -> Result<Vec<DetectItem>, ModelError> {
    let mut items = Vec::new();
    let (input_w, input_h) = (YOLO26_INPUT_W as f32, YOLO26_INPUT_H as f32);

    for (head_idx, (&(map_h, map_w), stride)) in
      YOLO26_HEAD_SIZES.iter().zip(YOLO26_STRIDES).enumerate()
    {
      let spatial = map_h * map_w;
      let reg_expected = 4 * spatial;
      let cls_expected = self.classes * spatial;

      // RKNN 输出顺序可能不同，根据张量大小区分回归与分类
      let tensor1 = output.get_f32(head_idx * 2)?;
      let tensor2 = output.get_f32(head_idx * 2 + 1)?;
      let (reg, cls) = match_reg_cls_tensors(tensor1, tensor2, reg_expected, cls_expected)
        .ok_or_else(|| {
          ModelError::Runtime(format!(
            "检测头 {}: 输出大小不匹配 ({}, {})，期望回归 {}，分类 {}",
            head_idx,
            tensor1.len(),
            tensor2.len(),
            reg_expected,
            cls_expected
          ))
        })?;

      for h in 0..map_h {
        for w in 0..map_w {
          let idx = h * map_w + w;

          let (score, class_id) = {
            let mut max_logit = f32::MIN;
            let mut cls_idx = 0usize;
            for c in 0..self.classes {
              let logit = cls[c * spatial + idx];
              if logit > max_logit {
                max_logit = logit;
                cls_idx = c;
              }
            }
            (sigmoid(max_logit), cls_idx as u32)
          };

          if score <= self.confidence {
            continue;
          }

          let grid_x = (w as f32) + 0.5;
          let grid_y = (h as f32) + 0.5;

          let xmin = ((grid_x - reg[idx]) * stride).clamp(0.0, input_w);
          let ymin = ((grid_y - reg[spatial + idx]) * stride).clamp(0.0, input_h);
          let xmax = ((grid_x + reg[2 * spatial + idx]) * stride).clamp(0.0, input_w);
          let ymax = ((grid_y + reg[3 * spatial + idx]) * stride).clamp(0.0, input_h);

          items.push(DetectItem {
            class_id,
            score,
            bbox: [
              xmin / input_w,
              ymin / input_h,
              xmax / input_w,
              ymax / input_h,
            ],
          });
        }
      }
    }

    Ok(items)
  }
}

impl Model for Yolo26 {
  fn infer(&self, image: &RgbImage) -> Result<DetectResult, ModelError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return Err(ModelError::Runtime("输入图像为空".to_string()));
    }

    let resized = image::imageops::resize(
      image,
      YOLO26_INPUT_W,
      YOLO26_INPUT_H,
      FilterType::Triangle,
    );

    let mut items = {
      let context = self
        .context
        .lock()
        .map_err(|_| ModelError::Runtime("RKNN 上下文锁已损坏".to_string()))?;

      debug!("设置模型输入");
      context.set_input(0, resized.as_raw(), TensorFormat::NHWC, TensorType::UInt8)?;
      debug!("执行模型推理");
      context.run()?;
      let output = context.get_outputs()?;
      self.decode(&output)?
    };

    // 归一化坐标映射回原图像素
    for item in items.iter_mut() {
      item.bbox[0] *= width as f32;
      item.bbox[1] *= height as f32;
      item.bbox[2] *= width as f32;
      item.bbox[3] *= height as f32;
    }

    debug!("检测到 {} 个物体", items.len());
    Ok(DetectResult::from(items))
  }

  fn labels(&self) -> &LabelMap {
    &self.labels
  }
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}
