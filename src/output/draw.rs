// 该文件是 Tianyan （天眼） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;

use crate::detection::{Detection, DetectionSet};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const BOX_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const TEXT_COLOR: [u8; 3] = [255, 255, 255];

static DEFAULT_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

#[derive(Error, Debug)]
pub enum AnnotateError {
  #[error("字体加载失败: {0}")]
  Font(#[from] ab_glyph::InvalidFont),
}

/// 在图像副本上绘制检测框与标签
pub struct Annotator {
  font: FontArc,
  scale: PxScale,
  padding: i32,
  thickness: i32,
  box_color: Rgb<u8>,
  text_color: Rgb<u8>,
}

impl Annotator {
  /// 使用内置字体
  pub fn new() -> Result<Self, AnnotateError> {
    Ok(Self::with_font(FontArc::try_from_slice(DEFAULT_FONT)?))
  }

  pub fn with_font(font: FontArc) -> Self {
    Self {
      font,
      scale: PxScale::from(LABEL_FONT_SIZE),
      padding: LABEL_PADDING,
      thickness: BOX_THICKNESS,
      box_color: Rgb(BOX_COLOR),
      text_color: Rgb(TEXT_COLOR),
    }
  }

  pub fn box_color(&self) -> Rgb<u8> {
    self.box_color
  }

  /// 标签文本，例如 `airplane (0.87)`
  pub fn label_text(detection: &Detection) -> String {
    format!("{} ({:.2})", detection.label, detection.confidence)
  }

  /// 返回绘制后的新图像，不修改原图
  pub fn annotate(&self, image: &RgbImage, detections: &DetectionSet) -> RgbImage {
    let mut canvas = image.clone();
    for detection in detections {
      self.draw_bbox(&mut canvas, &detection.bbox);
      self.draw_label(&mut canvas, detection);
    }
    canvas
  }

  fn draw_bbox(&self, image: &mut RgbImage, bbox: &[i32; 4]) {
    let [x_min, y_min, x_max, y_max] = *bbox;

    for t in 0..self.thickness {
      let width = x_max - x_min + 1 - 2 * t;
      let height = y_max - y_min + 1 - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, self.box_color);
    }
  }

  fn draw_label(&self, image: &mut RgbImage, detection: &Detection) {
    let label = Self::label_text(detection);
    let (text_width, text_height) = text_size(self.scale, &self.font, &label);

    let label_height = text_height as i32 + 2 * self.padding;
    // 标签位于边框左上角上方，不超出图像顶部
    let label_x = detection.bbox[0];
    let label_y = (detection.bbox[1] - label_height).max(0);

    let max_width = (image.width() as i32 - label_x).max(0);
    let label_width = (text_width as i32 + 2 * self.padding).min(max_width);

    if label_width > 0 && label_height > 0 {
      let rect = Rect::at(label_x, label_y).of_size(label_width as u32, label_height as u32);
      draw_filled_rect_mut(image, rect, self.box_color);
      draw_text_mut(
        image,
        self.text_color,
        label_x + self.padding,
        label_y + self.padding,
        self.scale,
        &self.font,
        &label,
      );
    }
  }
}
