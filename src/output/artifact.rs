// 该文件是 Tianyan （天眼） 项目的一部分。
// src/output/artifact.rs - 标注图像与检测记录的持久化
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

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::{Path, PathBuf},
};

use image::{
  ImageEncoder, RgbImage,
  codecs::{jpeg::JpegEncoder, png::PngEncoder},
};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;
use tracing::{info, warn};

use crate::{detection::DetectionSet, mode::Mode};

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

#[derive(Error, Debug)]
pub enum ArtifactError {
  #[error("写入 {path} 失败: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("编码图像 {path} 失败: {source}")]
  Image {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
  #[error("序列化检测记录 {path} 失败: {source}")]
  Record {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// 标注图像的编码方式，压缩参数固定以保证输出稳定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
  Jpeg { quality: u8 },
  Png,
}

impl Default for ImageEncoding {
  fn default() -> Self {
    ImageEncoding::Jpeg {
      quality: DEFAULT_JPEG_QUALITY,
    }
  }
}

impl ImageEncoding {
  pub fn extension(&self) -> &'static str {
    match self {
      ImageEncoding::Jpeg { .. } => "jpg",
      ImageEncoding::Png => "png",
    }
  }
}

/// 一次请求产生的两个产物的位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifacts {
  #[serde(rename = "image_location")]
  pub image_path: PathBuf,
  #[serde(rename = "record_location")]
  pub record_path: PathBuf,
}

/// 产物写入器
///
/// 文件名为 `{base_name}_{mode}_annotated.<ext>` 与
/// `{base_name}_{mode}_detections.json`。先写图像后写记录，
/// 任一步失败时已写入的文件保留原样。
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
  directory: PathBuf,
  encoding: ImageEncoding,
}

impl ArtifactWriter {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      encoding: ImageEncoding::default(),
    }
  }

  pub fn with_encoding(mut self, encoding: ImageEncoding) -> Self {
    self.encoding = encoding;
    self
  }

  pub fn artifact_paths(&self, base_name: &str, mode: Mode) -> Artifacts {
    Artifacts {
      image_path: self.directory.join(format!(
        "{}_{}_annotated.{}",
        base_name,
        mode,
        self.encoding.extension()
      )),
      record_path: self
        .directory
        .join(format!("{}_{}_detections.json", base_name, mode)),
    }
  }

  pub fn persist(
    &self,
    image: &RgbImage,
    detections: &DetectionSet,
    base_name: &str,
    mode: Mode,
  ) -> Result<Artifacts, ArtifactError> {
    std::fs::create_dir_all(&self.directory).map_err(|source| ArtifactError::Io {
      path: self.directory.clone(),
      source,
    })?;

    let artifacts = self.artifact_paths(base_name, mode);
    self.save_image(image, &artifacts.image_path)?;
    if let Err(e) = save_record(detections, &artifacts.record_path) {
      warn!(
        "检测记录写入失败，保留已写入的图像 {}",
        artifacts.image_path.display()
      );
      return Err(e);
    }

    info!(
      "产物已保存: {}, {}",
      artifacts.image_path.display(),
      artifacts.record_path.display()
    );
    Ok(artifacts)
  }

  fn save_image(&self, image: &RgbImage, path: &Path) -> Result<(), ArtifactError> {
    let io_err = |source| ArtifactError::Io {
      path: path.to_path_buf(),
      source,
    };
    let image_err = |source| ArtifactError::Image {
      path: path.to_path_buf(),
      source,
    };

    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    let (width, height) = image.dimensions();
    match self.encoding {
      ImageEncoding::Jpeg { quality } => JpegEncoder::new_with_quality(&mut writer, quality)
        .write_image(image.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .map_err(image_err)?,
      ImageEncoding::Png => PngEncoder::new(&mut writer)
        .write_image(image.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .map_err(image_err)?,
    }
    writer.flush().map_err(io_err)
  }
}

/// 以 4 空格缩进写出 JSON 数组，字段顺序为 class, confidence, bbox
fn save_record(detections: &DetectionSet, path: &Path) -> Result<(), ArtifactError> {
  let file = File::create(path).map_err(|source| ArtifactError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  let mut writer = BufWriter::new(file);
  let mut serializer =
    serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
  detections
    .serialize(&mut serializer)
    .map_err(|source| ArtifactError::Record {
      path: path.to_path_buf(),
      source,
    })?;
  writer.flush().map_err(|source| ArtifactError::Io {
    path: path.to_path_buf(),
    source,
  })
}
