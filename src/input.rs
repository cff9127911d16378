// 该文件是 Tianyan （天眼） 项目的一部分。
// src/input.rs - 图像输入
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

use std::{path::Path, sync::Arc};

use image::{ImageReader, RgbImage};
use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme, detection::ImageBounds};

mod read_image_file;
pub use self::read_image_file::{ImageDirectoryInput, ImageFileInput};

const DEFAULT_BASE_NAME: &str = "image";

#[derive(Error, Debug)]
pub enum InputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像解码错误: {0}")]
  Decode(#[from] image::ImageError),
  #[error("路径编码无效: {0}")]
  Path(#[from] std::string::FromUtf8Error),
}

/// 一次请求的输入图像
///
/// 像素数据以 `Arc` 共享，多个检测器并发读取同一份图像。
#[derive(Debug, Clone)]
pub struct InputImage {
  base_name: String,
  image: Arc<RgbImage>,
}

impl InputImage {
  /// `filename` 可以带路径和扩展名，只保留文件名主干
  pub fn new(filename: &str, image: RgbImage) -> Self {
    Self {
      base_name: base_name(filename),
      image: Arc::new(image),
    }
  }

  /// 解码上传的图像数据
  pub fn from_bytes(filename: &str, bytes: &[u8]) -> Result<Self, InputError> {
    let image = image::load_from_memory(bytes)?.into_rgb8();
    Ok(Self::new(filename, image))
  }

  pub fn open(path: impl AsRef<Path>) -> Result<Self, InputError> {
    let path = path.as_ref();
    let image = ImageReader::open(path)?
      .with_guessed_format()?
      .decode()?
      .into_rgb8();
    Ok(Self::new(&path.to_string_lossy(), image))
  }

  pub fn base_name(&self) -> &str {
    &self.base_name
  }

  pub fn image(&self) -> &Arc<RgbImage> {
    &self.image
  }

  pub fn bounds(&self) -> ImageBounds {
    ImageBounds::of(&self.image)
  }
}

/// 输入文件名去掉目录与扩展名
pub fn base_name(filename: &str) -> String {
  Path::new(filename)
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .filter(|stem| !stem.is_empty())
    .unwrap_or_else(|| DEFAULT_BASE_NAME.to_string())
}

pub enum InputWrapper {
  ImageFile(ImageFileInput),
  Directory(ImageDirectoryInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ImageFile(ImageFileInput::from_url(url)?)),
      ImageDirectoryInput::SCHEME => Ok(InputWrapper::Directory(ImageDirectoryInput::from_url(
        url,
      )?)),
      other => Err(InputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = Result<InputImage, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ImageFile(input) => input.next(),
      InputWrapper::Directory(input) => input.next(),
    }
  }
}
