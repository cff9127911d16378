// 该文件是 Tianyan （天眼） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::PathBuf;

use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, decode_url_path,
  input::{InputError, InputImage},
};

const IMAGE_EXTENSIONS: [&str; 9] = [
  "jpg", "jpeg", "png", "bmp", "gif", "webp", "tif", "tiff", "pnm",
];

/// 单张图像文件，`image:///path/to/file.jpg`
pub struct ImageFileInput {
  path: Option<PathBuf>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::SchemeMismatch(url.scheme().to_string()));
    }

    Ok(ImageFileInput {
      path: Some(PathBuf::from(decode_url_path(url)?)),
    })
  }
}

impl Iterator for ImageFileInput {
  type Item = Result<InputImage, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    self.path.take().map(InputImage::open)
  }
}

/// 目录下的所有图像文件，按文件名排序，`folder:///path/to/dir`
pub struct ImageDirectoryInput {
  entries: std::vec::IntoIter<PathBuf>,
}

impl FromUrlWithScheme for ImageDirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageDirectoryInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(InputError::SchemeMismatch(url.scheme().to_string()));
    }

    let directory = decode_url_path(url)?;
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      if path.is_file() && is_image_file(&path) {
        entries.push(path);
      }
    }
    entries.sort();
    debug!("目录 {} 中共有 {} 张图像", directory, entries.len());

    Ok(ImageDirectoryInput {
      entries: entries.into_iter(),
    })
  }
}

impl Iterator for ImageDirectoryInput {
  type Item = Result<InputImage, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    self.entries.next().map(InputImage::open)
  }
}

fn is_image_file(path: &std::path::Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| {
      IMAGE_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
    })
}
