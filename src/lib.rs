// 该文件是 Tianyan （天眼） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod args;
pub mod detection;
pub mod fusion;
pub mod input;
pub mod mode;
pub mod model;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod task;

pub use self::detection::{Detection, DetectionSet, ImageBounds};
pub use self::mode::{InvalidModeError, Mode, ModelId};
pub use self::pipeline::{DetectionOutcome, ErrorKind, Pipeline, PipelineError};

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// URL 中的本地路径，百分号编码还原为原字符，例如 `%20` 还原为空格
pub fn decode_url_path(url: &url::Url) -> Result<String, std::string::FromUtf8Error> {
  urlencoding::decode(url.path()).map(|path| path.into_owned())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_path_is_percent_decoded() {
    let url = url::Url::parse("image:///data/my photo%E5%9B%BE.png").unwrap();
    assert_eq!(url.path(), "/data/my%20photo%E5%9B%BE.png");
    assert_eq!(decode_url_path(&url).unwrap(), "/data/my photo图.png");
  }

  #[test]
  fn invalid_utf8_path_is_rejected() {
    let url = url::Url::parse("folder:///data/%FF").unwrap();
    assert!(decode_url_path(&url).is_err());
  }
}
