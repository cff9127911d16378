// 该文件是 Tianyan （天眼） 项目的一部分。
// src/output.rs - 输出定义
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
use url::Url;

use crate::FromUrl;

pub mod draw;
pub use self::draw::{AnnotateError, Annotator};

mod artifact;
pub use self::artifact::{
  ArtifactError, ArtifactWriter, Artifacts, DEFAULT_JPEG_QUALITY, ImageEncoding,
};

mod publish;
pub use self::publish::{
  DirectoryPublisher, LocalPublisher, Publish, PublishError, Published,
};

/// 命令行可选的发布目标
pub enum PublishWrapper {
  Local(LocalPublisher),
  Directory(DirectoryPublisher),
}

impl PublishWrapper {
  pub fn from_option(url: Option<&Url>) -> Result<Self, PublishError> {
    match url {
      Some(url) => Self::from_url(url),
      None => Ok(PublishWrapper::Local(LocalPublisher)),
    }
  }
}

impl FromUrl for PublishWrapper {
  type Error = PublishError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    match url.scheme() {
      DirectoryPublisher::SCHEME => Ok(PublishWrapper::Directory(DirectoryPublisher::from_url(
        url,
      )?)),
      other => Err(PublishError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Publish for PublishWrapper {
  type Error = PublishError;

  fn publish(&self, artifacts: &Artifacts) -> Result<Published, Self::Error> {
    match self {
      PublishWrapper::Local(publisher) => publisher.publish(artifacts),
      PublishWrapper::Directory(publisher) => publisher.publish(artifacts),
    }
  }
}

/// 单次请求的检测结果与发布地址，对应接口返回的 JSON
#[derive(Debug, Clone, Serialize)]
pub struct Report {
  #[serde(flatten)]
  pub outcome: crate::pipeline::DetectionOutcome,
  #[serde(flatten)]
  pub published: Published,
}
