// 该文件是 Tianyan （天眼） 项目的一部分。
// src/output/publish.rs - 产物发布
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

use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, decode_url_path, output::Artifacts};

#[derive(Error, Debug)]
pub enum PublishError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("发布参数错误: {0}")]
  Option(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("无法生成 URL: {0}")]
  Url(String),
}

/// 已发布产物的访问地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Published {
  pub image_url: Url,
  pub record_url: Url,
}

/// 产物发布目标，接收本地产物并给出访问地址
pub trait Publish {
  type Error;
  fn publish(&self, artifacts: &Artifacts) -> Result<Published, Self::Error>;
}

impl<P: Publish> Publish for &P {
  type Error = P::Error;

  fn publish(&self, artifacts: &Artifacts) -> Result<Published, Self::Error> {
    (**self).publish(artifacts)
  }
}

/// 不复制文件，直接给出本地 `file://` 地址
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPublisher;

impl Publish for LocalPublisher {
  type Error = PublishError;

  fn publish(&self, artifacts: &Artifacts) -> Result<Published, Self::Error> {
    Ok(Published {
      image_url: file_url(&artifacts.image_path)?,
      record_url: file_url(&artifacts.record_path)?,
    })
  }
}

fn file_url(path: &Path) -> Result<Url, PublishError> {
  let path = std::path::absolute(path)?;
  Url::from_file_path(&path).map_err(|_| PublishError::Url(path.display().to_string()))
}

/// 复制产物到发布目录
///
/// `folder:///srv/processed?base=https://example.com/processed/&dated`，
/// `dated` 时按 UTC 日期分为 `YYYY/MM/DD` 子目录；
/// 未给出 `base` 时返回发布目录中的 `file://` 地址。
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
  directory: PathBuf,
  base: Option<Url>,
  dated: bool,
}

impl FromUrlWithScheme for DirectoryPublisher {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryPublisher {
  type Error = PublishError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(PublishError::SchemeMismatch(url.scheme().to_string()));
    }

    let mut base = None;
    let mut dated = false;
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "base" => {
          let mut parsed = Url::parse(&value)
            .map_err(|e| PublishError::Option(format!("base={}: {}", value, e)))?;
          if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
          }
          base = Some(parsed);
        }
        "dated" => dated = true,
        other => return Err(PublishError::Option(format!("未知参数: {}", other))),
      }
    }

    let directory = decode_url_path(url)
      .map_err(|e| PublishError::Option(format!("{}: {}", url.path(), e)))?;

    Ok(DirectoryPublisher {
      directory: PathBuf::from(directory),
      base,
      dated,
    })
  }
}

impl DirectoryPublisher {
  fn relative_directory(&self) -> PathBuf {
    if !self.dated {
      return PathBuf::new();
    }
    let now = Utc::now();
    PathBuf::from(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()))
  }

  fn copy_one(&self, source: &Path, relative_dir: &Path) -> Result<Url, PublishError> {
    let filename = source
      .file_name()
      .ok_or_else(|| PublishError::Url(source.display().to_string()))?;
    let relative = relative_dir.join(filename);
    let target = self.directory.join(&relative);
    if let Some(parent) = target.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(source, &target)?;

    match &self.base {
      Some(base) => {
        let relative = relative.to_string_lossy().replace('\\', "/");
        base
          .join(&relative)
          .map_err(|e| PublishError::Url(format!("{}: {}", relative, e)))
      }
      None => file_url(&target),
    }
  }
}

impl Publish for DirectoryPublisher {
  type Error = PublishError;

  fn publish(&self, artifacts: &Artifacts) -> Result<Published, Self::Error> {
    let relative_dir = self.relative_directory();
    let published = Published {
      image_url: self.copy_one(&artifacts.image_path, &relative_dir)?,
      record_url: self.copy_one(&artifacts.record_path, &relative_dir)?,
    };
    info!("产物已发布: {}", published.image_url);
    Ok(published)
  }
}
