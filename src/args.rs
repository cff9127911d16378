// 该文件是 Tianyan （天眼） 项目的一部分。
// src/args.rs - 流水线参数配置
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

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Args;
use tracing::info;
use url::Url;

use crate::{
  mode::{Mode, ModelId},
  model::{DetectorRegistry, builder_from_url},
  output::{Annotator, ArtifactWriter, DEFAULT_JPEG_QUALITY, ImageEncoding},
  pipeline::Pipeline,
};

/// 各个可执行程序共用的流水线参数
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
  /// 检测模式: airplane, ship, both, combined
  #[arg(long, default_value_t = Mode::Airplane, value_name = "MODE")]
  pub mode: Mode,

  /// 飞机检测模型，例如 yolo26:///models/airplane.rknn?labels=airplane
  #[arg(long, value_name = "MODEL")]
  pub airplane_model: Option<Url>,

  /// 船舶检测模型
  #[arg(long, value_name = "MODEL")]
  pub ship_model: Option<Url>,

  /// 飞机与船舶联合检测模型
  #[arg(long, value_name = "MODEL")]
  pub combined_model: Option<Url>,

  /// 产物输出目录
  #[arg(long, default_value = "/tmp", value_name = "DIR")]
  pub output_dir: PathBuf,

  /// 单次请求时限（毫秒），不设置则不限时
  #[arg(long, value_name = "MILLIS")]
  pub timeout_ms: Option<u64>,

  /// 标注图像的 JPEG 质量
  #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
  pub jpeg_quality: u8,

  /// 以 PNG 保存标注图像
  #[arg(long)]
  pub png: bool,

  /// 启动时加载全部已配置的模型
  #[arg(long)]
  pub preload: bool,

  /// 发布目标，例如 folder:///srv/processed?base=https://example.com/processed/&dated
  #[arg(long, value_name = "TARGET")]
  pub publish: Option<Url>,
}

impl PipelineArgs {
  fn model_url(&self, id: ModelId) -> Option<&Url> {
    match id {
      ModelId::Airplane => self.airplane_model.as_ref(),
      ModelId::Ship => self.ship_model.as_ref(),
      ModelId::Combined => self.combined_model.as_ref(),
    }
  }

  pub fn encoding(&self) -> ImageEncoding {
    if self.png {
      ImageEncoding::Png
    } else {
      ImageEncoding::Jpeg {
        quality: self.jpeg_quality,
      }
    }
  }

  pub fn registry(&self) -> anyhow::Result<DetectorRegistry> {
    let mut registry = DetectorRegistry::new();
    for id in ModelId::ALL {
      if let Some(url) = self.model_url(id) {
        info!("检测器 {}: {}", id, url);
        registry.register_boxed(id, builder_from_url(url)?);
      }
    }

    if self.preload {
      info!("预加载全部模型...");
      registry
        .preload()
        .map_err(|(id, e)| anyhow::anyhow!("检测器 {} 加载失败: {}", id, e))?;
    }
    Ok(registry)
  }

  pub fn build_pipeline(&self) -> anyhow::Result<Pipeline> {
    let registry = self.registry()?;
    let writer = ArtifactWriter::new(&self.output_dir).with_encoding(self.encoding());
    info!("输出目录: {}", self.output_dir.display());

    Ok(
      Pipeline::new(Arc::new(registry), Annotator::new()?, writer)
        .with_timeout(self.timeout_ms.map(Duration::from_millis)),
    )
  }
}
