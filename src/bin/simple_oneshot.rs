// 该文件是 Tianyan （天眼） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像检测
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use tianyan::{
  FromUrl,
  args::PipelineArgs,
  input::InputWrapper,
  output::PublishWrapper,
  task::{OneShotTask, Task},
};

/// Tianyan 单张图像检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源，例如 image:///data/harbor.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  #[command(flatten)]
  pub pipeline: PipelineArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("检测模式: {}", args.pipeline.mode);

  let input = InputWrapper::from_url(&args.input)?;
  let pipeline = args.pipeline.build_pipeline()?;
  let output = PublishWrapper::from_option(args.pipeline.publish.as_ref())?;

  let summary = OneShotTask::new(args.pipeline.mode).run_task(input, &pipeline, output)?;
  println!("{}", serde_json::to_string_pretty(&summary)?);

  Ok(())
}
