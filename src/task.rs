// 该文件是 Tianyan （天眼） 项目的一部分。
// src/task.rs - 单次与连续检测任务
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
  sync::mpsc::{self, Receiver},
  thread,
  time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{info, warn};

use crate::{
  input::{InputError, InputImage},
  mode::Mode,
  output::{Publish, Report},
  pipeline::Pipeline,
};

pub trait Task<I, O>: Sized {
  type Error;
  fn run_task(self, input: I, pipeline: &Pipeline, output: O) -> Result<TaskSummary, Self::Error>;
}

/// 任务内所有请求的报告
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskSummary {
  pub reports: Vec<Report>,
  pub total_detections: usize,
}

impl TaskSummary {
  fn push(&mut self, report: Report) {
    self.total_detections += report.outcome.detections.len();
    self.reports.push(report);
  }
}

fn process_one<O>(
  pipeline: &Pipeline,
  mode: Mode,
  image: &InputImage,
  output: &O,
) -> anyhow::Result<Report>
where
  O: Publish,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  let outcome = pipeline.run(image, mode)?;
  let published = output.publish(&outcome.artifacts)?;
  Ok(Report { outcome, published })
}

/// 处理输入中的第一张图像
#[derive(Debug, Default, Clone, Copy)]
pub struct OneShotTask {
  mode: Mode,
}

impl OneShotTask {
  pub fn new(mode: Mode) -> Self {
    Self { mode }
  }
}

impl<I, O> Task<I, O> for OneShotTask
where
  I: Iterator<Item = Result<InputImage, InputError>>,
  O: Publish,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, pipeline: &Pipeline, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let image = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))??;
    info!("输入图像读取成功，开始检测...");
    let now = Instant::now();
    let report = process_one(pipeline, self.mode, &image, &output)?;
    info!("任务完成，耗时: {:.2?}", now.elapsed());

    let mut summary = TaskSummary::default();
    summary.push(report);
    Ok(summary)
  }
}

/// 依次处理输入中的全部图像，遇到第一个错误即中止
#[derive(Default, Debug)]
pub struct ContinuousTask {
  mode: Mode,
  frame_number: Option<usize>,
  interruptible: bool,
}

impl ContinuousTask {
  pub fn new(mode: Mode) -> Self {
    Self {
      mode,
      ..Default::default()
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 收到 Ctrl-C 后处理完当前图像即退出；每个进程只能启用一次
  pub fn with_ctrlc(mut self, interruptible: bool) -> Self {
    self.interruptible = interruptible;
    self
  }

  fn stop_signal(&self) -> Result<Option<Receiver<()>>, ctrlc::Error> {
    if !self.interruptible {
      return Ok(None);
    }
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(Some(rx))
  }
}

impl<I, O> Task<I, O> for ContinuousTask
where
  I: Iterator<Item = Result<InputImage, InputError>>,
  O: Publish,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, pipeline: &Pipeline, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let stop = self.stop_signal()?;

    let mut summary = TaskSummary::default();
    for (index, image) in input.enumerate() {
      let image = image?;
      info!("处理第 {} 张图像: {}", index + 1, image.base_name());
      let now = Instant::now();
      let report = process_one(pipeline, self.mode, &image, &output)?;
      info!(
        "第 {} 张图像完成，{} 个目标，耗时: {:.2?}",
        index + 1,
        report.outcome.detections.len(),
        now.elapsed()
      );
      summary.push(report);

      if self.frame_number.is_some_and(|n| index + 1 >= n) {
        info!("达到指定图像数 {}, 退出任务循环", index + 1);
        break;
      }
      if stop.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!(
      "任务完成，共处理 {} 张图像，{} 个目标",
      summary.reports.len(),
      summary.total_detections
    );
    Ok(summary)
  }
}
