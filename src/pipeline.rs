// 该文件是 Tianyan （天眼） 项目的一部分。
// src/pipeline.rs - 检测流水线：模式路由、推理、融合、标注与持久化
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
  sync::{Arc, mpsc},
  thread,
  time::{Duration, Instant},
};

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  detection::{DetectionSet, ImageBounds},
  fusion::fuse,
  input::{InputError, InputImage},
  mode::{InvalidModeError, Mode, ModelId},
  model::{DetectorRegistry, ModelError},
  normalize::{NormalizeError, normalize},
  output::{Annotator, ArtifactError, ArtifactWriter, Artifacts},
};

/// 对外可见的错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
  InvalidMode,
  ModelLoad,
  Inference,
  UnknownClass,
  Persistence,
  Timeout,
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error(transparent)]
  InvalidMode(#[from] InvalidModeError),
  #[error("检测器 {model} 加载失败: {source}")]
  ModelLoad {
    model: ModelId,
    #[source]
    source: ModelError,
  },
  #[error("检测器 {model} 推理失败: {source}")]
  Inference {
    model: ModelId,
    #[source]
    source: ModelError,
  },
  #[error("输入图像无效: {0}")]
  Input(#[from] InputError),
  #[error("检测器推理线程异常退出")]
  WorkerLost,
  #[error("检测器 {model} 输出了标签映射之外的类别 {class_id}")]
  UnknownClass { model: ModelId, class_id: u32 },
  #[error("产物持久化失败: {0}")]
  Persistence(#[from] ArtifactError),
  #[error("请求超过时限 {0:?}")]
  Timeout(Duration),
}

impl PipelineError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      PipelineError::InvalidMode(_) => ErrorKind::InvalidMode,
      PipelineError::ModelLoad { .. } => ErrorKind::ModelLoad,
      PipelineError::Inference { .. } | PipelineError::Input(_) | PipelineError::WorkerLost => {
        ErrorKind::Inference
      }
      PipelineError::UnknownClass { .. } => ErrorKind::UnknownClass,
      PipelineError::Persistence(_) => ErrorKind::Persistence,
      PipelineError::Timeout(_) => ErrorKind::Timeout,
    }
  }

  /// 传输层使用的 HTTP 状态码
  pub fn status_code(&self) -> u16 {
    match self.kind() {
      ErrorKind::InvalidMode => 400,
      ErrorKind::Timeout => 504,
      ErrorKind::ModelLoad
      | ErrorKind::Inference
      | ErrorKind::UnknownClass
      | ErrorKind::Persistence => 500,
    }
  }
}

/// 一次请求的结果：融合后的检测集合与两个产物的位置
#[derive(Debug, Clone, Serialize)]
pub struct DetectionOutcome {
  pub mode: Mode,
  pub detections: DetectionSet,
  #[serde(flatten)]
  pub artifacts: Artifacts,
}

/// 检测流水线
///
/// 根据模式选择检测器并发推理，按模式定义的顺序融合结果，
/// 绘制标注图像后写出产物。任一步失败则整个请求失败。
pub struct Pipeline {
  registry: Arc<DetectorRegistry>,
  annotator: Annotator,
  writer: ArtifactWriter,
  timeout: Option<Duration>,
}

impl Pipeline {
  pub fn new(registry: Arc<DetectorRegistry>, annotator: Annotator, writer: ArtifactWriter) -> Self {
    Self {
      registry,
      annotator,
      writer,
      timeout: None,
    }
  }

  /// 请求时限；超时的请求立即返回，已开始的推理在后台继续运行至结束
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn registry(&self) -> &Arc<DetectorRegistry> {
    &self.registry
  }

  /// 以字符串给出模式，模式无效时不调用任何检测器也不产生 I/O
  pub fn run_str(&self, input: &InputImage, mode: &str) -> Result<DetectionOutcome, PipelineError> {
    let mode = mode.parse::<Mode>().inspect_err(|e| warn!("{}", e))?;
    self.run(input, mode)
  }

  /// 上传接口的入口：先校验模式，再解码图像数据
  pub fn run_bytes(
    &self,
    filename: &str,
    bytes: &[u8],
    mode: &str,
  ) -> Result<DetectionOutcome, PipelineError> {
    let mode = mode.parse::<Mode>().inspect_err(|e| warn!("{}", e))?;
    let input = InputImage::from_bytes(filename, bytes).inspect_err(|e| error!("{}", e))?;
    self.run(&input, mode)
  }

  pub fn run(&self, input: &InputImage, mode: Mode) -> Result<DetectionOutcome, PipelineError> {
    let started = Instant::now();
    let deadline = self.timeout.map(|timeout| started + timeout);
    info!(
      "开始检测: {} ({}x{}), 模式: {}",
      input.base_name(),
      input.bounds().width,
      input.bounds().height,
      mode
    );

    let sets = self.invoke(input.image(), mode.models(), deadline)?;
    let detections = fuse(mode.fusion(), sets);
    info!("融合完成，共 {} 个目标", detections.len());

    self.check_deadline(deadline)?;
    let annotated = self.annotator.annotate(input.image(), &detections);

    self.check_deadline(deadline)?;
    let artifacts = self
      .writer
      .persist(&annotated, &detections, input.base_name(), mode)
      .inspect_err(|e| error!("{}", e))?;
    // 超时写出的产物保留在磁盘上，请求仍按超时失败
    self.check_deadline(deadline)?;

    info!("检测完成，耗时: {:.2?}", started.elapsed());
    Ok(DetectionOutcome {
      mode,
      detections,
      artifacts,
    })
  }

  /// 每个检测器在独立线程中推理，结果按 `models` 的顺序返回，与完成先后无关
  fn invoke(
    &self,
    image: &Arc<RgbImage>,
    models: &[ModelId],
    deadline: Option<Instant>,
  ) -> Result<Vec<DetectionSet>, PipelineError> {
    let (tx, rx) = mpsc::channel();

    for (index, &model) in models.iter().enumerate() {
      let tx = tx.clone();
      let registry = Arc::clone(&self.registry);
      let image = Arc::clone(image);
      thread::spawn(move || {
        let now = Instant::now();
        let result = detect_one(&registry, model, &image);
        debug!("检测器 {} 推理结束，耗时: {:.2?}", model, now.elapsed());
        // 请求已放弃时接收端不存在，结果直接丢弃
        let _ = tx.send((index, result));
      });
    }
    drop(tx);

    let mut slots: Vec<Option<DetectionSet>> = vec![None; models.len()];
    for _ in 0..models.len() {
      let (index, result) = match deadline {
        Some(deadline) => {
          let remaining = deadline.saturating_duration_since(Instant::now());
          rx.recv_timeout(remaining).map_err(|e| match e {
            mpsc::RecvTimeoutError::Timeout => self.timed_out(),
            mpsc::RecvTimeoutError::Disconnected => PipelineError::WorkerLost,
          })?
        }
        None => rx.recv().map_err(|_| PipelineError::WorkerLost)?,
      };
      let set = result.inspect_err(|e| error!("{}", e))?;
      info!("检测器 {} 检测到 {} 个目标", models[index], set.len());
      slots[index] = Some(set);
    }

    slots
      .into_iter()
      .map(|slot| slot.ok_or(PipelineError::WorkerLost))
      .collect()
  }

  fn check_deadline(&self, deadline: Option<Instant>) -> Result<(), PipelineError> {
    match deadline {
      Some(deadline) if Instant::now() >= deadline => Err(self.timed_out()),
      _ => Ok(()),
    }
  }

  fn timed_out(&self) -> PipelineError {
    let timeout = self.timeout.unwrap_or_default();
    warn!("请求超过时限 {:?}，放弃等待", timeout);
    PipelineError::Timeout(timeout)
  }
}

fn detect_one(
  registry: &DetectorRegistry,
  model_id: ModelId,
  image: &RgbImage,
) -> Result<DetectionSet, PipelineError> {
  let model = registry
    .get(model_id)
    .map_err(|source| PipelineError::ModelLoad {
      model: model_id,
      source,
    })?;

  let raw = model
    .infer(image)
    .map_err(|source| PipelineError::Inference {
      model: model_id,
      source,
    })?;

  normalize(&raw, model.labels(), model_id, ImageBounds::of(image)).map_err(|e| match e {
    NormalizeError::UnknownClass(class_id) => PipelineError::UnknownClass {
      model: model_id,
      class_id,
    },
  })
}
