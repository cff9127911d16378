// 该文件是 Tianyan （天眼） 项目的一部分。
// src/model/registry.rs - 检测器注册表
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

use std::{collections::BTreeMap, sync::Arc};

use once_cell::sync::OnceCell;
use tracing::{error, info};

use crate::{
  mode::ModelId,
  model::{Model, ModelBuilder, ModelError},
};

struct DetectorSlot {
  builder: Box<dyn ModelBuilder>,
  model: OnceCell<Arc<dyn Model>>,
}

/// 进程级检测器注册表
///
/// 启动时构造一次，以 `Arc` 共享给流水线。每个检测器首次使用时加载，
/// 并发的首次请求只会触发一次加载；加载失败不缓存，后续请求可重新尝试。
#[derive(Default)]
pub struct DetectorRegistry {
  slots: BTreeMap<ModelId, DetectorSlot>,
}

impl DetectorRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(mut self, id: ModelId, builder: impl ModelBuilder + 'static) -> Self {
    self.register_boxed(id, Box::new(builder));
    self
  }

  pub fn register_boxed(&mut self, id: ModelId, builder: Box<dyn ModelBuilder>) {
    self.slots.insert(
      id,
      DetectorSlot {
        builder,
        model: OnceCell::new(),
      },
    );
  }

  pub fn is_configured(&self, id: ModelId) -> bool {
    self.slots.contains_key(&id)
  }

  pub fn is_loaded(&self, id: ModelId) -> bool {
    self
      .slots
      .get(&id)
      .is_some_and(|slot| slot.model.get().is_some())
  }

  /// 获取检测器，必要时加载模型
  pub fn get(&self, id: ModelId) -> Result<Arc<dyn Model>, ModelError> {
    let slot = self.slots.get(&id).ok_or_else(|| {
      error!("检测器 {} 未配置模型", id);
      ModelError::NotConfigured
    })?;

    slot
      .model
      .get_or_try_init(|| {
        info!("加载检测器 {} 的模型", id);
        let now = std::time::Instant::now();
        let model = slot.builder.build().inspect_err(|e| {
          error!("检测器 {} 模型加载失败: {}", id, e);
        })?;
        info!("检测器 {} 模型加载完成，耗时: {:.2?}", id, now.elapsed());
        Ok::<_, ModelError>(Arc::from(model))
      })
      .cloned()
  }

  /// 预先加载所有已配置的检测器
  pub fn preload(&self) -> Result<(), (ModelId, ModelError)> {
    for &id in self.slots.keys() {
      self.get(id).map_err(|e| (id, e))?;
    }
    Ok(())
  }
}
