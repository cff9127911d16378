// 该文件是 Tianyan （天眼） 项目的一部分。
// tests/pipeline.rs - 流水线集成测试
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

mod common;

use std::time::Duration;

use serde_json::json;

use common::*;

#[test]
fn airplane_detection_is_recorded_and_drawn() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let model = ScriptedModel::new(["X"]).detect(0, 0.87, [10.0, 10.0, 50.0, 60.0]);
  let registry = DetectorRegistry::new().register(ModelId::Airplane, ScriptedBuilder::new(model));
  let pipeline = pipeline(registry, dir.path())?;

  let outcome = pipeline.run(&input("runway.jpg"), Mode::Airplane)?;

  assert_eq!(outcome.detections.len(), 1);
  let detection = &outcome.detections.as_slice()[0];
  assert_eq!(detection.label, "X");
  assert_eq!(detection.confidence, 0.87);
  assert_eq!(detection.bbox, [10, 10, 50, 60]);

  assert_eq!(
    outcome.artifacts.record_path,
    dir.path().join("runway_airplane_detections.json")
  );
  let record: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(&outcome.artifacts.record_path)?)?;
  assert_eq!(
    record,
    json!([{ "class": "X", "confidence": 0.87, "bbox": [10, 10, 50, 60] }])
  );

  assert_eq!(
    outcome.artifacts.image_path,
    dir.path().join("runway_airplane_annotated.png")
  );
  let annotated = image::open(&outcome.artifacts.image_path)?.to_rgb8();
  assert_eq!(*annotated.get_pixel(10, 40), RED);
  assert_eq!(*annotated.get_pixel(50, 40), RED);
  assert_eq!(*annotated.get_pixel(30, 60), RED);
  assert_eq!(*annotated.get_pixel(30, 40), BACKGROUND);

  Ok(())
}

#[test]
fn both_mode_lists_airplanes_before_ships() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  // 飞机检测器更慢，结果顺序仍然固定
  let airplane = ScriptedModel::new(["airplane"])
    .detect(0, 0.9, [5.0, 5.0, 30.0, 30.0])
    .delayed(Duration::from_millis(150));
  let ship = ScriptedModel::new(["ship"])
    .detect(0, 0.8, [60.0, 50.0, 110.0, 90.0])
    .detect(0, 0.6, [40.0, 40.0, 70.0, 70.0]);
  let registry = DetectorRegistry::new()
    .register(ModelId::Airplane, ScriptedBuilder::new(airplane))
    .register(ModelId::Ship, ScriptedBuilder::new(ship));
  let pipeline = pipeline(registry, dir.path())?;

  let outcome = pipeline.run(&input("harbor.png"), Mode::Both)?;

  let labels: Vec<&str> = outcome.detections.iter().map(|d| d.label.as_str()).collect();
  assert_eq!(labels, ["airplane", "ship", "ship"]);
  let sources: Vec<ModelId> = outcome.detections.iter().map(|d| d.source_model).collect();
  assert_eq!(sources, [ModelId::Airplane, ModelId::Ship, ModelId::Ship]);
  assert!(dir.path().join("harbor_both_detections.json").is_file());

  Ok(())
}

#[test]
fn overlapping_boxes_from_two_models_are_both_kept() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let airplane = ScriptedModel::new(["airplane"]).detect(0, 0.7, [10.0, 10.0, 40.0, 40.0]);
  let ship = ScriptedModel::new(["ship"]).detect(0, 0.7, [10.0, 10.0, 40.0, 40.0]);
  let registry = DetectorRegistry::new()
    .register(ModelId::Airplane, ScriptedBuilder::new(airplane))
    .register(ModelId::Ship, ScriptedBuilder::new(ship));

  let outcome = pipeline(registry, dir.path())?.run(&input("overlap.png"), Mode::Both)?;

  assert_eq!(outcome.detections.len(), 2);
  Ok(())
}

#[test]
fn empty_result_writes_empty_record_and_unchanged_image() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let model = ScriptedModel::new(["ship"]);
  let registry = DetectorRegistry::new().register(ModelId::Ship, ScriptedBuilder::new(model));

  let outcome = pipeline(registry, dir.path())?.run(&input("open_sea.jpg"), Mode::Ship)?;

  assert!(outcome.detections.is_empty());
  assert_eq!(std::fs::read_to_string(&outcome.artifacts.record_path)?, "[]");
  assert_eq!(
    image::open(&outcome.artifacts.image_path)?.to_rgb8(),
    canvas(120, 100)
  );
  Ok(())
}

#[test]
fn unknown_mode_invokes_nothing() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let model = ScriptedModel::new(["airplane"]);
  let calls = model.calls();
  let builder = ScriptedBuilder::new(model);
  let builds = builder.builds();
  let registry = DetectorRegistry::new().register(ModelId::Airplane, builder);

  let err = pipeline(registry, dir.path())?
    .run_str(&input("runway.jpg"), "unknown_mode")
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::InvalidMode);
  assert_eq!(err.status_code(), 400);
  assert_eq!(count(&calls), 0);
  assert_eq!(count(&builds), 0);
  assert_eq!(files_in(dir.path())?, 0);
  Ok(())
}

#[test]
fn undecodable_upload_is_an_inference_error() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let model = ScriptedModel::new(["airplane"]);
  let calls = model.calls();
  let registry = DetectorRegistry::new().register(ModelId::Airplane, ScriptedBuilder::new(model));
  let pipeline = pipeline(registry, dir.path())?;

  let err = pipeline
    .run_bytes("upload.jpg", b"not an image", "airplane")
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Inference);
  assert_eq!(err.status_code(), 500);

  // 模式先于图像校验
  let err = pipeline
    .run_bytes("upload.jpg", b"not an image", "boats")
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidMode);

  assert_eq!(count(&calls), 0);
  assert_eq!(files_in(dir.path())?, 0);
  Ok(())
}

#[test]
fn uploaded_bytes_use_the_filename_stem() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let model = ScriptedModel::new(["ship"]).detect(0, 0.6, [2.0, 2.0, 10.0, 10.0]);
  let registry = DetectorRegistry::new().register(ModelId::Ship, ScriptedBuilder::new(model));

  let mut bytes = Vec::new();
  canvas(32, 24).write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;
  let outcome = pipeline(registry, dir.path())?.run_bytes("/uploads/quay.v2.png", &bytes, "ship")?;

  assert_eq!(
    outcome.artifacts.record_path,
    dir.path().join("quay.v2_ship_detections.json")
  );
  assert_eq!(outcome.detections.len(), 1);
  Ok(())
}

#[test]
fn repeated_requests_give_identical_artifacts() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let model = ScriptedModel::new(["airplane", "ship"])
    .detect(0, 0.87654, [10.4, 12.9, 60.1, 70.0])
    .detect(1, 0.5, [70.0, 20.0, 115.0, 95.0]);
  let builder = ScriptedBuilder::new(model);
  let builds = builder.builds();
  let registry = DetectorRegistry::new().register(ModelId::Combined, builder);
  let pipeline = pipeline(registry, dir.path())?;

  let first = pipeline.run(&input("apron.png"), Mode::Combined)?;
  let first_image = std::fs::read(&first.artifacts.image_path)?;
  let first_record = std::fs::read(&first.artifacts.record_path)?;

  let second = pipeline.run(&input("apron.png"), Mode::Combined)?;

  assert_eq!(first.detections, second.detections);
  assert_eq!(first.artifacts, second.artifacts);
  assert_eq!(std::fs::read(&second.artifacts.image_path)?, first_image);
  assert_eq!(std::fs::read(&second.artifacts.record_path)?, first_record);
  // 模型只加载一次
  assert_eq!(count(&builds), 1);
  Ok(())
}

#[test]
fn slow_detector_times_out_without_artifacts() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let model = ScriptedModel::new(["ship"])
    .detect(0, 0.9, [1.0, 1.0, 20.0, 20.0])
    .delayed(Duration::from_millis(500));
  let registry = DetectorRegistry::new().register(ModelId::Ship, ScriptedBuilder::new(model));
  let pipeline =
    pipeline(registry, dir.path())?.with_timeout(Some(Duration::from_millis(50)));

  let err = pipeline.run(&input("fog.jpg"), Mode::Ship).unwrap_err();

  assert!(matches!(err, PipelineError::Timeout(_)));
  assert_eq!(err.status_code(), 504);
  assert_eq!(files_in(dir.path())?, 0);
  Ok(())
}

#[test]
fn class_outside_label_map_fails_the_request() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let model = ScriptedModel::new(["ship"]).detect(5, 0.9, [1.0, 1.0, 20.0, 20.0]);
  let registry = DetectorRegistry::new().register(ModelId::Ship, ScriptedBuilder::new(model));

  let err = pipeline(registry, dir.path())?
    .run(&input("dock.jpg"), Mode::Ship)
    .unwrap_err();

  assert!(matches!(
    err,
    PipelineError::UnknownClass {
      model: ModelId::Ship,
      class_id: 5
    }
  ));
  assert_eq!(err.status_code(), 500);
  assert_eq!(files_in(dir.path())?, 0);
  Ok(())
}

#[test]
fn load_failure_is_reported_and_retried() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let builder = BrokenBuilder::new();
  let attempts = builder.attempts();
  let registry = DetectorRegistry::new().register(ModelId::Airplane, builder);
  let pipeline = pipeline(registry, dir.path())?;

  for _ in 0..2 {
    let err = pipeline.run(&input("runway.jpg"), Mode::Airplane).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelLoad);
    assert_eq!(err.status_code(), 500);
  }
  assert_eq!(count(&attempts), 2);
  assert!(!pipeline.registry().is_loaded(ModelId::Airplane));
  Ok(())
}

#[test]
fn unconfigured_detector_is_a_load_error() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let registry = DetectorRegistry::new();

  let err = pipeline(registry, dir.path())?
    .run(&input("runway.jpg"), Mode::Combined)
    .unwrap_err();

  assert!(matches!(
    err,
    PipelineError::ModelLoad {
      model: ModelId::Combined,
      source: ModelError::NotConfigured
    }
  ));
  Ok(())
}

#[test]
fn failure_in_either_detector_fails_both_mode() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let airplane = ScriptedModel::new(["airplane"]).detect(0, 0.9, [5.0, 5.0, 30.0, 30.0]);
  let ship = ScriptedModel::new(["ship"]).failing();
  let registry = DetectorRegistry::new()
    .register(ModelId::Airplane, ScriptedBuilder::new(airplane))
    .register(ModelId::Ship, ScriptedBuilder::new(ship));

  let err = pipeline(registry, dir.path())?
    .run(&input("harbor.jpg"), Mode::Both)
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Inference);
  assert_eq!(files_in(dir.path())?, 0);
  Ok(())
}

#[test]
fn boxes_and_confidences_are_normalized() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let model = ScriptedModel::new(["airplane"])
    .detect(0, 1.2, [-5.0, -5.0, 300.0, 400.0])
    .detect(0, -0.1, [50.0, 60.0, 20.0, 10.0])
    .detect(0, 0.5, [130.0, 10.0, 150.0, 20.0]);
  let registry = DetectorRegistry::new().register(ModelId::Airplane, ScriptedBuilder::new(model));

  let outcome = pipeline(registry, dir.path())?.run(&input("edge.jpg"), Mode::Airplane)?;

  // 完全落在图像外的边框被丢弃
  assert_eq!(outcome.detections.len(), 2);
  let [full, swapped] = outcome.detections.as_slice() else {
    anyhow::bail!("检测结果数量不符");
  };
  assert_eq!(full.bbox, [0, 0, 119, 99]);
  assert_eq!(full.confidence, 1.0);
  assert_eq!(swapped.bbox, [20, 10, 50, 60]);
  assert_eq!(swapped.confidence, 0.0);

  for detection in outcome.detections.iter() {
    let [x1, y1, x2, y2] = detection.bbox;
    assert!(0 <= x1 && x1 < x2 && x2 <= 119);
    assert!(0 <= y1 && y1 < y2 && y2 <= 99);
    assert!((0.0..=1.0).contains(&detection.confidence));
  }
  Ok(())
}

#[test]
fn outcome_serializes_with_artifact_locations() -> anyhow::Result<()> {
  let dir = tempfile::TempDir::new()?;
  let model = ScriptedModel::new(["ship"]).detect(0, 0.75, [1.0, 2.0, 3.0, 4.0]);
  let registry = DetectorRegistry::new().register(ModelId::Ship, ScriptedBuilder::new(model));

  let outcome = pipeline(registry, dir.path())?.run(&input("pier.jpg"), Mode::Ship)?;
  let value = serde_json::to_value(&outcome)?;

  assert_eq!(value["mode"], "ship");
  assert_eq!(
    value["detections"],
    json!([{ "class": "ship", "confidence": 0.75, "bbox": [1, 2, 3, 4] }])
  );
  assert!(value["image_location"].is_string());
  assert!(value["record_location"].is_string());
  Ok(())
}
