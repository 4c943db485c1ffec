// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/pipeline.rs - 摆迹流水线状态机
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Bobtrack contributors

//! # 轨迹流水线
//!
//! 流水线按以下状态推进：
//!
//! ```text
//! Uncalibrated ──▶ PivotPending ──▶ Tracking ──▶ Done
//!      │                │                          ▲
//!      └── 标定失败 ────┴── 用户取消 ──────────────┘
//! ```
//!
//! - `Uncalibrated`：读取第一帧。启用标定时在该帧上检测四个标记并求解单应矩阵，
//!   该帧被标定消耗，不再参与追踪；未启用标定时直接进入下一状态。
//! - `PivotPending`：在第一帧（启用标定时为矫正后的画面）上选择支点。
//! - `Tracking`：逐帧矫正、追踪摆锤并输出 [`TrajectorySample`]，未检测到摆锤的帧被跳过。
//! - `Done`：帧源耗尽、用户取消、收到退出请求或发生致命错误后不再做任何工作。
//!
//! [`Trajectory`] 是一次性的惰性序列，每次 `next` 最多拉取一帧。

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  calibration::{CALIBRATION_MARKERS, Calibration, CalibrationError, Calibrator},
  config::{ConfigError, TrackerConfig},
  frame::Frame,
  input::InputError,
  output::{InteractiveDisplay, OutputError, draw::Draw},
  pivot::{PivotError, PivotPoint, select_pivot},
  tracker::Tracker,
  vision::{ColorSegmenter, MarkerCandidate, detect_markers},
};

/// 追踪画面窗口标题
pub const TRACKING_WINDOW: &str = "Pendulum Visual Analysis";
/// 标定画面窗口标题
pub const CALIBRATION_WINDOW: &str = "Calibration Markers";

/// 一帧的追踪结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
  pub frame_index: u64,
  pub timestamp_ms: u64,
  /// 摆锤圆心，处于矫正后（或原始）画面坐标系
  pub bob_position: (f64, f64),
  pub radius: f64,
  /// 相对竖直向下方向的摆角（弧度）
  pub angle: f64,
}

impl TrajectorySample {
  pub fn angle_degrees(&self) -> f64 {
    self.angle.to_degrees()
  }
}

/// 终止运行的错误
#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("标定失败: {0}")]
  Calibration(#[from] CalibrationError),
  #[error("帧源错误: {0}")]
  Input(#[from] InputError),
  #[error("显示错误: {0}")]
  Display(#[from] OutputError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
  Uncalibrated,
  PivotPending,
  Tracking,
  Done,
}

/// 流水线结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
  /// 帧源耗尽
  Exhausted,
  /// 支点选择被取消
  Cancelled,
  /// 追踪过程中收到退出请求
  QuitRequested,
  /// 发生致命错误
  Failed,
}

/// 一次状态推进的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
  Calibrated { frame_index: u64 },
  CalibrationSkipped { frame_index: u64 },
  PivotSelected(PivotPoint),
  Sample(TrajectorySample),
  Missed { frame_index: u64 },
  Finished(Termination),
}

/// 流水线的静态部分：配置与各阶段的处理器
pub struct TrajectoryPipeline {
  config: TrackerConfig,
  segmenter: ColorSegmenter,
  calibrator: Option<Calibrator>,
  tracker: Tracker,
  draw: Draw,
}

impl TrajectoryPipeline {
  pub fn new(config: TrackerConfig) -> Result<Self, PipelineError> {
    config.validate()?;
    let calibrator = if config.calibration_enabled {
      Some(Calibrator::from_config(&config)?)
    } else {
      None
    };

    Ok(Self {
      segmenter: ColorSegmenter::new(config.blur_kernel_size),
      tracker: Tracker::from_config(&config),
      calibrator,
      config,
      draw: Draw::default(),
    })
  }

  pub fn config(&self) -> &TrackerConfig {
    &self.config
  }

  /// 绑定帧源与显示端，得到惰性的轨迹序列
  pub fn run<I, D>(self, source: I, display: D) -> Trajectory<I::IntoIter, D>
  where
    I: IntoIterator<Item = Result<Frame, InputError>>,
    D: InteractiveDisplay,
  {
    Trajectory {
      pipeline: self,
      source: source.into_iter(),
      display,
      state: PipelineState::Uncalibrated,
      calibration: None,
      pivot: None,
      pending: None,
      termination: None,
      frames: 0,
      samples: 0,
      misses: 0,
    }
  }
}

/// 等待追踪的第一帧
struct PendingFrame {
  frame: Frame,
  /// 已被标定消耗，选完支点后丢弃
  consumed: bool,
}

pub struct Trajectory<I, D> {
  pipeline: TrajectoryPipeline,
  source: I,
  display: D,
  state: PipelineState,
  calibration: Option<Calibration>,
  pivot: Option<PivotPoint>,
  pending: Option<PendingFrame>,
  termination: Option<Termination>,
  frames: u64,
  samples: u64,
  misses: u64,
}

impl<I, D> Trajectory<I, D>
where
  I: Iterator<Item = Result<Frame, InputError>>,
  D: InteractiveDisplay,
{
  pub fn state(&self) -> PipelineState {
    self.state
  }

  pub fn calibration(&self) -> Option<&Calibration> {
    self.calibration.as_ref()
  }

  pub fn pivot(&self) -> Option<PivotPoint> {
    self.pivot
  }

  /// 结束原因，运行中为 `None`
  pub fn termination(&self) -> Option<Termination> {
    self.termination
  }

  pub fn frames_pulled(&self) -> u64 {
    self.frames
  }

  pub fn samples_emitted(&self) -> u64 {
    self.samples
  }

  pub fn misses(&self) -> u64 {
    self.misses
  }

  pub fn display(&self) -> &D {
    &self.display
  }

  pub fn into_display(self) -> D {
    self.display
  }

  /// 推进一步；进入 `Done` 之后返回 `None`
  pub fn advance(&mut self) -> Option<Result<Transition, PipelineError>> {
    let result = match self.state {
      PipelineState::Uncalibrated => self.calibrate_step(),
      PipelineState::PivotPending => self.pivot_step(),
      PipelineState::Tracking => self.tracking_step(),
      PipelineState::Done => return None,
    };

    if let Err(e) = &result {
      error!("流水线终止: {}", e);
      self.finish(Termination::Failed);
    }
    Some(result)
  }

  fn finish(&mut self, termination: Termination) -> Transition {
    self.state = PipelineState::Done;
    self.termination = Some(termination);
    self.pending = None;
    info!(
      "流水线结束 ({:?})：读取 {} 帧，输出 {} 个样本，{} 帧未检测到摆锤",
      termination, self.frames, self.samples, self.misses
    );
    Transition::Finished(termination)
  }

  fn pull(&mut self) -> Result<Option<Frame>, PipelineError> {
    let frame = self.source.next().transpose()?;
    if frame.is_some() {
      self.frames += 1;
    }
    Ok(frame)
  }

  fn calibrate_step(&mut self) -> Result<Transition, PipelineError> {
    let Some(frame) = self.pull()? else {
      warn!("帧源中没有任何帧");
      return Ok(self.finish(Termination::Exhausted));
    };
    let frame_index = frame.index;

    let Some(calibrator) = &self.pipeline.calibrator else {
      debug!("未启用标定，第 {} 帧直接用于选择支点", frame_index);
      self.pending = Some(PendingFrame {
        frame,
        consumed: false,
      });
      self.state = PipelineState::PivotPending;
      return Ok(Transition::CalibrationSkipped { frame_index });
    };

    let config = &self.pipeline.config;
    let markers = detect_markers(
      &self.pipeline.segmenter,
      &frame.image,
      &config.color_range_markers,
      CALIBRATION_MARKERS,
      config.bottom_mask_rows,
    );
    debug!("第 {} 帧检测到 {} 个标定标记", frame_index, markers.len());
    let calibration = calibrator.calibrate(&markers)?;

    let mut annotated = frame.image.clone();
    self
      .pipeline
      .draw
      .draw_calibration_markers(&mut annotated, calibration.markers());
    self.display.show(&annotated, CALIBRATION_WINDOW)?;

    let warped = calibration.warp(&frame.image);
    self.pending = Some(PendingFrame {
      frame: frame.with_image(warped),
      consumed: true,
    });
    self.calibration = Some(calibration);
    self.state = PipelineState::PivotPending;
    Ok(Transition::Calibrated { frame_index })
  }

  fn pivot_step(&mut self) -> Result<Transition, PipelineError> {
    let Some(pending) = self.pending.take() else {
      return Ok(self.finish(Termination::Exhausted));
    };

    match select_pivot(&mut self.display, &pending.frame.image) {
      Ok(pivot) => {
        self.pivot = Some(pivot);
        if !pending.consumed {
          self.pending = Some(pending);
        }
        self.state = PipelineState::Tracking;
        Ok(Transition::PivotSelected(pivot))
      }
      Err(PivotError::UserCancelled) => Ok(self.finish(Termination::Cancelled)),
      Err(PivotError::Display(e)) => Err(e.into()),
    }
  }

  fn next_tracking_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
    if let Some(pending) = self.pending.take() {
      return Ok(Some(pending.frame));
    }
    let Some(frame) = self.pull()? else {
      return Ok(None);
    };
    Ok(Some(match &self.calibration {
      Some(calibration) => {
        let warped = calibration.warp(&frame.image);
        frame.with_image(warped)
      }
      None => frame,
    }))
  }

  fn tracking_step(&mut self) -> Result<Transition, PipelineError> {
    if self.display.poll_cancel() {
      warn!("收到退出请求，停止追踪");
      return Ok(self.finish(Termination::QuitRequested));
    }

    let Some(frame) = self.next_tracking_frame()? else {
      return Ok(self.finish(Termination::Exhausted));
    };
    let Frame {
      image,
      index,
      timestamp_ms,
    } = frame;

    let bob = self.pipeline.tracker.track(&image);
    self.show_tracking(image, bob.as_ref())?;

    match (bob, self.pivot) {
      (Some(bob), Some(pivot)) => {
        self.samples += 1;
        Ok(Transition::Sample(TrajectorySample {
          frame_index: index,
          timestamp_ms,
          bob_position: bob.center,
          radius: bob.radius,
          angle: pivot.angle_to(bob.center),
        }))
      }
      _ => {
        debug!("第 {} 帧未检测到摆锤，跳过", index);
        self.misses += 1;
        Ok(Transition::Missed { frame_index: index })
      }
    }
  }

  fn show_tracking(
    &mut self,
    mut image: RgbImage,
    bob: Option<&MarkerCandidate>,
  ) -> Result<(), PipelineError> {
    self
      .pipeline
      .draw
      .draw_tracking(&mut image, self.pivot.as_ref(), bob);
    self.display.show(&image, TRACKING_WINDOW)?;
    Ok(())
  }
}

impl<I, D> Iterator for Trajectory<I, D>
where
  I: Iterator<Item = Result<Frame, InputError>>,
  D: InteractiveDisplay,
{
  type Item = Result<TrajectorySample, PipelineError>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      match self.advance()? {
        Ok(Transition::Sample(sample)) => return Some(Ok(sample)),
        Ok(_) => continue,
        Err(e) => return Some(Err(e)),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::input::MemoryInput;
  use crate::output::{NullOutput, PointPicker};
  use image::Rgb;
  use imageproc::drawing::draw_filled_circle_mut;

  const BOB: Rgb<u8> = Rgb([200, 0, 100]);

  fn uncalibrated() -> TrackerConfig {
    TrackerConfig {
      calibration_enabled: false,
      ..TrackerConfig::default()
    }
  }

  fn bob_frame(center: Option<(i32, i32)>) -> RgbImage {
    let mut image = RgbImage::new(160, 120);
    if let Some(center) = center {
      draw_filled_circle_mut(&mut image, center, 10, BOB);
    }
    image
  }

  #[test]
  fn invalid_config_is_rejected() {
    let config = TrackerConfig {
      blur_kernel_size: 4,
      ..TrackerConfig::default()
    };
    assert!(matches!(
      TrajectoryPipeline::new(config),
      Err(PipelineError::Config(_))
    ));
  }

  #[test]
  fn transitions_without_calibration() {
    let source = MemoryInput::new(vec![
      bob_frame(Some((80, 90))),
      bob_frame(None),
      bob_frame(Some((100, 80))),
    ]);
    let display = NullOutput::new(PointPicker::Preset(80.0, 10.0));
    let mut trajectory = TrajectoryPipeline::new(uncalibrated())
      .unwrap()
      .run(source, display);

    assert_eq!(trajectory.state(), PipelineState::Uncalibrated);
    assert_eq!(
      trajectory.advance().unwrap().unwrap(),
      Transition::CalibrationSkipped { frame_index: 0 }
    );
    assert_eq!(trajectory.state(), PipelineState::PivotPending);
    assert_eq!(
      trajectory.advance().unwrap().unwrap(),
      Transition::PivotSelected(PivotPoint::new(80.0, 10.0))
    );

    let Transition::Sample(first) = trajectory.advance().unwrap().unwrap() else {
      panic!("第一帧应当被追踪");
    };
    assert_eq!(first.frame_index, 0);
    assert!(first.angle_degrees().abs() < 1.0);

    assert_eq!(
      trajectory.advance().unwrap().unwrap(),
      Transition::Missed { frame_index: 1 }
    );
    assert!(matches!(
      trajectory.advance().unwrap().unwrap(),
      Transition::Sample(TrajectorySample { frame_index: 2, .. })
    ));
    assert_eq!(
      trajectory.advance().unwrap().unwrap(),
      Transition::Finished(Termination::Exhausted)
    );
    assert!(trajectory.advance().is_none());
    assert_eq!(trajectory.state(), PipelineState::Done);
    assert_eq!(trajectory.frames_pulled(), 3);
    assert_eq!(trajectory.samples_emitted(), 2);
    assert_eq!(trajectory.misses(), 1);
  }

  #[test]
  fn empty_source_is_exhausted() {
    let mut trajectory = TrajectoryPipeline::new(TrackerConfig::default())
      .unwrap()
      .run(MemoryInput::new(Vec::new()), NullOutput::default());
    assert!(trajectory.next().is_none());
    assert_eq!(trajectory.termination(), Some(Termination::Exhausted));
    assert!(trajectory.calibration().is_none());
  }

  #[test]
  fn missing_markers_fail_calibration() {
    let source = MemoryInput::new(vec![bob_frame(None), bob_frame(Some((80, 90)))]);
    let mut trajectory = TrajectoryPipeline::new(TrackerConfig::default())
      .unwrap()
      .run(source, NullOutput::new(PointPicker::Preset(0.0, 0.0)));

    assert!(matches!(
      trajectory.next(),
      Some(Err(PipelineError::Calibration(
        CalibrationError::WrongMarkerCount { found: 0, .. }
      )))
    ));
    assert!(trajectory.next().is_none());
    assert_eq!(trajectory.termination(), Some(Termination::Failed));
    assert_eq!(trajectory.frames_pulled(), 1);
  }

  #[test]
  fn cancelled_pivot_ends_cleanly() {
    let source = MemoryInput::new(vec![bob_frame(Some((80, 90))), bob_frame(Some((80, 90)))]);
    let mut trajectory = TrajectoryPipeline::new(uncalibrated())
      .unwrap()
      .run(source, NullOutput::new(PointPicker::Cancel));

    assert!(trajectory.next().is_none());
    assert_eq!(trajectory.termination(), Some(Termination::Cancelled));
    assert_eq!(trajectory.frames_pulled(), 1);
    assert!(trajectory.pivot().is_none());
  }
}
