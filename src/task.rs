// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/task.rs - 任务驱动
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

use std::{
  sync::mpsc::{self, Receiver},
  thread,
  time::{Duration, Instant},
};

use anyhow::Context;
use image::RgbImage;
use tracing::{info, warn};

use crate::{
  config::TrackerConfig,
  frame::Frame,
  input::InputError,
  output::{Click, InteractiveDisplay, OutputError, TrajectorySink},
  pipeline::{Termination, TrajectoryPipeline},
  pivot::PivotPoint,
};

pub trait Task<I, D, O>: Sized {
  type Error;
  fn run_task(self, input: I, display: D, output: O) -> Result<TaskSummary, Self::Error>;
}

/// 一次运行的统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskSummary {
  pub frames: u64,
  pub samples: u64,
  pub misses: u64,
  pub pivot: Option<PivotPoint>,
  pub termination: Termination,
}

/// 为显示端附加外部退出信号
///
/// 信号一旦收到就保持有效，之后每次 `poll_cancel` 都返回 `true`。
pub struct Interruptible<D> {
  inner: D,
  signal: Option<Receiver<()>>,
  interrupted: bool,
}

impl<D> Interruptible<D> {
  pub fn new(inner: D, signal: Option<Receiver<()>>) -> Self {
    Self {
      inner,
      signal,
      interrupted: false,
    }
  }

  pub fn into_inner(self) -> D {
    self.inner
  }
}

impl<D: InteractiveDisplay> InteractiveDisplay for Interruptible<D> {
  fn show(&mut self, frame: &RgbImage, window: &str) -> Result<(), OutputError> {
    self.inner.show(frame, window)
  }

  fn poll_cancel(&mut self) -> bool {
    if !self.interrupted
      && let Some(signal) = &self.signal
      && signal.try_recv().is_ok()
    {
      warn!("中断信号接收，退出任务循环");
      self.interrupted = true;
    }
    self.interrupted || self.inner.poll_cancel()
  }

  fn wait_for_click(&mut self, window: &str) -> Result<Click, OutputError> {
    self.inner.wait_for_click(window)
  }
}

/// 安装 Ctrl-C 处理函数，返回信号接收端
///
/// 收到信号 30 秒后仍未退出时强制结束进程。
pub fn install_interrupt_handler() -> anyhow::Result<Receiver<()>> {
  let (tx, rx) = mpsc::channel();

  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
  .context("无法设置 Ctrl-C 处理函数")?;

  Ok(rx)
}

/// 持续读取帧直到帧源耗尽、用户取消或收到中断
#[derive(Debug)]
pub struct ContinuousTask {
  config: TrackerConfig,
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl Default for ContinuousTask {
  fn default() -> Self {
    Self::new(TrackerConfig::default())
  }
}

impl ContinuousTask {
  pub fn new(config: TrackerConfig) -> Self {
    Self {
      config,
      frame_number: None,
      handle_interrupt: true,
    }
  }

  /// 最多读取的帧数（包括标定帧）
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_interrupt_handler(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }
}

impl<I, D, O> Task<I, D, O> for ContinuousTask
where
  I: Iterator<Item = Result<Frame, InputError>>,
  D: InteractiveDisplay,
  O: TrajectorySink,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, display: D, mut output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let pipeline = TrajectoryPipeline::new(self.config).context("无法创建追踪流水线")?;

    let signal = if self.handle_interrupt {
      Some(install_interrupt_handler()?)
    } else {
      None
    };
    let display = Interruptible::new(display, signal);
    let input = input.take(self.frame_number.unwrap_or(usize::MAX));

    let mut trajectory = pipeline.run(input, display);
    let mut now = Instant::now();
    for sample in &mut trajectory {
      let sample = sample?;
      output.record(&sample).context("无法记录轨迹样本")?;
      info!(
        "第 {} 帧：摆角 {:.2}°，耗时 {:.2?}",
        sample.frame_index,
        sample.angle_degrees(),
        now.elapsed()
      );
      now = Instant::now();
    }
    output.finish().context("无法完成轨迹记录")?;

    if let Some(n) = self.frame_number
      && trajectory.frames_pulled() >= n as u64
    {
      info!("达到指定帧数 {}, 退出任务循环", n);
    }

    let summary = TaskSummary {
      frames: trajectory.frames_pulled(),
      samples: trajectory.samples_emitted(),
      misses: trajectory.misses(),
      pivot: trajectory.pivot(),
      termination: trajectory.termination().unwrap_or(Termination::Exhausted),
    };
    info!("任务完成，退出");
    Ok(summary)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::input::MemoryInput;
  use crate::output::{NullOutput, PointPicker};
  use crate::pipeline::TrajectorySample;
  use image::Rgb;
  use imageproc::drawing::draw_filled_circle_mut;

  fn frames(count: usize) -> MemoryInput {
    MemoryInput::new((0..count).map(|i| {
      let mut image = RgbImage::new(160, 120);
      draw_filled_circle_mut(&mut image, (60 + 5 * i as i32, 90), 10, Rgb([200, 0, 100]));
      image
    }))
  }

  fn task() -> ContinuousTask {
    ContinuousTask::new(TrackerConfig {
      calibration_enabled: false,
      ..TrackerConfig::default()
    })
    .with_interrupt_handler(false)
  }

  #[test]
  fn frame_limit_stops_the_run() {
    let mut samples: Vec<TrajectorySample> = Vec::new();
    let summary = task()
      .with_frame_number(Some(3))
      .run_task(
        frames(10),
        NullOutput::new(PointPicker::Preset(60.0, 10.0)),
        &mut samples,
      )
      .unwrap();

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.samples, 3);
    assert_eq!(summary.termination, Termination::Exhausted);
    assert_eq!(summary.pivot, Some(PivotPoint::new(60.0, 10.0)));
    let indices: Vec<u64> = samples.iter().map(|s| s.frame_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
  }

  #[test]
  fn cancelled_run_records_nothing() {
    let mut samples: Vec<TrajectorySample> = Vec::new();
    let summary = task()
      .run_task(frames(4), NullOutput::new(PointPicker::Cancel), &mut samples)
      .unwrap();
    assert_eq!(summary.termination, Termination::Cancelled);
    assert!(samples.is_empty());
  }

  #[test]
  fn signal_latches_quit() {
    let (tx, rx) = mpsc::channel();
    let mut display = Interruptible::new(NullOutput::default(), Some(rx));
    assert!(!display.poll_cancel());
    tx.send(()).unwrap();
    assert!(display.poll_cancel());
    assert!(display.poll_cancel());
  }
}
