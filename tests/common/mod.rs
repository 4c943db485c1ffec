// 该文件是 Bobtrack （摆迹） 项目的一部分。
// tests/common/mod.rs - 集成测试公用工具
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

#![allow(dead_code)]

use std::{cell::Cell, rc::Rc};

use bobtrack::{
  config::TrackerConfig,
  frame::Frame,
  input::{InputError, MemoryInput},
  output::{Click, InteractiveDisplay, OutputError},
};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

pub const MARKER: Rgb<u8> = Rgb([0, 200, 0]);
pub const BOB: Rgb<u8> = Rgb([200, 0, 100]);

pub const FRAME_SIZE: (u32, u32) = (400, 300);
/// 300x187 矩形的四个角，物理单位与像素 1:1
pub const MARKER_CENTERS: [(i32, i32); 4] = [(50, 50), (350, 50), (350, 237), (50, 237)];
pub const MARKER_RADIUS: i32 = 10;
pub const BOB_RADIUS: i32 = 12;

/// 矫正后坐标系中的支点，对应原始画面 (200, 70)
pub const PIVOT: (f64, f64) = (150.0, 20.0);
pub const PENDULUM_LENGTH: f64 = 120.0;

pub fn calibrated_config() -> TrackerConfig {
  TrackerConfig {
    physical_width: 300.0,
    physical_height: 187.0,
    pixels_per_unit: 1.0,
    ..TrackerConfig::default()
  }
}

pub fn blank_frame() -> RgbImage {
  RgbImage::new(FRAME_SIZE.0, FRAME_SIZE.1)
}

pub fn marker_frame(count: usize) -> RgbImage {
  let mut image = blank_frame();
  for &center in MARKER_CENTERS.iter().take(count) {
    draw_filled_circle_mut(&mut image, center, MARKER_RADIUS, MARKER);
  }
  image
}

/// 原始画面中摆角为 `degrees` 的摆锤
pub fn bob_frame(degrees: f64) -> RgbImage {
  let theta = degrees.to_radians();
  // 矫正即平移 (-50, -50)
  let x = PIVOT.0 + 50.0 + PENDULUM_LENGTH * theta.sin();
  let y = PIVOT.1 + 50.0 + PENDULUM_LENGTH * theta.cos();
  let mut image = blank_frame();
  draw_filled_circle_mut(&mut image, (x.round() as i32, y.round() as i32), BOB_RADIUS, BOB);
  image
}

pub fn bob_at(center: (i32, i32)) -> RgbImage {
  let mut image = blank_frame();
  draw_filled_circle_mut(&mut image, center, BOB_RADIUS, BOB);
  image
}

/// 记录所有调用的显示端
pub struct ScriptedDisplay {
  pub shown: Vec<(String, (u32, u32))>,
  pub click: Click,
  pub clicks_requested: usize,
  /// 前若干次 `poll_cancel` 返回 `false`，之后返回 `true`
  pub quit_after_polls: Option<usize>,
  pub polls: usize,
}

impl ScriptedDisplay {
  pub fn clicking(x: f64, y: f64) -> Self {
    Self {
      shown: Vec::new(),
      click: Click::Point(x, y),
      clicks_requested: 0,
      quit_after_polls: None,
      polls: 0,
    }
  }

  pub fn cancelling() -> Self {
    Self {
      click: Click::Cancelled,
      ..Self::clicking(0.0, 0.0)
    }
  }

  pub fn quitting_after(mut self, polls: usize) -> Self {
    self.quit_after_polls = Some(polls);
    self
  }

  pub fn windows(&self) -> Vec<&str> {
    self.shown.iter().map(|(w, _)| w.as_str()).collect()
  }

  pub fn count(&self, window: &str) -> usize {
    self.shown.iter().filter(|(w, _)| w == window).count()
  }
}

impl InteractiveDisplay for ScriptedDisplay {
  fn show(&mut self, frame: &RgbImage, window: &str) -> Result<(), OutputError> {
    self.shown.push((window.to_string(), frame.dimensions()));
    Ok(())
  }

  fn poll_cancel(&mut self) -> bool {
    self.polls += 1;
    self.quit_after_polls.is_some_and(|n| self.polls > n)
  }

  fn wait_for_click(&mut self, _window: &str) -> Result<Click, OutputError> {
    self.clicks_requested += 1;
    Ok(self.click)
  }
}

/// 统计被拉取帧数的帧源
pub struct CountingSource {
  inner: MemoryInput,
  pulled: Rc<Cell<usize>>,
}

impl CountingSource {
  pub fn new(images: Vec<RgbImage>) -> (Self, Rc<Cell<usize>>) {
    let pulled = Rc::new(Cell::new(0));
    let source = Self {
      inner: MemoryInput::new(images),
      pulled: pulled.clone(),
    };
    (source, pulled)
  }
}

impl Iterator for CountingSource {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let frame = self.inner.next()?;
    self.pulled.set(self.pulled.get() + 1);
    Some(frame)
  }
}
