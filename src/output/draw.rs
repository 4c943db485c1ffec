// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/output/draw.rs - 跟踪结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};

use crate::{pivot::PivotPoint, vision::MarkerCandidate};

// 绘制常量
const OUTLINE_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const CENTER_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const MARKER_COLOR: [u8; 3] = [255, 255, 0]; // 黄色
const OUTLINE_THICKNESS: i32 = 2;
const CENTER_RADIUS: i32 = 5;

pub struct Draw {
  outline_color: Rgb<u8>,
  center_color: Rgb<u8>,
  marker_color: Rgb<u8>,
  outline_thickness: i32,
  center_radius: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      outline_color: Rgb(OUTLINE_COLOR),
      center_color: Rgb(CENTER_COLOR),
      marker_color: Rgb(MARKER_COLOR),
      outline_thickness: OUTLINE_THICKNESS,
      center_radius: CENTER_RADIUS,
    }
  }
}

impl Draw {
  // 加粗的空心圆，从外向内逐像素收缩
  fn draw_thick_circle(
    &self,
    image: &mut RgbImage,
    center: (i32, i32),
    radius: i32,
    color: Rgb<u8>,
  ) {
    for offset in 0..self.outline_thickness {
      let r = radius - offset;
      if r <= 0 {
        break;
      }
      draw_hollow_circle_mut(image, center, r, color);
    }
  }

  /// 摆锤轮廓（绿色圆）与圆心（红色实心点）
  pub fn draw_bob(&self, image: &mut RgbImage, bob: &MarkerCandidate) {
    let center = bob.pixel_center();
    let radius = bob.radius.round() as i32;
    self.draw_thick_circle(image, center, radius.max(1), self.outline_color);
    draw_filled_circle_mut(image, center, self.center_radius, self.center_color);
  }

  /// 支点到摆锤圆心的连线
  pub fn draw_pendulum(&self, image: &mut RgbImage, pivot: &PivotPoint, bob: &MarkerCandidate) {
    for offset in 0..self.outline_thickness {
      let shift = offset as f32;
      draw_line_segment_mut(
        image,
        (pivot.x as f32 + shift, pivot.y as f32),
        (bob.center.0 as f32 + shift, bob.center.1 as f32),
        self.outline_color,
      );
    }
  }

  /// 标定标记，按角度顺序依次相连，三个以上时首尾闭合成多边形
  pub fn draw_calibration_markers(&self, image: &mut RgbImage, markers: &[MarkerCandidate]) {
    for marker in markers {
      let radius = marker.radius.round() as i32;
      self.draw_thick_circle(image, marker.pixel_center(), radius.max(1), self.marker_color);
    }
    let closing = match markers {
      [first, .., last] if markers.len() >= 3 => Some((last, first)),
      _ => None,
    };
    let edges = markers.windows(2).map(|pair| (&pair[0], &pair[1]));
    for (from, to) in edges.chain(closing) {
      draw_line_segment_mut(
        image,
        (from.center.0 as f32, from.center.1 as f32),
        (to.center.0 as f32, to.center.1 as f32),
        self.marker_color,
      );
    }
  }

  /// 跟踪画面：摆锤存在时绘制，支点已知时再画连线
  pub fn draw_tracking(
    &self,
    image: &mut RgbImage,
    pivot: Option<&PivotPoint>,
    bob: Option<&MarkerCandidate>,
  ) {
    let Some(bob) = bob else {
      return;
    };
    if let Some(pivot) = pivot {
      self.draw_pendulum(image, pivot, bob);
    }
    self.draw_bob(image, bob);
  }
}
