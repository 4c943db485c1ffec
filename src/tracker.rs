// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/tracker.rs - 逐帧摆锤追踪
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

use image::RgbImage;

use crate::config::{ColorRange, TrackerConfig};
use crate::vision::{ColorSegmenter, MarkerCandidate, detect_markers};

/// 在一帧中寻找面积最大的颜色标记
///
/// 没有找到时返回 `None`，遮挡或运动模糊时这是正常情况，调用方应跳过该帧。
pub fn track(
  segmenter: &ColorSegmenter,
  frame: &RgbImage,
  color_range: &ColorRange,
) -> Option<MarkerCandidate> {
  detect_markers(segmenter, frame, color_range, 1, 0)
    .into_iter()
    .next()
}

/// 逐帧追踪器，持有摆锤标记的颜色范围
#[derive(Debug, Clone, Copy)]
pub struct Tracker {
  segmenter: ColorSegmenter,
  color_range: ColorRange,
}

impl Tracker {
  pub fn new(segmenter: ColorSegmenter, color_range: ColorRange) -> Self {
    Self {
      segmenter,
      color_range,
    }
  }

  pub fn from_config(config: &TrackerConfig) -> Self {
    Self::new(
      ColorSegmenter::new(config.blur_kernel_size),
      config.color_range_bob,
    )
  }

  pub fn track(&self, frame: &RgbImage) -> Option<MarkerCandidate> {
    track(&self.segmenter, frame, &self.color_range)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;
  use imageproc::drawing::draw_filled_circle_mut;

  #[test]
  fn background_frame_is_a_miss() {
    let tracker = Tracker::from_config(&TrackerConfig::default());
    let frame = RgbImage::from_pixel(80, 60, Rgb([30, 30, 30]));
    assert!(tracker.track(&frame).is_none());
  }

  #[test]
  fn picks_the_largest_blob() {
    let tracker = Tracker::from_config(&TrackerConfig::default());
    let mut frame = RgbImage::new(200, 100);
    draw_filled_circle_mut(&mut frame, (30, 50), 6, Rgb([200, 0, 100]));
    draw_filled_circle_mut(&mut frame, (140, 50), 18, Rgb([200, 0, 100]));

    let bob = tracker.track(&frame).unwrap();
    assert!((bob.center.0 - 140.0).abs() <= 1.0);
    assert!((bob.center.1 - 50.0).abs() <= 1.0);
  }

  #[test]
  fn ignores_other_colours() {
    let tracker = Tracker::from_config(&TrackerConfig::default());
    let mut frame = RgbImage::new(100, 100);
    draw_filled_circle_mut(&mut frame, (50, 50), 15, Rgb([0, 200, 0]));
    assert!(tracker.track(&frame).is_none());
  }
}
