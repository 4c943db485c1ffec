// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/vision/segment.rs - HSV 颜色分割
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

use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::gaussian_blur_f32;

use crate::config::ColorRange;

/// 掩码中前景像素的取值
pub const MASK_FOREGROUND: u8 = 255;

/// RGB 转 8 位 HSV（H: 0..=180, S/V: 0..=255）
///
/// 色相折半后饱和到 180，接近 360 度的红色不会回绕到 0
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
  let (rf, gf, bf) = (r as f32, g as f32, b as f32);
  let max = rf.max(gf).max(bf);
  let min = rf.min(gf).min(bf);
  let diff = max - min;

  let s = if max > 0.0 { 255.0 * diff / max } else { 0.0 };

  let h = if diff == 0.0 {
    0.0
  } else if max == rf {
    60.0 * (gf - bf) / diff
  } else if max == gf {
    120.0 + 60.0 * (bf - rf) / diff
  } else {
    240.0 + 60.0 * (rf - gf) / diff
  };
  let h = if h < 0.0 { h + 360.0 } else { h };

  [
    ((h / 2.0).round() as u16).min(180) as u8,
    s.round() as u8,
    max as u8,
  ]
}

/// 与核大小对应的高斯标准差，核大小不大于 1 时不做模糊
pub fn blur_sigma(kernel_size: u32) -> Option<f32> {
  if kernel_size <= 1 {
    return None;
  }
  Some(0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8)
}

/// 颜色分割器
#[derive(Debug, Clone, Copy)]
pub struct ColorSegmenter {
  blur_kernel_size: u32,
}

impl ColorSegmenter {
  pub fn new(blur_kernel_size: u32) -> Self {
    Self { blur_kernel_size }
  }

  pub fn blur_kernel_size(&self) -> u32 {
    self.blur_kernel_size
  }

  /// 生成与输入同尺寸的二值掩码，范围内像素为 255，其余为 0
  pub fn segment(&self, frame: &RgbImage, range: &ColorRange) -> GrayImage {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
      return GrayImage::new(width, height);
    }

    let blurred;
    let source = match blur_sigma(self.blur_kernel_size) {
      Some(sigma) => {
        blurred = gaussian_blur_f32(frame, sigma);
        &blurred
      }
      None => frame,
    };

    GrayImage::from_fn(width, height, |x, y| {
      let hsv = rgb_to_hsv(source.get_pixel(x, y).0);
      if range.contains(hsv) {
        Luma([MASK_FOREGROUND])
      } else {
        Luma([0])
      }
    })
  }
}

/// 清除掩码底部的若干行
pub fn mask_bottom_rows(mask: &mut GrayImage, rows: u32) {
  let height = mask.height();
  let start = height.saturating_sub(rows);
  for y in start..height {
    for x in 0..mask.width() {
      mask.put_pixel(x, y, Luma([0]));
    }
  }
}
