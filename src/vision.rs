// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/vision.rs - 颜色分割、轮廓提取与标记定位
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

//! # 视觉基础模块
//!
//! 单帧内的检测链路：
//!
//! 1. [`segment`]：RGB 转 HSV，按颜色范围生成二值掩码；
//! 2. [`contour`]：提取掩码的最外层轮廓；
//! 3. [`marker`]：按面积排序轮廓并拟合最小外接圆，得到标记候选。
//!
//! 本模块不保存任何跨帧状态。

pub mod circle;
pub mod contour;
pub mod marker;
pub mod segment;

use image::RgbImage;

use crate::config::ColorRange;

pub use self::contour::{Contour, extract};
pub use self::marker::{MarkerCandidate, localize};
pub use self::segment::{ColorSegmenter, mask_bottom_rows};

/// 在一帧中检测颜色标记，返回按面积降序的前 `top_k` 个候选
///
/// `bottom_mask_rows` 行以下的区域不参与检测。返回空序列表示本帧检测失败，
/// 是否致命由调用方决定。
pub fn detect_markers(
  segmenter: &ColorSegmenter,
  frame: &RgbImage,
  range: &ColorRange,
  top_k: usize,
  bottom_mask_rows: u32,
) -> Vec<MarkerCandidate> {
  let mut mask = segmenter.segment(frame, range);
  mask_bottom_rows(&mut mask, bottom_mask_rows);
  let contours = extract(&mask);
  localize(&contours, top_k)
}
