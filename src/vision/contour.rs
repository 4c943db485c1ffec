// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/vision/contour.rs - 外轮廓提取
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

use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::contour_area;
use imageproc::point::Point;

/// 掩码中一个连通前景区域的外边界
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
  pub points: Vec<Point<i32>>,
}

impl Contour {
  /// 多边形面积（绝对值），少于三个点时为 0
  pub fn area(&self) -> f64 {
    contour_area(&self.points)
  }

  pub fn as_f64(&self) -> Vec<(f64, f64)> {
    self
      .points
      .iter()
      .map(|p| (p.x as f64, p.y as f64))
      .collect()
  }
}

/// 只返回最外层轮廓，嵌套在孔洞中的轮廓与孔洞本身都被丢弃
pub fn extract(mask: &GrayImage) -> Vec<Contour> {
  if mask.width() == 0 || mask.height() == 0 {
    return Vec::new();
  }

  find_contours::<i32>(mask)
    .into_iter()
    .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
    .map(|c| Contour { points: c.points })
    .collect()
}
