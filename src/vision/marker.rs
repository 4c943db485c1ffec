// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/vision/marker.rs - 标记定位
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

use serde::{Deserialize, Serialize};

use super::circle::min_enclosing_circle;
use super::contour::Contour;

/// 标记候选：轮廓的最小外接圆
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerCandidate {
  /// 圆心像素坐标 (x, y)
  pub center: (f64, f64),
  /// 半径（像素）
  pub radius: f64,
}

impl MarkerCandidate {
  pub fn new(center: (f64, f64), radius: f64) -> Self {
    Self { center, radius }
  }

  /// 取整后的圆心，用于绘制
  pub fn pixel_center(&self) -> (i32, i32) {
    (self.center.0.round() as i32, self.center.1.round() as i32)
  }
}

/// 按轮廓面积降序排序并截取前 `top_k` 个，对每个轮廓拟合最小外接圆
///
/// 面积相同的轮廓保持输入顺序。
pub fn localize(contours: &[Contour], top_k: usize) -> Vec<MarkerCandidate> {
  let mut ranked: Vec<(f64, &Contour)> = contours.iter().map(|c| (c.area(), c)).collect();
  ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

  ranked
    .into_iter()
    .take(top_k)
    .filter_map(|(_, contour)| {
      let circle = min_enclosing_circle(&contour.as_f64())?;
      Some(MarkerCandidate::new(circle.center, circle.radius))
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::vision::{ColorSegmenter, extract};
  use crate::config::DEFAULT_BOB_RANGE;
  use image::{Rgb, RgbImage};
  use imageproc::drawing::draw_filled_circle_mut;
  use imageproc::point::Point;

  fn square(x: i32, y: i32, side: i32) -> Contour {
    Contour {
      points: vec![
        Point::new(x, y),
        Point::new(x + side, y),
        Point::new(x + side, y + side),
        Point::new(x, y + side),
      ],
    }
  }

  #[test]
  fn no_contours_no_candidates() {
    assert!(localize(&[], 4).is_empty());
  }

  #[test]
  fn sorted_by_area_and_truncated() {
    let contours = [square(0, 0, 2), square(100, 100, 10), square(50, 50, 6)];
    let markers = localize(&contours, 2);
    assert_eq!(markers.len(), 2);
    assert_eq!(markers[0].center, (105.0, 105.0));
    assert_eq!(markers[1].center, (53.0, 53.0));
  }

  #[test]
  fn equal_areas_keep_first_encountered() {
    let contours = [square(0, 0, 4), square(20, 0, 4), square(40, 0, 4)];
    let markers = localize(&contours, 3);
    assert_eq!(markers[0].center, (2.0, 2.0));
    assert_eq!(markers[1].center, (22.0, 2.0));
    assert_eq!(markers[2].center, (42.0, 2.0));
  }

  #[test]
  fn solid_disk_is_localized() {
    let (cx, cy, r) = (83, 61, 17);
    let mut image = RgbImage::new(160, 120);
    draw_filled_circle_mut(&mut image, (cx, cy), r, Rgb([200, 0, 100]));

    let mask = ColorSegmenter::new(1).segment(&image, &DEFAULT_BOB_RANGE);
    let markers = localize(&extract(&mask), 1);
    assert_eq!(markers.len(), 1);

    let m = markers[0];
    assert!((m.center.0 - cx as f64).abs() <= 1.0, "{:?}", m);
    assert!((m.center.1 - cy as f64).abs() <= 1.0, "{:?}", m);
    assert!((m.radius - r as f64).abs() <= 1.0, "{:?}", m);
  }

  #[test]
  fn solid_disk_survives_default_blur() {
    let (cx, cy, r) = (70, 50, 20);
    let mut image = RgbImage::new(140, 100);
    draw_filled_circle_mut(&mut image, (cx, cy), r, Rgb([200, 0, 100]));

    let mask = ColorSegmenter::new(7).segment(&image, &DEFAULT_BOB_RANGE);
    let markers = localize(&extract(&mask), 1);
    assert_eq!(markers.len(), 1);

    let m = markers[0];
    assert!((m.center.0 - cx as f64).abs() <= 1.0, "{:?}", m);
    assert!((m.center.1 - cy as f64).abs() <= 1.0, "{:?}", m);
    assert!((m.radius - r as f64).abs() <= 1.5, "{:?}", m);
  }
}
