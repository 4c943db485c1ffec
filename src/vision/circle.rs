// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/vision/circle.rs - 最小外接圆
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

//! Welzl 算法的迭代形式。输入点先以固定种子打乱，
//! 使期望复杂度为线性，同时保证同样的输入得到同样的结果。

const SHUFFLE_SEED: u64 = 0x9E37_79B9_7F4A_7C15;
const CONTAIN_EPS: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
  pub center: (f64, f64),
  pub radius: f64,
}

impl Circle {
  fn contains(&self, p: (f64, f64)) -> bool {
    distance(self.center, p) <= self.radius + CONTAIN_EPS * self.radius.max(1.0)
  }

  fn from_two(a: (f64, f64), b: (f64, f64)) -> Self {
    let center = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
    Self {
      center,
      radius: distance(a, b) / 2.0,
    }
  }

  fn from_three(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Self {
    let (bx, by) = (b.0 - a.0, b.1 - a.1);
    let (cx, cy) = (c.0 - a.0, c.1 - a.1);
    let d = 2.0 * (bx * cy - by * cx);

    if d.abs() < f64::EPSILON {
      // 三点共线，退化为最远两点的圆
      let candidates = [Self::from_two(a, b), Self::from_two(a, c), Self::from_two(b, c)];
      let mut widest = candidates[0];
      for candidate in candidates {
        if candidate.radius > widest.radius {
          widest = candidate;
        }
      }
      return widest;
    }

    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let ux = (cy * b2 - by * c2) / d;
    let uy = (bx * c2 - cx * b2) / d;
    Self {
      center: (a.0 + ux, a.1 + uy),
      radius: (ux * ux + uy * uy).sqrt(),
    }
  }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
  ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn shuffle(points: &mut [(f64, f64)]) {
  let mut state = SHUFFLE_SEED;
  for i in (1..points.len()).rev() {
    // xorshift64
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    let j = (state % (i as u64 + 1)) as usize;
    points.swap(i, j);
  }
}

/// 计算包含全部点的最小圆，空输入返回 `None`
pub fn min_enclosing_circle(points: &[(f64, f64)]) -> Option<Circle> {
  if points.is_empty() {
    return None;
  }
  let mut pts = points.to_vec();
  shuffle(&mut pts);

  let mut circle = Circle {
    center: pts[0],
    radius: 0.0,
  };

  for i in 1..pts.len() {
    if circle.contains(pts[i]) {
      continue;
    }
    circle = Circle {
      center: pts[i],
      radius: 0.0,
    };
    for j in 0..i {
      if circle.contains(pts[j]) {
        continue;
      }
      circle = Circle::from_two(pts[i], pts[j]);
      for k in 0..j {
        if !circle.contains(pts[k]) {
          circle = Circle::from_three(pts[i], pts[j], pts[k]);
        }
      }
    }
  }

  Some(circle)
}
