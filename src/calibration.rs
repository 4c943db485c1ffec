// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/calibration.rs - 透视标定
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

//! # 透视标定模块
//!
//! 用一帧参考图像中的四个标定标记求解像素平面到物理平面的单应矩阵：
//!
//! 1. 以质心为原点按极角升序排列标记，得到 左上 → 右上 → 右下 → 左下 的固定绕序；
//! 2. 与按 `pixels_per_unit` 缩放后的物理矩形四角配对；
//! 3. 对四组对应点做直接线性变换（先做 Hartley 归一化，取 `AᵀA` 最小特征值的特征向量）。
//!
//! 求得的 [`Calibration`] 在整个运行期间只读，之后每帧只做透视变换。

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use nalgebra::{DMatrix, Matrix3, SymmetricEigen, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::TrackerConfig;
use crate::vision::MarkerCandidate;

/// 标定所需的标记数量
pub const CALIBRATION_MARKERS: usize = 4;
/// 两个标记相对质心的最小角度间隔（弧度）
pub const ANGLE_EPSILON: f64 = std::f64::consts::PI / 180.0;

const PIVOT_EPSILON: f64 = 1e-12;
/// 归一化坐标系下单位范数单应矩阵的行列式下限
const DEGENERATE_DETERMINANT: f64 = 1e-9;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
  #[error("标定需要 {expected} 个标记，实际得到 {found} 个")]
  WrongMarkerCount { expected: usize, found: usize },
  #[error("标记 {first} 与标记 {second} 相对质心的角度过近，无法确定顺序")]
  CoincidentAngles { first: usize, second: usize },
  #[error("标记点退化: {0}")]
  Degenerate(String),
  #[error("无效的物理尺寸: {0}")]
  InvalidDimensions(String),
}

/// 3x3 单应矩阵（行主序，已归一化使右下角为 1）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Homography {
  matrix: [[f64; 3]; 3],
}

impl Homography {
  pub fn from_matrix(matrix: [[f64; 3]; 3]) -> Self {
    Self { matrix }
  }

  pub fn matrix(&self) -> &[[f64; 3]; 3] {
    &self.matrix
  }

  /// 由恰好四组对应点求解单应矩阵
  pub fn from_correspondences(
    src: &[(f64, f64); 4],
    dst: &[(f64, f64); 4],
  ) -> Result<Self, CalibrationError> {
    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    let mut a = DMatrix::<f64>::zeros(2 * CALIBRATION_MARKERS, 9);
    for (i, (&(sx, sy), &(dx, dy))) in src_n.iter().zip(dst_n.iter()).enumerate() {
      let r0 = 2 * i;
      let r1 = r0 + 1;
      a[(r0, 3)] = -sx;
      a[(r0, 4)] = -sy;
      a[(r0, 5)] = -1.0;
      a[(r0, 6)] = dy * sx;
      a[(r0, 7)] = dy * sy;
      a[(r0, 8)] = dy;

      a[(r1, 0)] = sx;
      a[(r1, 1)] = sy;
      a[(r1, 2)] = 1.0;
      a[(r1, 6)] = -dx * sx;
      a[(r1, 7)] = -dx * sy;
      a[(r1, 8)] = -dx;
    }

    // A^T A 最小特征值对应的特征向量即为 A 的零空间
    let eig = SymmetricEigen::new(a.transpose() * &a);
    let min_idx = eig.eigenvalues.iamin();
    let h = eig.eigenvectors.column(min_idx);
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
    // 三点共线时零空间只含奇异矩阵
    if h_norm.determinant().abs() < DEGENERATE_DETERMINANT {
      return Err(CalibrationError::Degenerate("单应矩阵奇异".to_string()));
    }

    let t_dst_inv = t_dst
      .try_inverse()
      .ok_or_else(|| CalibrationError::Degenerate("目标点归一化矩阵不可逆".to_string()))?;
    let m = t_dst_inv * h_norm * t_src;
    let scale = m[(2, 2)];
    if scale.abs() < PIVOT_EPSILON {
      return Err(CalibrationError::Degenerate("单应矩阵无法归一化".to_string()));
    }

    let m = m / scale;
    Ok(Self {
      matrix: std::array::from_fn(|i| std::array::from_fn(|j| m[(i, j)])),
    })
  }

  fn as_matrix3(&self) -> Matrix3<f64> {
    Matrix3::from_fn(|i, j| self.matrix[i][j])
  }

  /// 将一个像素坐标投影到目标平面，落在无穷远处时返回 `None`
  pub fn project(&self, (x, y): (f64, f64)) -> Option<(f64, f64)> {
    let p = self.as_matrix3() * Vector3::new(x, y, 1.0);
    if p[2].abs() < PIVOT_EPSILON {
      return None;
    }
    Some((p[0] / p[2], p[1] / p[2]))
  }

  /// 转换为 imageproc 的投影变换，不可逆时返回 `None`
  pub fn to_projection(&self) -> Option<Projection> {
    let m = &self.matrix;
    Projection::from_matrix([
      m[0][0] as f32,
      m[0][1] as f32,
      m[0][2] as f32,
      m[1][0] as f32,
      m[1][1] as f32,
      m[1][2] as f32,
      m[2][0] as f32,
      m[2][1] as f32,
      m[2][2] as f32,
    ])
  }
}

fn normalize_points(points: &[(f64, f64); 4]) -> (Matrix3<f64>, [(f64, f64); 4]) {
  let cx = points.iter().map(|p| p.0).sum::<f64>() / 4.0;
  let cy = points.iter().map(|p| p.1).sum::<f64>() / 4.0;
  let mean_dist = points
    .iter()
    .map(|p| ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt())
    .sum::<f64>()
    / 4.0;
  let s = if mean_dist > PIVOT_EPSILON {
    std::f64::consts::SQRT_2 / mean_dist
  } else {
    1.0
  };

  let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
  let normalized = (*points).map(|p| (s * (p.0 - cx), s * (p.1 - cy)));
  (t, normalized)
}

/// 按相对质心的极角升序排列标记（`atan2(dy, dx)`，图像坐标 y 轴向下），
/// 角度相同的标记保持输入顺序
pub fn order_by_angle(markers: &[MarkerCandidate]) -> Vec<MarkerCandidate> {
  let (cx, cy) = centroid(markers);
  let mut ordered: Vec<(f64, MarkerCandidate)> = markers
    .iter()
    .map(|m| ((m.center.1 - cy).atan2(m.center.0 - cx), *m))
    .collect();
  ordered.sort_by(|a, b| a.0.total_cmp(&b.0));
  ordered.into_iter().map(|(_, m)| m).collect()
}

fn centroid(markers: &[MarkerCandidate]) -> (f64, f64) {
  let n = markers.len().max(1) as f64;
  (
    markers.iter().map(|m| m.center.0).sum::<f64>() / n,
    markers.iter().map(|m| m.center.1).sum::<f64>() / n,
  )
}

/// 排序后检查相邻标记（含首尾回绕）的角度间隔
fn check_angular_separation(ordered: &[MarkerCandidate]) -> Result<(), CalibrationError> {
  let (cx, cy) = centroid(ordered);
  let mut angles = Vec::with_capacity(ordered.len());
  for (i, m) in ordered.iter().enumerate() {
    let (dx, dy) = (m.center.0 - cx, m.center.1 - cy);
    if dx.hypot(dy) < PIVOT_EPSILON.sqrt() {
      return Err(CalibrationError::Degenerate(format!("标记 {} 与质心重合", i)));
    }
    angles.push(dy.atan2(dx));
  }

  let n = angles.len();
  for i in 0..n {
    let j = (i + 1) % n;
    let gap = if j == 0 {
      angles[0] + 2.0 * std::f64::consts::PI - angles[i]
    } else {
      angles[j] - angles[i]
    };
    if gap < ANGLE_EPSILON {
      return Err(CalibrationError::CoincidentAngles {
        first: i,
        second: j,
      });
    }
  }
  Ok(())
}

/// 标定结果：单应矩阵、排序后的标记和矫正图像尺寸
#[derive(Debug, Clone)]
pub struct Calibration {
  homography: Homography,
  projection: Projection,
  markers: [MarkerCandidate; CALIBRATION_MARKERS],
  output_size: (u32, u32),
}

impl Calibration {
  pub fn homography(&self) -> &Homography {
    &self.homography
  }

  /// 左上、右上、右下、左下顺序的标定标记
  pub fn markers(&self) -> &[MarkerCandidate; CALIBRATION_MARKERS] {
    &self.markers
  }

  pub fn output_size(&self) -> (u32, u32) {
    self.output_size
  }

  /// 透视矫正并裁剪到物理感兴趣区域
  pub fn warp(&self, image: &RgbImage) -> RgbImage {
    let (width, height) = self.output_size;
    let mut out = RgbImage::new(width, height);
    warp_into(
      image,
      &self.projection,
      Interpolation::Bilinear,
      Rgb([0, 0, 0]),
      &mut out,
    );
    out
  }
}

/// 透视标定器
#[derive(Debug, Clone, Copy)]
pub struct Calibrator {
  physical_width: f64,
  physical_height: f64,
  pixels_per_unit: f64,
}

impl Calibrator {
  pub fn new(
    physical_width: f64,
    physical_height: f64,
    pixels_per_unit: f64,
  ) -> Result<Self, CalibrationError> {
    for (name, value) in [
      ("physical_width", physical_width),
      ("physical_height", physical_height),
      ("pixels_per_unit", pixels_per_unit),
    ] {
      if !(value.is_finite() && value > 0.0) {
        return Err(CalibrationError::InvalidDimensions(format!(
          "{} = {}",
          name, value
        )));
      }
    }
    Ok(Self {
      physical_width,
      physical_height,
      pixels_per_unit,
    })
  }

  pub fn from_config(config: &TrackerConfig) -> Result<Self, CalibrationError> {
    Self::new(
      config.physical_width,
      config.physical_height,
      config.pixels_per_unit,
    )
  }

  /// 目标矩形四角：左上、右上、右下、左下
  pub fn destination_corners(&self) -> [(f64, f64); 4] {
    let w = self.physical_width * self.pixels_per_unit;
    let h = self.physical_height * self.pixels_per_unit;
    [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)]
  }

  pub fn output_size(&self) -> (u32, u32) {
    (
      (self.physical_width * self.pixels_per_unit).round() as u32,
      (self.physical_height * self.pixels_per_unit).round() as u32,
    )
  }

  pub fn calibrate(&self, markers: &[MarkerCandidate]) -> Result<Calibration, CalibrationError> {
    if markers.len() != CALIBRATION_MARKERS {
      return Err(CalibrationError::WrongMarkerCount {
        expected: CALIBRATION_MARKERS,
        found: markers.len(),
      });
    }

    let ordered = order_by_angle(markers);
    check_angular_separation(&ordered)?;
    let ordered: [MarkerCandidate; CALIBRATION_MARKERS] =
      [ordered[0], ordered[1], ordered[2], ordered[3]];
    debug!("标定标记排序结果: {:?}", ordered);

    let src = ordered.map(|m| m.center);
    let homography = Homography::from_correspondences(&src, &self.destination_corners())?;
    let projection = homography
      .to_projection()
      .ok_or_else(|| CalibrationError::Degenerate("单应矩阵不可逆".to_string()))?;

    info!(
      "透视标定完成，矫正尺寸 {}x{}",
      self.output_size().0,
      self.output_size().1
    );

    Ok(Calibration {
      homography,
      projection,
      markers: ordered,
      output_size: self.output_size(),
    })
  }
}
