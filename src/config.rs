// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/config.rs - 追踪参数配置
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// 8 位 HSV 约定下的色调上限（OpenCV 约定，色调取值 0..=180）
pub const HUE_MAX: u8 = 180;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("无效的配置项 {field}: {reason}")]
  Invalid { field: &'static str, reason: String },
}

/// HSV 颜色范围，上下界均为闭区间，且不做色调回绕
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
  pub lower: [u8; 3],
  pub upper: [u8; 3],
}

impl ColorRange {
  pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
    Self { lower, upper }
  }

  /// 判断一个 HSV 像素是否落在范围内
  pub fn contains(&self, hsv: [u8; 3]) -> bool {
    (0..3).all(|c| self.lower[c] <= hsv[c] && hsv[c] <= self.upper[c])
  }

  fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
    for c in 0..3 {
      if self.lower[c] > self.upper[c] {
        return Err(ConfigError::Invalid {
          field,
          reason: format!(
            "第 {} 通道下界 {} 大于上界 {}",
            c, self.lower[c], self.upper[c]
          ),
        });
      }
    }
    if self.upper[0] > HUE_MAX {
      return Err(ConfigError::Invalid {
        field,
        reason: format!("色调上界 {} 超出 0..={}", self.upper[0], HUE_MAX),
      });
    }
    Ok(())
  }
}

/// 摆锤标记（红色）的默认范围
pub const DEFAULT_BOB_RANGE: ColorRange = ColorRange::new([150, 190, 110], [180, 255, 255]);
/// 标定标记（绿色）的默认范围
pub const DEFAULT_MARKER_RANGE: ColorRange = ColorRange::new([40, 80, 60], [85, 255, 255]);

/// 追踪流水线配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
  /// 摆锤标记颜色范围
  pub color_range_bob: ColorRange,
  /// 四个标定标记的颜色范围
  pub color_range_markers: ColorRange,
  /// 是否在第一帧上进行透视标定
  pub calibration_enabled: bool,
  /// 标定矩形的物理宽度
  pub physical_width: f64,
  /// 标定矩形的物理高度
  pub physical_height: f64,
  /// 每物理单位对应的像素数
  pub pixels_per_unit: f64,
  /// 阈值化前高斯模糊的核大小（奇数，1 表示不模糊）
  pub blur_kernel_size: u32,
  /// 搜索标定标记时忽略的底部行数
  pub bottom_mask_rows: u32,
}

impl Default for TrackerConfig {
  fn default() -> Self {
    Self {
      color_range_bob: DEFAULT_BOB_RANGE,
      color_range_markers: DEFAULT_MARKER_RANGE,
      calibration_enabled: true,
      physical_width: 300.0,
      physical_height: 187.0,
      pixels_per_unit: 2.0,
      blur_kernel_size: 7,
      bottom_mask_rows: 0,
    }
  }
}

impl TrackerConfig {
  /// 从 JSON 文件读取配置，缺省字段使用默认值
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let config: TrackerConfig = serde_json::from_str(&content)?;
    config.validate()?;
    info!("已加载配置文件: {}", path.display());
    Ok(config)
  }

  pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(self)?;
    std::fs::write(path, content)?;
    Ok(())
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    self.color_range_bob.validate("color_range_bob")?;
    self.color_range_markers.validate("color_range_markers")?;

    if self.blur_kernel_size == 0 || self.blur_kernel_size % 2 == 0 {
      return Err(ConfigError::Invalid {
        field: "blur_kernel_size",
        reason: format!("必须是不小于 1 的奇数，实际为 {}", self.blur_kernel_size),
      });
    }

    for (field, value) in [
      ("physical_width", self.physical_width),
      ("physical_height", self.physical_height),
      ("pixels_per_unit", self.pixels_per_unit),
    ] {
      if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::Invalid {
          field,
          reason: format!("必须是正数，实际为 {}", value),
        });
      }
    }

    Ok(())
  }

  /// 矫正后图像（即物理感兴趣区域）的像素尺寸
  pub fn warped_size(&self) -> (u32, u32) {
    (
      (self.physical_width * self.pixels_per_unit).round() as u32,
      (self.physical_height * self.pixels_per_unit).round() as u32,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_is_valid() {
    let config = TrackerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.warped_size(), (600, 374));
  }

  #[test]
  fn color_range_bounds_are_inclusive() {
    let range = DEFAULT_BOB_RANGE;
    assert!(range.contains([150, 190, 110]));
    assert!(range.contains([180, 255, 255]));
    assert!(!range.contains([149, 200, 200]));
    assert!(!range.contains([165, 189, 200]));
  }

  #[test]
  fn rejects_even_blur_kernel() {
    let config = TrackerConfig {
      blur_kernel_size: 4,
      ..Default::default()
    };
    assert!(matches!(
      config.validate(),
      Err(ConfigError::Invalid {
        field: "blur_kernel_size",
        ..
      })
    ));
  }

  #[test]
  fn rejects_inverted_range() {
    let config = TrackerConfig {
      color_range_markers: ColorRange::new([90, 0, 0], [40, 255, 255]),
      ..Default::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn rejects_non_positive_dimensions() {
    let config = TrackerConfig {
      pixels_per_unit: 0.0,
      ..Default::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn partial_json_falls_back_to_defaults() {
    let config: TrackerConfig =
      serde_json::from_str(r#"{ "calibration_enabled": false, "bottom_mask_rows": 600 }"#)
        .unwrap();
    assert!(!config.calibration_enabled);
    assert_eq!(config.bottom_mask_rows, 600);
    assert_eq!(config.color_range_bob, DEFAULT_BOB_RANGE);
    assert_eq!(config.blur_kernel_size, 7);
  }
}
