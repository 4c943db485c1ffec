// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/pivot.rs - 摆动支点选择
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
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::output::{Click, InteractiveDisplay, OutputError};

/// 支点选择窗口标题
pub const PIVOT_WINDOW: &str = "Select Pendulum Top";

#[derive(Error, Debug)]
pub enum PivotError {
  #[error("用户取消了支点选择")]
  UserCancelled,
  #[error("显示输出错误: {0}")]
  Display(#[from] OutputError),
}

/// 摆的悬挂点，每次运行只设置一次
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotPoint {
  pub x: f64,
  pub y: f64,
}

impl PivotPoint {
  pub fn new(x: f64, y: f64) -> Self {
    Self { x, y }
  }

  /// 支点指向 `position` 的向量与竖直向下方向的夹角（弧度）
  ///
  /// 图像坐标 y 轴向下，正下方为 0，偏向 +x 为正。
  pub fn angle_to(&self, position: (f64, f64)) -> f64 {
    let dx = position.0 - self.x;
    let dy = position.1 - self.y;
    dx.atan2(dy)
  }
}

/// 在第一帧上阻塞等待用户选择支点
pub fn select_pivot<D: InteractiveDisplay + ?Sized>(
  display: &mut D,
  frame: &RgbImage,
) -> Result<PivotPoint, PivotError> {
  display.show(frame, PIVOT_WINDOW)?;
  match display.wait_for_click(PIVOT_WINDOW)? {
    Click::Point(x, y) => {
      if x < 0.0 || y < 0.0 || x >= frame.width() as f64 || y >= frame.height() as f64 {
        warn!("支点 ({:.1}, {:.1}) 位于画面之外", x, y);
      }
      info!("已选择支点: ({:.1}, {:.1})", x, y);
      Ok(PivotPoint::new(x, y))
    }
    Click::Cancelled => {
      warn!("支点选择已取消");
      Err(PivotError::UserCancelled)
    }
  }
}
