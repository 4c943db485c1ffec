// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/output/null_output.rs - 无渲染输出
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
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Click, InteractiveDisplay, OutputError, PointPicker},
};

/// 不渲染任何画面的显示端，只负责支点选择
#[derive(Debug, Default)]
pub struct NullOutput {
  picker: PointPicker,
}

impl NullOutput {
  pub fn new(picker: PointPicker) -> Self {
    Self { picker }
  }

  pub fn set_picker(&mut self, picker: PointPicker) {
    self.picker = picker;
  }
}

impl FromUrlWithScheme for NullOutput {
  const SCHEME: &'static str = "null";
}

impl FromUrl for NullOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch);
    }
    Ok(Self::new(PointPicker::from_url(url)?))
  }
}

impl InteractiveDisplay for NullOutput {
  fn show(&mut self, frame: &RgbImage, window: &str) -> Result<(), OutputError> {
    debug!("[{}] 丢弃 {}x{} 画面", window, frame.width(), frame.height());
    Ok(())
  }

  fn poll_cancel(&mut self) -> bool {
    false
  }

  fn wait_for_click(&mut self, window: &str) -> Result<Click, OutputError> {
    Ok(self.picker.pick(window)?)
  }
}
