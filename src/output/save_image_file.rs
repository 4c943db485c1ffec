// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/output/save_image_file.rs - 保存预览图像文件
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

use std::path::PathBuf;

use image::RgbImage;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Click, InteractiveDisplay, InvalidPivot, OutputError, PointPicker},
  url_to_path,
};

/// 每次显示都覆盖同一个文件，文件中总是最新的画面
pub struct SaveImageFileOutput {
  path: PathBuf,
  picker: PointPicker,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无效的路径编码: {0}")]
  PathEncoding(std::string::FromUtf8Error),
  #[error("{0}")]
  InvalidPivot(#[from] InvalidPivot),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let picker = PointPicker::from_url(uri)?;
    let path = url_to_path(uri).map_err(SaveImageFileError::PathEncoding)?;
    Ok(SaveImageFileOutput { path, picker })
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>, picker: PointPicker) -> Self {
    Self {
      path: path.into(),
      picker,
    }
  }

  pub fn path(&self) -> &PathBuf {
    &self.path
  }

  pub fn set_picker(&mut self, picker: PointPicker) {
    self.picker = picker;
  }

  fn save_image(&self, image: &RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    image
      .save(&self.path)
      .map_err(SaveImageFileError::ImageError)?;

    debug!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

impl InteractiveDisplay for SaveImageFileOutput {
  fn show(&mut self, frame: &RgbImage, _window: &str) -> Result<(), OutputError> {
    Ok(self.save_image(frame)?)
  }

  fn poll_cancel(&mut self) -> bool {
    false
  }

  fn wait_for_click(&mut self, window: &str) -> Result<Click, OutputError> {
    Ok(self.picker.pick(window)?)
  }
}
