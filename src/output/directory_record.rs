// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{Datelike, Local};
use image::RgbImage;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Click, InteractiveDisplay, InvalidPivot, OutputError, PointPicker},
  url_to_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无效的路径编码: {0}")]
  PathEncoding(#[from] std::string::FromUtf8Error),
  #[error("无效的参数 every: {0}")]
  InvalidEvery(String),
  #[error("{0}")]
  InvalidPivot(#[from] InvalidPivot),
}

/// 按日期分目录保存每一帧画面
///
/// 路径形如 `<dir>/YYYY/MM/DD/HH-MM-SS-XXXX-<window>.png`，
/// 查询参数 `every=N` 表示每 N 帧保存一次。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  picker: PointPicker,
  frame_counter: u16,
  every: u16,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let every = match uri.query_pairs().find(|(k, _)| k == "every") {
      Some((_, v)) => match v.parse::<u16>() {
        Ok(n) if n > 0 => n,
        _ => return Err(DirectoryRecordOutputError::InvalidEvery(v.to_string())),
      },
      None => 1,
    };

    let picker = PointPicker::from_url(uri)?;
    let mut output = DirectoryRecordOutput::new(url_to_path(uri)?, picker);
    output.every = every;
    Ok(output)
  }
}

fn window_slug(window: &str) -> String {
  window
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() {
        c.to_ascii_lowercase()
      } else {
        '-'
      }
    })
    .collect()
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, picker: PointPicker) -> Self {
    Self {
      directory: directory.into(),
      picker,
      frame_counter: 0,
      every: 1,
    }
  }

  pub fn set_picker(&mut self, picker: PointPicker) {
    self.picker = picker;
  }

  fn frame_id(&mut self) -> u16 {
    self.frame_counter = self.frame_counter.wrapping_add(1);
    self.frame_counter
  }

  fn frame_path(&self, id: u16, window: &str) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Local::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}-{}.png",
      now.format("%H-%M-%S"),
      id,
      window_slug(window)
    )))
  }

  fn save_frame(
    &mut self,
    frame: &RgbImage,
    window: &str,
  ) -> Result<(), DirectoryRecordOutputError> {
    let id = self.frame_id();
    if id.wrapping_sub(1) % self.every != 0 {
      return Ok(());
    }
    let path = self.frame_path(id, window)?;
    frame.save(&path)?;
    debug!("记录画面: {}", path.display());
    Ok(())
  }
}

impl InteractiveDisplay for DirectoryRecordOutput {
  fn show(&mut self, frame: &RgbImage, window: &str) -> Result<(), OutputError> {
    Ok(self.save_frame(frame, window)?)
  }

  fn poll_cancel(&mut self) -> bool {
    false
  }

  fn wait_for_click(&mut self, window: &str) -> Result<Click, OutputError> {
    Ok(self.picker.pick(window)?)
  }
}
