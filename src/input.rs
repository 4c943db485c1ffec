// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/input.rs - 帧源定义
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

use std::collections::VecDeque;

use image::RgbImage;
use thiserror::Error;

use crate::{FromUrl, frame::Frame};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{GStreamerInput, GStreamerInputError, GStreamerInputPipelineBuilder};

/// 未指定帧率时用于推算时间戳的帧率
pub const DEFAULT_FPS: f64 = 30.0;

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer 输入错误: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 按帧号与帧率推算时间戳（毫秒）
pub(crate) fn timestamp_ms(index: u64, fps: f64) -> u64 {
  if fps > 0.0 {
    (index as f64 * 1000.0 / fps).round() as u64
  } else {
    0
  }
}

/// 内存中的帧序列
pub struct MemoryInput {
  images: VecDeque<RgbImage>,
  next_index: u64,
  fps: f64,
}

impl MemoryInput {
  pub fn new(images: impl IntoIterator<Item = RgbImage>) -> Self {
    Self {
      images: images.into_iter().collect(),
      next_index: 0,
      fps: DEFAULT_FPS,
    }
  }

  pub fn with_fps(mut self, fps: f64) -> Self {
    self.fps = fps;
    self
  }

  pub fn remaining(&self) -> usize {
    self.images.len()
  }
}

impl Iterator for MemoryInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let image = self.images.pop_front()?;
    let index = self.next_index;
    self.next_index += 1;
    Some(Ok(Frame::new(image, index, timestamp_ms(index, self.fps))))
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.images.len(), Some(self.images.len()))
  }
}

pub enum InputWrapper {
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInput),
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  Memory(MemoryInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "gstreamer_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == GStreamerInputPipelineBuilder::SCHEME {
        let input = GStreamerInputPipelineBuilder::from_url(url)?.build()?;
        return Ok(InputWrapper::GStreamerInput(input));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl From<MemoryInput> for InputWrapper {
  fn from(input: MemoryInput) -> Self {
    InputWrapper::Memory(input)
  }
}

impl Iterator for InputWrapper {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.next().map(|r| r.map_err(InputError::from)),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.next().map(|r| r.map_err(InputError::from)),
      InputWrapper::Memory(input) => input.next(),
    }
  }
}
