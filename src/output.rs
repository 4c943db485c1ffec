// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/output.rs - 显示与输出定义
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
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

pub mod draw;
mod null_output;
mod pick;
mod record;

pub use self::null_output::NullOutput;
pub use self::pick::{InvalidPivot, PointPicker, parse_point, prompt_point};
pub use self::record::{CsvRecord, TrajectorySink};

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

/// 用户交互的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Click {
  Point(f64, f64),
  Cancelled,
}

/// 交互显示端
///
/// 流水线只通过这三个调用与显示端交互，不做任何窗口管理。
pub trait InteractiveDisplay {
  /// 在指定窗口中显示一帧
  fn show(&mut self, frame: &RgbImage, window: &str) -> Result<(), OutputError>;

  /// 是否收到退出请求，每帧轮询一次
  fn poll_cancel(&mut self) -> bool;

  /// 阻塞等待用户在窗口中选择一个点
  fn wait_for_click(&mut self, window: &str) -> Result<Click, OutputError>;
}

impl<D: InteractiveDisplay + ?Sized> InteractiveDisplay for &mut D {
  fn show(&mut self, frame: &RgbImage, window: &str) -> Result<(), OutputError> {
    (**self).show(frame, window)
  }

  fn poll_cancel(&mut self) -> bool {
    (**self).poll_cancel()
  }

  fn wait_for_click(&mut self, window: &str) -> Result<Click, OutputError> {
    (**self).wait_for_click(window)
  }
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("{0}")]
  InvalidPivot(#[from] InvalidPivot),
  #[error("无效的路径编码: {0}")]
  PathEncoding(#[from] std::string::FromUtf8Error),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  NullOutput(NullOutput),
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() == NullOutput::SCHEME {
      return Ok(OutputWrapper::NullOutput(NullOutput::from_url(url)?));
    }
    #[cfg(feature = "save_image_file")]
    {
      if url.scheme() == SaveImageFileOutput::SCHEME {
        let output = SaveImageFileOutput::from_url(url)?;
        return Ok(OutputWrapper::SaveImageFileOutput(output));
      }
    }
    #[cfg(feature = "directory_record")]
    {
      if url.scheme() == DirectoryRecordOutput::SCHEME {
        let output = DirectoryRecordOutput::from_url(url)?;
        return Ok(OutputWrapper::DirectoryRecordOutput(output));
      }
    }
    Err(OutputError::SchemeMismatch)
  }
}

impl OutputWrapper {
  /// 覆盖 URL 中给出的支点来源
  pub fn with_picker(mut self, picker: PointPicker) -> Self {
    match &mut self {
      OutputWrapper::NullOutput(output) => output.set_picker(picker),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output.set_picker(picker),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output.set_picker(picker),
    }
    self
  }
}

impl InteractiveDisplay for OutputWrapper {
  fn show(&mut self, frame: &RgbImage, window: &str) -> Result<(), OutputError> {
    match self {
      OutputWrapper::NullOutput(output) => output.show(frame, window),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output.show(frame, window),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output.show(frame, window),
    }
  }

  fn poll_cancel(&mut self) -> bool {
    match self {
      OutputWrapper::NullOutput(output) => output.poll_cancel(),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output.poll_cancel(),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output.poll_cancel(),
    }
  }

  fn wait_for_click(&mut self, window: &str) -> Result<Click, OutputError> {
    match self {
      OutputWrapper::NullOutput(output) => output.wait_for_click(window),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output.wait_for_click(window),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output.wait_for_click(window),
    }
  }
}
