// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频文件输入
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

//! # GStreamer 视频输入模块
//!
//! 通过 GStreamer 解码视频文件，逐帧输出 RGB 图像。
//!
//! ## 系统依赖
//!
//! 使用前需要安装 GStreamer 开发库：
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! ## 基本用法
//!
//! ```no_run
//! use bobtrack::{FromUrl, input::GStreamerInputPipelineBuilder};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("gst://file/data/pendulum.mp4?rotate=180")?;
//! let input = GStreamerInputPipelineBuilder::from_url(&url)?.build()?;
//!
//! for frame in input {
//!     let frame = frame?;
//!     println!("帧 {}: {}x{}", frame.index, frame.width(), frame.height());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! 视频文件必须逐帧完整读取，appsink 不丢帧。

use std::collections::HashMap;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{DEFAULT_FPS, timestamp_ms},
};

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不匹配（期望 "gst://file/..."）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取 appsink 元素
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  /// 无法转换元素为 appsink
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  /// 无法从 caps 获取视频信息
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  /// 不支持的视频格式
  #[error("Unsupported video format")]
  UnsupportedFormat,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 缓冲区大小不匹配
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  /// 路径编码错误
  #[error("Invalid path encoding: {0}")]
  PathEncoding(#[from] std::string::FromUtf8Error),
}

pub enum GStreamerInputBuilderItem {
  FileSource(String),
  TargetFormat { format: String },
  VideoFlip { method: u32, direction: u32 },
}

impl GStreamerInputBuilderItem {
  fn to_pipeline(&self) -> String {
    match self {
      GStreamerInputBuilderItem::FileSource(path) => {
        format!("filesrc location=\"{}\" ! decodebin", path)
      }
      GStreamerInputBuilderItem::TargetFormat { format } => {
        format!("videoconvert ! video/x-raw,format={}", format)
      }
      GStreamerInputBuilderItem::VideoFlip { method, direction } => {
        format!("videoflip method={} video-direction={}", method, direction)
      }
    }
  }
}

/// GStreamer 输入管道构建器
pub struct GStreamerInputPipelineBuilder {
  items: Vec<GStreamerInputBuilderItem>,
  fps: Option<f64>,
}

impl GStreamerInputPipelineBuilder {
  pub fn file(path: &str) -> Self {
    Self {
      items: vec![GStreamerInputBuilderItem::FileSource(path.to_string())],
      fps: None,
    }
  }

  pub fn rotate(mut self, rotate: &str) -> Self {
    if let Some(video_flip) = Self::video_flip(rotate) {
      self.items.push(video_flip);
    }
    self
  }

  fn video_flip(rotate: &str) -> Option<GStreamerInputBuilderItem> {
    let (method, direction) = match rotate {
      "90" => (1, 1),
      "180" => (2, 2),
      "270" => (3, 3),
      _ => return None,
    };
    Some(GStreamerInputBuilderItem::VideoFlip { method, direction })
  }

  fn pipeline_description(&self) -> String {
    let basic_pipeline = self
      .items
      .iter()
      .chain(std::iter::once(&GStreamerInputBuilderItem::TargetFormat {
        format: "RGB".to_string(),
      }))
      .map(GStreamerInputBuilderItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    format!("{} ! appsink name=sink sync=false", basic_pipeline)
  }

  pub fn build(self) -> Result<GStreamerInput, GStreamerInputError> {
    GStreamerInput::launch(&self.pipeline_description(), self.fps)
  }
}

impl FromUrlWithScheme for GStreamerInputPipelineBuilder {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerInputPipelineBuilder {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME || url.host_str() != Some("file") {
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();

    let path = urlencoding::decode(url.path())?;
    let mut builder = Self::file(&path);
    if let Some(rotate) = query.get("rotate") {
      builder = builder.rotate(rotate);
    }
    builder.fps = query.get("fps").and_then(|v| v.parse::<f64>().ok());

    Ok(builder)
  }
}

/// GStreamer 视频输入
///
/// 每次拉取一帧，流结束时迭代结束。
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  next_index: u64,
  fps: Option<f64>,
  finished: bool,
}

impl GStreamerInput {
  fn launch(description: &str, fps: Option<f64>) -> Result<Self, GStreamerInputError> {
    gst::init()?;
    info!("GStreamer pipeline description: {}", description);

    let pipeline = gst::parse::launch(description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(Self {
      pipeline,
      appsink,
      next_index: 0,
      fps,
      finished: false,
    })
  }

  /// 拉取失败且未到 EOS 时，从总线上取出导致失败的错误
  fn pull_error(&self) -> GStreamerInputError {
    match self.pipeline.bus() {
      Some(bus) => bus_error(&bus),
      None => GStreamerInputError::PipelineError("Pipeline has no bus".to_string()),
    }
  }
}

fn bus_error(bus: &gst::Bus) -> GStreamerInputError {
  while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
    if let gst::MessageView::Error(err) = msg.view() {
      let source = err
        .src()
        .map(|s| s.path_string().to_string())
        .unwrap_or_else(|| "unknown".to_string());
      return GStreamerInputError::PipelineError(format!("{}: {}", source, err.error()));
    }
  }
  GStreamerInputError::PipelineError("appsink stopped before end of stream".to_string())
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl Iterator for GStreamerInput {
  type Item = Result<Frame, GStreamerInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }
    let sample = match self.appsink.pull_sample() {
      Ok(sample) => sample,
      Err(_) => {
        self.finished = true;
        if self.appsink.is_eos() {
          return None;
        }
        let err = self.pull_error();
        warn!("GStreamer 拉取帧失败: {}", err);
        return Some(Err(err));
      }
    };
    let index = self.next_index;
    self.next_index += 1;

    let timestamp = match (self.fps, sample.buffer().and_then(|b| b.pts())) {
      (None, Some(pts)) => pts.mseconds(),
      (fps, _) => timestamp_ms(index, fps.unwrap_or(DEFAULT_FPS)),
    };

    Some(convert_sample(&sample).map(|image| Frame::new(image, index, timestamp)))
  }
}

fn convert_sample(sample: &gst::Sample) -> Result<RgbImage, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;

  let map = buffer.map_readable().map_err(|e| {
    GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;
  let data = map.as_slice();

  let expected_size = stride * height.saturating_sub(1) + width * 3;
  if height > 0 && data.len() < expected_size {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected: expected_size,
      actual: data.len(),
    });
  }

  // 行之间可能有填充，按 stride 逐行拷贝
  let mut pixels = Vec::with_capacity(width * height * 3);
  match video_info.format() {
    gst_video::VideoFormat::Rgb => {
      for row in 0..height {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + width * 3]);
      }
    }
    gst_video::VideoFormat::Bgr => {
      for row in 0..height {
        let start = row * stride;
        for bgr in data[start..start + width * 3].chunks_exact(3) {
          pixels.extend_from_slice(&[bgr[2], bgr[1], bgr[0]]);
        }
      }
    }
    _ => return Err(GStreamerInputError::UnsupportedFormat),
  }

  RgbImage::from_raw(width as u32, height as u32, pixels)
    .ok_or_else(|| GStreamerInputError::PipelineError("Frame buffer too small".to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_url_builds_pipeline() {
    let url = Url::parse("gst://file/data/my%20run.mp4?rotate=180").unwrap();
    let builder = GStreamerInputPipelineBuilder::from_url(&url).unwrap();
    assert_eq!(
      builder.pipeline_description(),
      "filesrc location=\"/data/my run.mp4\" ! decodebin ! videoflip method=2 video-direction=2 \
       ! videoconvert ! video/x-raw,format=RGB ! appsink name=sink sync=false"
    );
  }

  const TEST_SOURCE: &str = "videotestsrc num-buffers=2 ! video/x-raw,width=8,height=6 \
    ! videoconvert ! video/x-raw,format=RGB ! appsink name=sink sync=false";

  #[test]
  fn end_of_stream_ends_iteration() {
    let input = GStreamerInput::launch(TEST_SOURCE, Some(10.0)).unwrap();
    let frames: Vec<_> = input.collect();
    assert_eq!(frames.len(), 2);
    let last = frames[1].as_ref().unwrap();
    assert_eq!((last.index, last.timestamp_ms), (1, 100));
  }

  #[test]
  fn stopped_pipeline_yields_error_then_ends() {
    let mut input = GStreamerInput::launch(TEST_SOURCE, None).unwrap();
    input.pipeline.set_state(gst::State::Null).unwrap();
    assert!(matches!(
      input.next(),
      Some(Err(GStreamerInputError::PipelineError(_)))
    ));
    assert!(input.next().is_none());
  }

  #[test]
  fn bus_error_message_is_reported() {
    gst::init().unwrap();
    let bus = gst::Bus::new();
    bus
      .post(gst::message::Error::new(gst::CoreError::Failed, "decoder exploded"))
      .unwrap();
    match bus_error(&bus) {
      GStreamerInputError::PipelineError(msg) => {
        assert!(msg.contains("decoder exploded"), "{}", msg)
      }
      other => panic!("unexpected error: {:?}", other),
    }
  }

  #[test]
  fn camera_urls_are_rejected() {
    let url = Url::parse("gst://camera/dev/video0").unwrap();
    assert!(matches!(
      GStreamerInputPipelineBuilder::from_url(&url),
      Err(GStreamerInputError::SchemeMismatch)
    ));
  }
}
