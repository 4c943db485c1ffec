// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/input/read_image_file.rs - 读取图像文件
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

use std::{
  collections::VecDeque,
  path::{Path, PathBuf},
};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{DEFAULT_FPS, timestamp_ms},
  url_to_path,
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像加载错误 {path}: {source}")]
  ImageLoadError {
    path: PathBuf,
    source: image::ImageError,
  },
  #[error("无效的路径编码: {0}")]
  PathEncoding(#[from] std::string::FromUtf8Error),
  #[error("无效的帧率: {0}")]
  InvalidFps(String),
  #[error("目录中没有图像文件: {0}")]
  EmptyDirectory(PathBuf),
}

impl From<std::io::Error> for ImageFileInputError {
  fn from(err: std::io::Error) -> Self {
    ImageFileInputError::IoError(err)
  }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

fn is_image_file(path: &Path) -> bool {
  path.is_file()
    && path
      .extension()
      .and_then(|e| e.to_str())
      .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// 单张图像或图像目录
///
/// 目录中的图像按文件名字典序逐帧读取，只有被拉取时才解码。
pub struct ImageFileInput {
  paths: VecDeque<PathBuf>,
  next_index: u64,
  fps: f64,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let fps = match url.query_pairs().find(|(k, _)| k == "fps") {
      Some((_, v)) => match v.parse::<f64>() {
        Ok(fps) if fps > 0.0 && fps.is_finite() => fps,
        _ => return Err(ImageFileInputError::InvalidFps(v.to_string())),
      },
      None => DEFAULT_FPS,
    };

    let mut input = Self::open(url_to_path(url)?)?;
    input.fps = fps;
    Ok(input)
  }
}

impl ImageFileInput {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    let paths = if path.is_dir() {
      let mut paths = Vec::new();
      for entry in std::fs::read_dir(path)? {
        let entry = entry?.path();
        if is_image_file(&entry) {
          paths.push(entry);
        }
      }
      if paths.is_empty() {
        return Err(ImageFileInputError::EmptyDirectory(path.to_path_buf()));
      }
      paths.sort();
      info!("从目录 {} 读取 {} 帧", path.display(), paths.len());
      paths
    } else {
      std::fs::metadata(path)?;
      vec![path.to_path_buf()]
    };

    Ok(ImageFileInput {
      paths: paths.into(),
      next_index: 0,
      fps: DEFAULT_FPS,
    })
  }

  pub fn remaining(&self) -> usize {
    self.paths.len()
  }
}

impl Iterator for ImageFileInput {
  type Item = Result<Frame, ImageFileInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.paths.pop_front()?;
    let index = self.next_index;
    self.next_index += 1;

    debug!("读取帧 {}: {}", index, path.display());
    let image = ImageReader::open(&path)
      .map_err(ImageFileInputError::IoError)
      .and_then(|reader| {
        reader
          .with_guessed_format()
          .map_err(ImageFileInputError::IoError)?
          .decode()
          .map_err(|source| ImageFileInputError::ImageLoadError {
            path: path.clone(),
            source,
          })
      });

    Some(image.map(|image| Frame::new(image.into(), index, timestamp_ms(index, self.fps))))
  }
}
