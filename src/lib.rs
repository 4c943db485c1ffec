// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod calibration;
pub mod config;
pub mod frame;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod pivot;
pub mod task;
pub mod tracker;
pub mod vision;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 将 URL 的主机与路径部分还原为本地路径
///
/// `image:///abs/a.png` 得到 `/abs/a.png`，`image://rel/a.png` 得到 `rel/a.png`。
pub fn url_to_path(url: &url::Url) -> Result<std::path::PathBuf, std::string::FromUtf8Error> {
  let host = url.host_str().unwrap_or_default();
  let path = urlencoding::decode(url.path())?;
  Ok(std::path::PathBuf::from(format!("{}{}", host, path)))
}
