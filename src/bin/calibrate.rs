// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/bin/calibrate.rs - 单帧透视标定工具
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

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use serde::Serialize;
use url::Url;

use bobtrack::{
  FromUrl,
  calibration::{CALIBRATION_MARKERS, Calibrator, Homography},
  config::TrackerConfig,
  input::InputWrapper,
  vision::{ColorSegmenter, MarkerCandidate, detect_markers},
};
use tracing::info;

/// 在第一帧上检测标定标记并输出单应矩阵
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// JSON 配置文件
  #[arg(long, value_name = "CONFIG")]
  pub config: Option<PathBuf>,
  /// 保存矫正后图像的路径
  #[arg(long, value_name = "IMAGE")]
  pub warped: Option<PathBuf>,
}

#[derive(Serialize)]
struct CalibrationReport<'a> {
  frame_index: u64,
  markers: &'a [MarkerCandidate],
  homography: &'a Homography,
  output_size: (u32, u32),
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("输入来源: {}", args.input);

  let config = match &args.config {
    Some(path) => TrackerConfig::from_file(path)
      .with_context(|| format!("无法读取配置文件 {}", path.display()))?,
    None => TrackerConfig::default(),
  };

  let mut input = InputWrapper::from_url(&args.input)?;
  let frame = input.next().ok_or_else(|| anyhow!("没有输入帧"))??;

  let segmenter = ColorSegmenter::new(config.blur_kernel_size);
  let markers = detect_markers(
    &segmenter,
    &frame.image,
    &config.color_range_markers,
    CALIBRATION_MARKERS,
    config.bottom_mask_rows,
  );
  let calibration = Calibrator::from_config(&config)?.calibrate(&markers)?;

  let report = CalibrationReport {
    frame_index: frame.index,
    markers: calibration.markers(),
    homography: calibration.homography(),
    output_size: calibration.output_size(),
  };
  println!("{}", serde_json::to_string_pretty(&report)?);

  if let Some(path) = &args.warped {
    calibration
      .warp(&frame.image)
      .save(path)
      .with_context(|| format!("无法保存矫正图像 {}", path.display()))?;
    info!("矫正图像已保存到 {}", path.display());
  }

  Ok(())
}
