// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/main.rs - 摆迹命令行入口
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

use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

use bobtrack::{
  FromUrl,
  config::TrackerConfig,
  input::InputWrapper,
  output::{CsvRecord, OutputWrapper, PointPicker, parse_point},
  pipeline::Termination,
  task::{ContinuousTask, Task},
};
use tracing::{info, warn};

/// 从摆动视频中提取摆锤轨迹
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源，例如 image:///data/frames 或 gst://file/data/pendulum.mp4
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 显示输出，例如 null://、image:///tmp/preview.png 或 folder:///tmp/record
  #[arg(long, value_name = "OUTPUT", default_value = "null://")]
  pub output: Url,
  /// JSON 配置文件
  #[arg(long, value_name = "CONFIG")]
  pub config: Option<PathBuf>,
  /// 预设支点坐标 x,y，不设置时在终端输入
  #[arg(long, value_name = "X,Y")]
  pub pivot: Option<String>,
  /// 轨迹 CSV 输出路径
  #[arg(long, value_name = "CSV")]
  pub record: Option<PathBuf>,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
  /// 跳过第一帧的透视标定
  #[arg(long)]
  pub no_calibration: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("显示输出: {}", args.output);

  let mut config = match &args.config {
    Some(path) => TrackerConfig::from_file(path)
      .with_context(|| format!("无法读取配置文件 {}", path.display()))?,
    None => TrackerConfig::default(),
  };
  if args.no_calibration {
    config.calibration_enabled = false;
  }

  let input = InputWrapper::from_url(&args.input)?;
  let mut output = OutputWrapper::from_url(&args.output)?;
  if let Some(pivot) = &args.pivot {
    let (x, y) = parse_point(pivot).with_context(|| format!("无法解析支点坐标 '{}'", pivot))?;
    output = output.with_picker(PointPicker::Preset(x, y));
  }

  let record = match &args.record {
    Some(path) => {
      info!("轨迹记录路径: {}", path.display());
      Some(CsvRecord::create(path).with_context(|| format!("无法创建 {}", path.display()))?)
    }
    None => None,
  };

  let summary = ContinuousTask::new(config)
    .with_frame_number(args.frame_number)
    .run_task(input, output, record)?;

  match summary.termination {
    Termination::Cancelled => warn!("支点选择被取消，没有输出任何样本"),
    Termination::QuitRequested => warn!("运行被中断"),
    _ => {}
  }
  info!(
    "共读取 {} 帧，输出 {} 个样本，{} 帧未检测到摆锤",
    summary.frames, summary.samples, summary.misses
  );

  Ok(())
}
