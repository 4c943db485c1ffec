// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/output/record.rs - 轨迹记录
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
  convert::Infallible,
  fs::File,
  io::{BufWriter, Write},
  path::Path,
};

use crate::pipeline::TrajectorySample;

const CSV_HEADER: &str = "frame_index,timestamp_ms,x,y,radius,angle_deg";

/// 轨迹样本的消费端
pub trait TrajectorySink {
  type Error;

  fn record(&mut self, sample: &TrajectorySample) -> Result<(), Self::Error>;

  fn finish(&mut self) -> Result<(), Self::Error> {
    Ok(())
  }
}

impl TrajectorySink for Vec<TrajectorySample> {
  type Error = Infallible;

  fn record(&mut self, sample: &TrajectorySample) -> Result<(), Self::Error> {
    self.push(*sample);
    Ok(())
  }
}

impl<S: TrajectorySink + ?Sized> TrajectorySink for &mut S {
  type Error = S::Error;

  fn record(&mut self, sample: &TrajectorySample) -> Result<(), Self::Error> {
    (**self).record(sample)
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    (**self).finish()
  }
}

impl<S: TrajectorySink> TrajectorySink for Option<S> {
  type Error = S::Error;

  fn record(&mut self, sample: &TrajectorySample) -> Result<(), Self::Error> {
    match self {
      Some(sink) => sink.record(sample),
      None => Ok(()),
    }
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    match self {
      Some(sink) => sink.finish(),
      None => Ok(()),
    }
  }
}

/// 以 CSV 格式写出轨迹，每个样本一行
pub struct CsvRecord<W: Write> {
  writer: W,
  header_written: bool,
}

impl CsvRecord<BufWriter<File>> {
  pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
    if let Some(parent) = path.as_ref().parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    Ok(Self::new(BufWriter::new(File::create(path)?)))
  }
}

impl<W: Write> CsvRecord<W> {
  pub fn new(writer: W) -> Self {
    Self {
      writer,
      header_written: false,
    }
  }

  pub fn into_inner(self) -> W {
    self.writer
  }

  fn write_header(&mut self) -> std::io::Result<()> {
    if !self.header_written {
      writeln!(self.writer, "{}", CSV_HEADER)?;
      self.header_written = true;
    }
    Ok(())
  }
}

impl<W: Write> TrajectorySink for CsvRecord<W> {
  type Error = std::io::Error;

  fn record(&mut self, sample: &TrajectorySample) -> Result<(), Self::Error> {
    self.write_header()?;
    writeln!(
      self.writer,
      "{},{},{:.3},{:.3},{:.3},{:.4}",
      sample.frame_index,
      sample.timestamp_ms,
      sample.bob_position.0,
      sample.bob_position.1,
      sample.radius,
      sample.angle_degrees()
    )
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    self.write_header()?;
    self.writer.flush()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample(frame_index: u64, angle: f64) -> TrajectorySample {
    TrajectorySample {
      frame_index,
      timestamp_ms: frame_index * 40,
      bob_position: (150.5, 140.25),
      radius: 12.0,
      angle,
    }
  }

  #[test]
  fn csv_rows_follow_header() {
    let mut record = CsvRecord::new(Vec::new());
    record.record(&sample(1, 0.0)).unwrap();
    record.record(&sample(2, std::f64::consts::FRAC_PI_2)).unwrap();
    record.finish().unwrap();

    let text = String::from_utf8(record.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines[1], "1,40,150.500,140.250,12.000,0.0000");
    assert_eq!(lines[2], "2,80,150.500,140.250,12.000,90.0000");
    assert_eq!(lines.len(), 3);
  }

  #[test]
  fn empty_trajectory_still_has_header() {
    let mut record = CsvRecord::new(Vec::new());
    record.finish().unwrap();
    assert_eq!(String::from_utf8(record.into_inner()).unwrap(), format!("{}\n", CSV_HEADER));
  }

  #[test]
  fn absent_sink_ignores_samples() {
    let mut sink: Option<Vec<TrajectorySample>> = None;
    sink.record(&sample(0, 0.0)).unwrap();
    assert!(sink.is_none());

    let mut sink = Some(Vec::new());
    sink.record(&sample(3, 0.1)).unwrap();
    assert_eq!(sink.unwrap()[0].frame_index, 3);
  }
}
