// 该文件是 Bobtrack （摆迹） 项目的一部分。
// src/output/pick.rs - 支点坐标来源
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

use std::io::{BufRead, Write};

use thiserror::Error;
use url::Url;

use crate::output::Click;

#[derive(Error, Debug)]
#[error("无效的支点坐标: {0}")]
pub struct InvalidPivot(pub String);

/// `wait_for_click` 的坐标来源
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PointPicker {
  /// 预先给定的坐标
  Preset(f64, f64),
  /// 在终端提示用户输入 `x,y`，输入 `q` 取消
  #[default]
  Prompt,
  /// 总是取消
  Cancel,
}

impl PointPicker {
  /// 从 URL 查询参数 `pivot=x,y` 或 `pivot=cancel` 读取，缺省为终端输入
  pub fn from_url(url: &Url) -> Result<Self, InvalidPivot> {
    let Some((_, value)) = url.query_pairs().find(|(k, _)| k == "pivot") else {
      return Ok(PointPicker::Prompt);
    };
    if value == "cancel" {
      return Ok(PointPicker::Cancel);
    }
    let (x, y) = parse_point(&value).ok_or_else(|| InvalidPivot(value.to_string()))?;
    Ok(PointPicker::Preset(x, y))
  }

  pub fn pick(&self, window: &str) -> Result<Click, std::io::Error> {
    match *self {
      PointPicker::Preset(x, y) => Ok(Click::Point(x, y)),
      PointPicker::Cancel => Ok(Click::Cancelled),
      PointPicker::Prompt => {
        let stdin = std::io::stdin();
        prompt_point(stdin.lock(), std::io::stderr(), window)
      }
    }
  }
}

/// 解析 `x,y` 形式的坐标
pub fn parse_point(text: &str) -> Option<(f64, f64)> {
  let (x, y) = text.split_once(',')?;
  let x: f64 = x.trim().parse().ok()?;
  let y: f64 = y.trim().parse().ok()?;
  (x.is_finite() && y.is_finite()).then_some((x, y))
}

/// 反复提示直到读到合法坐标；读到 `q` 或输入结束时视为取消
pub fn prompt_point<R: BufRead, W: Write>(
  mut reader: R,
  mut writer: W,
  window: &str,
) -> std::io::Result<Click> {
  let mut line = String::new();
  loop {
    write!(writer, "[{}] 请输入支点坐标 x,y（q 取消）: ", window)?;
    writer.flush()?;

    line.clear();
    if reader.read_line(&mut line)? == 0 {
      return Ok(Click::Cancelled);
    }

    let input = line.trim();
    if input.eq_ignore_ascii_case("q") {
      return Ok(Click::Cancelled);
    }
    if let Some((x, y)) = parse_point(input) {
      return Ok(Click::Point(x, y));
    }
    writeln!(writer, "无法解析坐标: {}", input)?;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_points() {
    assert_eq!(parse_point("12,34"), Some((12.0, 34.0)));
    assert_eq!(parse_point(" 1.5 , -2 "), Some((1.5, -2.0)));
    assert_eq!(parse_point("12"), None);
    assert_eq!(parse_point("a,b"), None);
    assert_eq!(parse_point("inf,0"), None);
  }

  #[test]
  fn prompt_retries_until_valid() {
    let input = b"nonsense\n320, 41\n" as &[u8];
    let mut echo = Vec::new();
    let click = prompt_point(input, &mut echo, "Select").unwrap();
    assert_eq!(click, Click::Point(320.0, 41.0));
    let echo = String::from_utf8(echo).unwrap();
    assert!(echo.contains("无法解析坐标: nonsense"));
  }

  #[test]
  fn prompt_cancels_on_q_or_eof() {
    assert_eq!(
      prompt_point(b"q\n" as &[u8], std::io::sink(), "w").unwrap(),
      Click::Cancelled
    );
    assert_eq!(
      prompt_point(b"" as &[u8], std::io::sink(), "w").unwrap(),
      Click::Cancelled
    );
  }

  #[test]
  fn picker_from_url_query() {
    let url = Url::parse("folder:///tmp/out?pivot=5,6").unwrap();
    assert_eq!(PointPicker::from_url(&url).unwrap(), PointPicker::Preset(5.0, 6.0));

    let url = Url::parse("null://?pivot=cancel").unwrap();
    assert_eq!(PointPicker::from_url(&url).unwrap(), PointPicker::Cancel);

    let url = Url::parse("null://").unwrap();
    assert_eq!(PointPicker::from_url(&url).unwrap(), PointPicker::Prompt);

    let url = Url::parse("null://?pivot=abc").unwrap();
    assert!(PointPicker::from_url(&url).is_err());
  }
}
