//! 测速结果表格

use colored::{Color, Colorize};
use console::measure_text_width;
use std::time::Duration;

use crate::speedtest::TestResult;

const MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Good,
    Moderate,
    Poor,
}

impl Quality {
    pub fn color(&self) -> Color {
        match self {
            Quality::Good => Color::Green,
            Quality::Moderate => Color::Yellow,
            Quality::Poor => Color::Red,
        }
    }

    /// 延迟和抖动共用一套分档，零值视为失败
    pub fn of_latency(latency: Duration) -> Self {
        if latency.is_zero() {
            Quality::Poor
        } else if latency < Duration::from_millis(800) {
            Quality::Good
        } else if latency < Duration::from_millis(1500) {
            Quality::Moderate
        } else {
            Quality::Poor
        }
    }

    pub fn of_packet_loss(percent: f64) -> Self {
        if percent < 10.0 {
            Quality::Good
        } else if percent < 20.0 {
            Quality::Moderate
        } else {
            Quality::Poor
        }
    }

    pub fn of_download(bytes_per_second: f64) -> Self {
        Self::of_speed(bytes_per_second / MB, 10.0, 5.0)
    }

    pub fn of_upload(bytes_per_second: f64) -> Self {
        Self::of_speed(bytes_per_second / MB, 5.0, 2.0)
    }

    fn of_speed(mb_per_second: f64, good: f64, moderate: f64) -> Self {
        if mb_per_second >= good {
            Quality::Good
        } else if mb_per_second >= moderate {
            Quality::Moderate
        } else {
            Quality::Poor
        }
    }
}

struct Cell {
    text: String,
    quality: Option<Quality>,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quality: None,
        }
    }

    fn rated(text: String, quality: Quality) -> Self {
        Self {
            text,
            quality: Some(quality),
        }
    }
}

fn headers(fast_mode: bool) -> Vec<&'static str> {
    let mut headers = vec!["序号", "节点名称", "类型", "延迟"];
    if !fast_mode {
        headers.extend(["抖动", "丢包率", "下载速度", "上传速度"]);
    }
    headers
}

fn row(index: usize, result: &TestResult, fast_mode: bool) -> Vec<Cell> {
    let mut cells = vec![
        Cell::plain(format!("{}.", index + 1)),
        Cell::plain(result.proxy_name.clone()),
        Cell::plain(result.proxy_type.to_string()),
        Cell::rated(result.format_latency(), Quality::of_latency(result.latency)),
    ];
    if !fast_mode {
        cells.push(Cell::rated(result.format_jitter(), Quality::of_latency(result.jitter)));
        cells.push(Cell::rated(
            result.format_packet_loss(),
            Quality::of_packet_loss(result.packet_loss),
        ));
        cells.push(Cell::rated(
            result.format_download_speed(),
            Quality::of_download(result.download_speed),
        ));
        cells.push(Cell::rated(
            result.format_upload_speed(),
            Quality::of_upload(result.upload_speed),
        ));
    }
    cells
}

/// 渲染结果表格；列宽按终端显示宽度对齐（中文占两格），颜色在补齐空白后再加
pub fn render_table(results: &[TestResult], fast_mode: bool) -> String {
    let headers = headers(fast_mode);
    let rows: Vec<Vec<Cell>> = results
        .iter()
        .enumerate()
        .map(|(i, r)| row(i, r, fast_mode))
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| measure_text_width(h)).collect();
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(measure_text_width(&cell.text));
        }
    }

    let mut output = String::new();
    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad(h, *w).bold().to_string())
        .collect();
    output.push_str(header_line.join("  ").trim_end());
    output.push('\n');

    for cells in &rows {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| {
                let text = pad(&cell.text, *w);
                match cell.quality {
                    Some(quality) => text.color(quality.color()).to_string(),
                    None => text,
                }
            })
            .collect();
        output.push_str(line.join("  ").trim_end());
        output.push('\n');
    }

    output
}

fn pad(text: &str, width: usize) -> String {
    let len = measure_text_width(text);
    format!("{}{}", text, " ".repeat(width.saturating_sub(len)))
}

pub fn print_results(results: &[TestResult], fast_mode: bool) {
    println!();
    print!("{}", render_table(results, fast_mode));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_bands() {
        assert_eq!(Quality::of_latency(Duration::ZERO), Quality::Poor);
        assert_eq!(Quality::of_latency(Duration::from_millis(799)), Quality::Good);
        assert_eq!(Quality::of_latency(Duration::from_millis(800)), Quality::Moderate);
        assert_eq!(Quality::of_latency(Duration::from_millis(1500)), Quality::Poor);
    }

    #[test]
    fn test_speed_and_loss_bands() {
        assert_eq!(Quality::of_download(10.0 * MB), Quality::Good);
        assert_eq!(Quality::of_download(5.0 * MB), Quality::Moderate);
        assert_eq!(Quality::of_download(4.9 * MB), Quality::Poor);
        assert_eq!(Quality::of_upload(5.0 * MB), Quality::Good);
        assert_eq!(Quality::of_upload(2.0 * MB), Quality::Moderate);
        assert_eq!(Quality::of_upload(0.0), Quality::Poor);
        assert_eq!(Quality::of_packet_loss(0.0), Quality::Good);
        assert_eq!(Quality::of_packet_loss(15.0), Quality::Moderate);
        assert_eq!(Quality::of_packet_loss(50.0), Quality::Poor);
    }

    fn sample(name: &str) -> TestResult {
        let config =
            serde_yaml::from_str(&format!("name: {name}\ntype: vmess\nserver: s\n")).unwrap();
        let proxy = crate::registry::ProxyDefinition::new(
            name.to_string(),
            config,
            std::sync::Arc::new(crate::dialer::DirectDialer),
        );
        let mut result = TestResult::new(&proxy);
        result.latency = Duration::from_millis(120);
        result.download_speed = 1536.0;
        result
    }

    #[test]
    fn test_render_columns() {
        colored::control::set_override(false);
        let results = vec![sample("HK 01"), sample("JP")];

        let full = render_table(&results, false);
        let lines: Vec<_> = full.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("序号"));
        assert!(lines[0].ends_with("上传速度"));
        assert!(lines[1].starts_with("1.  "));
        assert!(lines[1].contains("HK 01"));
        assert!(lines[1].contains("Vmess"));
        assert!(lines[1].contains("120ms"));
        assert!(lines[1].contains("1.50KB/s"));

        let fast = render_table(&results, true);
        assert!(fast.lines().next().unwrap().ends_with("延迟"));
        assert!(!fast.contains("KB/s"));
    }

    #[test]
    fn test_wide_names_stay_aligned() {
        colored::control::set_override(false);
        let results = vec![sample("香港 01"), sample("JP")];
        let table = render_table(&results, true);
        let lines: Vec<_> = table.lines().collect();

        let offset = |line: &str, needle: &str| {
            let at = line.find(needle).unwrap();
            measure_text_width(&line[..at])
        };
        let header = offset(lines[0], "类型");
        assert_eq!(offset(lines[1], "Vmess"), header);
        assert_eq!(offset(lines[2], "Vmess"), header);
    }
}
