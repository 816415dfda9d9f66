//! 测速结果与展示格式化

use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::proxy::{ProxyConfig, ProxyType};
use crate::registry::ProxyDefinition;

/// 单个分块（一次下载或上传子任务）的测量值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkResult {
    pub bytes: u64,
    pub duration: Duration,
}

/// 一个阶段所有成功分块的汇总
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTotals {
    /// 成功分块传输的总字节数
    pub bytes: u64,
    /// 成功分块耗时的平均值
    pub duration: Duration,
    /// 字节/秒
    pub speed: f64,
}

/// 汇总分块结果，失败的分块（`None`）不参与统计；全部失败时返回 `None`
pub fn aggregate_chunks(chunks: &[Option<ChunkResult>]) -> Option<StageTotals> {
    let successful: Vec<&ChunkResult> = chunks.iter().flatten().collect();
    if successful.is_empty() {
        return None;
    }

    let bytes: u64 = successful.iter().map(|c| c.bytes).sum();
    let total: Duration = successful.iter().map(|c| c.duration).sum();
    let duration = total / successful.len() as u32;
    let speed = if duration.is_zero() {
        0.0
    } else {
        bytes as f64 / duration.as_secs_f64()
    };

    Some(StageTotals {
        bytes,
        duration,
        speed,
    })
}

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(value.as_millis())
}

/// 单个节点的测速记录
///
/// 数值字段为零表示测试没有进行到该阶段，而不是测得零值。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub proxy_name: String,
    pub proxy_type: ProxyType,
    pub proxy_config: ProxyConfig,
    #[serde(serialize_with = "serialize_millis")]
    pub latency: Duration,
    #[serde(serialize_with = "serialize_millis")]
    pub jitter: Duration,
    pub packet_loss: f64,
    pub download_size: u64,
    #[serde(serialize_with = "serialize_millis")]
    pub download_time: Duration,
    pub download_speed: f64,
    pub upload_size: u64,
    #[serde(serialize_with = "serialize_millis")]
    pub upload_time: Duration,
    pub upload_speed: f64,
}

impl TestResult {
    /// 只带节点信息的空结果
    pub fn new(proxy: &ProxyDefinition) -> Self {
        Self {
            proxy_name: proxy.name().to_string(),
            proxy_type: proxy.proxy_type(),
            proxy_config: proxy.config().clone(),
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
            packet_loss: 0.0,
            download_size: 0,
            download_time: Duration::ZERO,
            download_speed: 0.0,
            upload_size: 0,
            upload_time: Duration::ZERO,
            upload_speed: 0.0,
        }
    }

    /// 连通性探测是否成功
    pub fn is_alive(&self) -> bool {
        !self.latency.is_zero()
    }

    pub(crate) fn apply_download(&mut self, totals: StageTotals) {
        self.download_size = totals.bytes;
        self.download_time = totals.duration;
        self.download_speed = totals.speed;
    }

    pub(crate) fn apply_upload(&mut self, totals: StageTotals) {
        self.upload_size = totals.bytes;
        self.upload_time = totals.duration;
        self.upload_speed = totals.speed;
    }

    pub fn format_latency(&self) -> String {
        format_millis(self.latency)
    }

    pub fn format_jitter(&self) -> String {
        format_millis(self.jitter)
    }

    pub fn format_packet_loss(&self) -> String {
        format_percent(self.packet_loss)
    }

    pub fn format_download_speed(&self) -> String {
        format_speed(self.download_speed)
    }

    pub fn format_upload_speed(&self) -> String {
        format_speed(self.upload_speed)
    }
}

/// 以 1024 为进制格式化速率，如 `1536.0` -> `1.50KB/s`
pub fn format_speed(bytes_per_second: f64) -> String {
    const UNITS: [&str; 5] = ["B/s", "KB/s", "MB/s", "GB/s", "TB/s"];

    let mut speed = bytes_per_second;
    let mut unit = 0;
    while speed >= 1024.0 && unit < UNITS.len() - 1 {
        speed /= 1024.0;
        unit += 1;
    }
    format!("{:.2}{}", speed, UNITS[unit])
}

/// 毫秒文本，零值显示为 `N/A`
pub fn format_millis(duration: Duration) -> String {
    if duration.is_zero() {
        "N/A".to_string()
    } else {
        format!("{}ms", duration.as_millis())
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}
