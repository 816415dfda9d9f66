//! 测速引擎
//! 对单个节点依次执行：连通性探测 -> 分块并发下载 -> 分块并发上传

mod body;
mod client;
mod result;
mod runner;
mod stats;

pub use body::ZeroBody;
pub use result::{
    ChunkResult, StageTotals, TestResult, aggregate_chunks, format_millis, format_percent,
    format_speed,
};
pub use runner::RunStats;
pub use stats::{DEFAULT_PING_ATTEMPTS, LatencyStats};

use log::{debug, warn};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_native_tls::TlsConnector;
use url::Url;

use crate::registry::ProxyDefinition;
use client::{ProxyClient, build_client, download_chunk, probe, upload_chunk};

pub const DEFAULT_SERVER_URL: &str = "https://speed.cloudflare.com";

#[derive(Debug, Error)]
pub enum SpeedTestError {
    #[error("初始化 TLS 失败: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("测速服务器地址无效: {0}")]
    InvalidServerUrl(#[from] url::ParseError),
    #[error("测速服务器只支持 http/https: {0}")]
    UnsupportedScheme(String),
}

/// 测速参数
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedTestConfig {
    /// 测速服务器地址，需提供 `/__down` 与 `/__up`
    pub server_url: String,
    /// 下载总字节数
    pub download_size: u64,
    /// 上传总字节数
    pub upload_size: u64,
    /// 探测请求与每个分块的超时时间
    pub timeout: Duration,
    /// 每个阶段的并发分块数
    pub concurrent: usize,
    /// 延迟超过该值不再测速
    pub max_latency: Duration,
    /// 下载速度低于该值（字节/秒）不再测上传
    pub min_download_speed: f64,
    /// 只测连通性和延迟
    pub fast_mode: bool,
    /// 大于 1 时额外做多次探测以计算抖动和丢包率
    pub ping_count: usize,
}

impl Default for SpeedTestConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            download_size: 50 * 1024 * 1024,
            upload_size: 20 * 1024 * 1024,
            timeout: Duration::from_secs(5),
            concurrent: 4,
            max_latency: Duration::from_millis(800),
            min_download_speed: 5.0 * 1024.0 * 1024.0,
            fast_mode: false,
            ping_count: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Download,
    Upload,
}

pub struct SpeedTester {
    config: SpeedTestConfig,
    tls: TlsConnector,
}

impl SpeedTester {
    pub fn new(mut config: SpeedTestConfig) -> Result<Self, SpeedTestError> {
        if config.concurrent == 0 {
            config.concurrent = 1;
        }
        config.server_url = config.server_url.trim_end_matches('/').to_string();

        let parsed = Url::parse(&config.server_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SpeedTestError::UnsupportedScheme(config.server_url));
        }

        let tls = native_tls::TlsConnector::new()?;
        Ok(Self {
            config,
            tls: TlsConnector::from(tls),
        })
    }

    pub fn config(&self) -> &SpeedTestConfig {
        &self.config
    }

    /// 测试单个节点，任何失败都只体现为结果中未填写的字段
    pub async fn test_proxy(&self, proxy: &ProxyDefinition) -> TestResult {
        let client = build_client(proxy.dialer(), &self.tls);
        let mut result = self.run_pipeline(proxy, &client).await;

        if self.config.ping_count > 1 && result.is_alive() {
            let stats = self.sample_latency(&client, self.config.ping_count).await;
            result.jitter = stats.jitter;
            result.packet_loss = stats.packet_loss;
        }

        result
    }

    async fn run_pipeline(&self, proxy: &ProxyDefinition, client: &ProxyClient) -> TestResult {
        let mut result = TestResult::new(proxy);

        let Some(latency) = probe(client, &self.config.server_url, self.config.timeout).await
        else {
            debug!("节点 {} 连通性探测失败", proxy.name());
            return result;
        };
        result.latency = latency;

        if self.config.fast_mode {
            return result;
        }

        if latency > self.config.max_latency {
            debug!(
                "节点 {} 延迟 {}ms 超过上限，跳过测速",
                proxy.name(),
                latency.as_millis()
            );
            return result;
        }

        let concurrent = self.config.concurrent as u64;

        let download_chunk_size = self.config.download_size / concurrent;
        if download_chunk_size > 0 {
            if let Some(totals) = self
                .run_stage(client, Stage::Download, download_chunk_size)
                .await
            {
                result.apply_download(totals);
            }

            if result.download_speed < self.config.min_download_speed {
                debug!(
                    "节点 {} 下载速度 {} 不达标，跳过上传测试",
                    proxy.name(),
                    result.format_download_speed()
                );
                return result;
            }
        }

        let upload_chunk_size = self.config.upload_size / concurrent;
        if upload_chunk_size > 0 {
            if let Some(totals) = self.run_stage(client, Stage::Upload, upload_chunk_size).await {
                result.apply_upload(totals);
            }
        }

        result
    }

    /// 并发执行一个阶段的全部分块，等待全部结束后汇总
    async fn run_stage(
        &self,
        client: &ProxyClient,
        stage: Stage,
        chunk_size: u64,
    ) -> Option<StageTotals> {
        let count = self.config.concurrent;
        let (tx, mut rx) = mpsc::channel(count);
        let mut tasks = Vec::with_capacity(count);

        for _ in 0..count {
            let tx = tx.clone();
            let client = client.clone();
            let server_url = self.config.server_url.clone();
            let timeout = self.config.timeout;

            let task = tokio::spawn(async move {
                let chunk = match stage {
                    Stage::Download => {
                        download_chunk(client, server_url, chunk_size, timeout).await
                    }
                    Stage::Upload => upload_chunk(client, server_url, chunk_size, timeout).await,
                };
                let _ = tx.send(chunk).await;
            });
            tasks.push(task);
        }
        drop(tx);

        for task in tasks {
            if let Err(e) = task.await {
                warn!("测速分块任务异常退出: {}", e);
            }
        }

        let mut chunks = Vec::with_capacity(count);
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }

        aggregate_chunks(&chunks)
    }

    /// 顺序做 `attempts` 次零字节探测并统计延迟
    pub async fn measure_latency(&self, proxy: &ProxyDefinition, attempts: usize) -> LatencyStats {
        let client = build_client(proxy.dialer(), &self.tls);
        self.sample_latency(&client, attempts).await
    }

    async fn sample_latency(&self, client: &ProxyClient, attempts: usize) -> LatencyStats {
        let mut samples = Vec::with_capacity(attempts);
        let mut failed = 0;

        for _ in 0..attempts {
            match probe(client, &self.config.server_url, self.config.timeout).await {
                Some(latency) => samples.push(latency),
                None => failed += 1,
            }
        }

        LatencyStats::calculate(&samples, failed, attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_config() {
        let tester = SpeedTester::new(SpeedTestConfig {
            server_url: "http://127.0.0.1:8080/".to_string(),
            concurrent: 0,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(tester.config().server_url, "http://127.0.0.1:8080");
        assert_eq!(tester.config().concurrent, 1);
    }

    #[test]
    fn test_new_rejects_bad_server() {
        let bad = |url: &str| {
            SpeedTester::new(SpeedTestConfig {
                server_url: url.to_string(),
                ..Default::default()
            })
        };
        assert!(matches!(bad("not a url"), Err(SpeedTestError::InvalidServerUrl(_))));
        assert!(matches!(
            bad("ftp://speed.example.com"),
            Err(SpeedTestError::UnsupportedScheme(_))
        ));
    }
}
