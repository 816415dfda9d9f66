use futures::stream::{self, StreamExt};
use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{SpeedTester, TestResult};
use crate::registry::ProxyRegistry;

/// 一轮测速的统计计数
#[derive(Debug, Default)]
pub struct RunStats {
    pub total_nodes: AtomicU64,
    pub tested_nodes: AtomicU64,
    pub alive_nodes: AtomicU64,
    pub failed_nodes: AtomicU64,
    pub total_bytes: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, result: &TestResult) {
        self.tested_nodes.fetch_add(1, Ordering::Relaxed);
        if result.is_alive() {
            self.alive_nodes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_nodes.fetch_add(1, Ordering::Relaxed);
        }
        self.total_bytes
            .fetch_add(result.download_size + result.upload_size, Ordering::Relaxed);
    }

    pub fn success_rate(&self) -> f64 {
        let tested = self.tested_nodes.load(Ordering::Relaxed);
        let alive = self.alive_nodes.load(Ordering::Relaxed);

        if tested > 0 {
            (alive as f64 / tested as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn print(&self) {
        let total = self.total_nodes.load(Ordering::Relaxed);
        let tested = self.tested_nodes.load(Ordering::Relaxed);
        let alive = self.alive_nodes.load(Ordering::Relaxed);
        let failed = self.failed_nodes.load(Ordering::Relaxed);
        let total_bytes = self.total_bytes.load(Ordering::Relaxed);

        println!("测速统计:");
        println!("  总节点数: {}", total);
        println!("  已测速数: {}", tested);
        println!("  可用节点: {}", alive);
        println!("  失败节点: {}", failed);
        println!(
            "  总消耗流量: {:.3} GB",
            total_bytes as f64 / 1024.0 / 1024.0 / 1024.0
        );
        if tested > 0 {
            println!("  成功率: {:.2}%", self.success_rate());
        }
    }
}

impl SpeedTester {
    /// 测试注册表中的全部节点，最多同时测试 `parallel` 个；每完成一个节点回调一次
    pub async fn test_all<F>(
        &self,
        registry: &ProxyRegistry,
        parallel: usize,
        stats: Arc<RunStats>,
        mut on_result: F,
    ) -> Vec<TestResult>
    where
        F: FnMut(&TestResult),
    {
        stats
            .total_nodes
            .store(registry.len() as u64, Ordering::Relaxed);

        let mut results = Vec::with_capacity(registry.len());
        let mut pending = stream::iter(registry.iter())
            .map(|proxy| self.test_proxy(proxy))
            .buffer_unordered(parallel.max(1));

        while let Some(result) = pending.next().await {
            stats.record(&result);
            on_result(&result);
            results.push(result);
        }

        info!(
            "测速完成: {} 个节点, {} 个可用",
            results.len(),
            stats.alive_nodes.load(Ordering::Relaxed)
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result_with(latency_ms: u64, download: u64, upload: u64) -> TestResult {
        let config = serde_yaml::from_str("name: n\ntype: socks5\nserver: 127.0.0.1\n").unwrap();
        let proxy = crate::registry::ProxyDefinition::new(
            "n".to_string(),
            config,
            Arc::new(crate::dialer::DirectDialer),
        );
        let mut result = TestResult::new(&proxy);
        result.latency = Duration::from_millis(latency_ms);
        result.download_size = download;
        result.upload_size = upload;
        result
    }

    #[test]
    fn test_record_counts() {
        let stats = RunStats::new();
        stats.record(&result_with(100, 1000, 500));
        stats.record(&result_with(0, 0, 0));
        stats.record(&result_with(30, 0, 0));

        assert_eq!(stats.tested_nodes.load(Ordering::Relaxed), 3);
        assert_eq!(stats.alive_nodes.load(Ordering::Relaxed), 2);
        assert_eq!(stats.failed_nodes.load(Ordering::Relaxed), 1);
        assert_eq!(stats.total_bytes.load(Ordering::Relaxed), 1500);
        assert!((stats.success_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_success_rate_empty() {
        assert_eq!(RunStats::new().success_rate(), 0.0);
    }
}
