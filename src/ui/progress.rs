use indicatif::{ProgressBar, ProgressStyle};

use crate::speedtest::TestResult;

/// 测速进度条，未启用时所有操作为空操作；计数由 `RunStats` 负责
#[derive(Clone)]
pub struct ProgressTracker {
    progress: Option<ProgressBar>,
}

impl ProgressTracker {
    pub fn new(total: u64, enabled: bool) -> Self {
        let progress = enabled.then(|| {
            let style = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

            let pb = ProgressBar::new(total);
            pb.set_style(style);
            pb.set_message("测速中...");
            pb
        });

        Self { progress }
    }

    /// 一个节点测试完成
    pub fn record(&self, result: &TestResult) {
        if let Some(pb) = &self.progress {
            pb.inc(1);
            let mark = if result.is_alive() { "✅" } else { "❌" };
            pb.set_message(format!("{} {}", mark, result.proxy_name));
        }
    }

    pub fn finalize(&self) {
        if let Some(pb) = &self.progress {
            if let Some(total) = pb.length() {
                pb.set_position(total);
            }
            pb.finish_with_message("测速完成");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialer::DirectDialer;
    use crate::registry::ProxyDefinition;
    use std::sync::Arc;
    use std::time::Duration;

    fn result(alive: bool) -> TestResult {
        let config = serde_yaml::from_str("name: n\ntype: http\nserver: h\n").unwrap();
        let proxy = ProxyDefinition::new("n".to_string(), config, Arc::new(DirectDialer));
        let mut result = TestResult::new(&proxy);
        if alive {
            result.latency = Duration::from_millis(50);
        }
        result
    }

    #[test]
    fn test_disabled_tracker_is_noop() {
        let tracker = ProgressTracker::new(3, false);
        assert!(tracker.progress.is_none());
        tracker.record(&result(true));
        tracker.finalize();
    }

    #[test]
    fn test_bar_advances_per_result() {
        let tracker = ProgressTracker::new(3, true);
        tracker.record(&result(true));
        tracker.record(&result(false));

        let pb = tracker.progress.as_ref().unwrap();
        assert_eq!(pb.position(), 2);
        assert!(pb.message().starts_with("❌"));

        tracker.finalize();
        assert_eq!(pb.position(), 3);
        assert!(pb.is_finished());
    }
}
