//! 多次探测的延迟统计

use std::time::Duration;

/// 多次探测模式下默认的尝试次数
pub const DEFAULT_PING_ATTEMPTS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyStats {
    pub average: Duration,
    /// 成功样本的总体标准差
    pub jitter: Duration,
    /// 失败次数占尝试次数的百分比
    pub packet_loss: f64,
}

impl LatencyStats {
    pub fn calculate(samples: &[Duration], failed: usize, attempts: usize) -> Self {
        let packet_loss = if attempts == 0 {
            0.0
        } else {
            failed as f64 / attempts as f64 * 100.0
        };

        if samples.is_empty() {
            return Self {
                packet_loss,
                ..Self::default()
            };
        }

        let total: Duration = samples.iter().sum();
        let average = total / samples.len() as u32;

        let mean = average.as_nanos() as f64;
        let variance = samples
            .iter()
            .map(|sample| {
                let diff = sample.as_nanos() as f64 - mean;
                diff * diff
            })
            .sum::<f64>()
            / samples.len() as f64;

        Self {
            average,
            jitter: Duration::from_nanos(variance.sqrt() as u64),
            packet_loss,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|v| Duration::from_millis(*v)).collect()
    }

    #[test]
    fn test_average_and_jitter() {
        let stats = LatencyStats::calculate(&ms(&[10, 20, 30]), 0, 3);
        assert_eq!(stats.average, Duration::from_millis(20));
        // sqrt(200/3) ms
        assert_eq!(stats.jitter.as_micros(), 8164);
        assert_eq!(stats.packet_loss, 0.0);
    }

    #[test]
    fn test_constant_samples_have_no_jitter() {
        let stats = LatencyStats::calculate(&ms(&[50, 50, 50, 50]), 2, DEFAULT_PING_ATTEMPTS);
        assert_eq!(stats.average, Duration::from_millis(50));
        assert_eq!(stats.jitter, Duration::ZERO);
        assert!((stats.packet_loss - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_no_successful_samples() {
        let stats = LatencyStats::calculate(&[], 6, DEFAULT_PING_ATTEMPTS);
        assert_eq!(stats.average, Duration::ZERO);
        assert_eq!(stats.jitter, Duration::ZERO);
        assert_eq!(stats.packet_loss, 100.0);
    }

    #[test]
    fn test_single_sample() {
        let stats = LatencyStats::calculate(&ms(&[42]), 0, 1);
        assert_eq!(stats.average, Duration::from_millis(42));
        assert_eq!(stats.jitter, Duration::ZERO);
    }

    #[test]
    fn test_zero_attempts() {
        let stats = LatencyStats::calculate(&[], 0, 0);
        assert_eq!(stats, LatencyStats::default());
    }
}
