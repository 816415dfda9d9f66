//! 测速结果排序、筛选和导出

mod geo;

pub use geo::{DEFAULT_GEO_API, GeoLocator, IpLocation, country_flag, country_name};

use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::proxy::ProxyConfig;
use crate::registry::unique_name;
use crate::speedtest::TestResult;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("序列化结果失败: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("写入文件 {path} 失败: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("地理位置查询失败: {0}")]
    Geo(#[from] reqwest::Error),
}

/// 导出筛选条件
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub max_latency: Duration,
    /// 字节/秒
    pub min_download_speed: f64,
    /// 字节/秒
    pub min_upload_speed: f64,
    pub download_size: u64,
    pub upload_size: u64,
    pub fast_mode: bool,
    pub rename: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            max_latency: Duration::from_millis(800),
            min_download_speed: 5.0 * 1024.0 * 1024.0,
            min_upload_speed: 2.0 * 1024.0 * 1024.0,
            download_size: 50 * 1024 * 1024,
            upload_size: 20 * 1024 * 1024,
            fast_mode: false,
            rename: false,
        }
    }
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    proxies: &'a [ProxyConfig],
}

/// 按下载速度从高到低排序
pub fn rank_results(results: &mut [TestResult]) {
    results.sort_by(|a, b| b.download_speed.total_cmp(&a.download_speed));
}

/// 结果是否满足导出条件
pub fn passes_thresholds(result: &TestResult, options: &ExportOptions) -> bool {
    if result.latency.is_zero() {
        return false;
    }
    if !options.max_latency.is_zero() && result.latency > options.max_latency {
        return false;
    }
    if options.fast_mode {
        return true;
    }
    if options.download_size > 0
        && options.min_download_speed > 0.0
        && result.download_speed < options.min_download_speed
    {
        return false;
    }
    if options.upload_size > 0
        && options.min_upload_speed > 0.0
        && result.upload_speed < options.min_upload_speed
    {
        return false;
    }
    true
}

/// 根据地理位置和测速结果生成节点名称
pub fn node_name(country_code: &str, result: &TestResult, fast_mode: bool) -> String {
    let code = country_code.to_ascii_uppercase();
    let flag = country_flag(&code);
    if fast_mode {
        format!(
            "{}|{}|{}|{}ms|{}",
            country_name(&code),
            code,
            flag,
            result.latency.as_millis(),
            Uuid::new_v4()
        )
    } else {
        format!(
            "{} {} | ⬇️ {:.2} MB/s",
            flag,
            code,
            result.download_speed / (1024.0 * 1024.0)
        )
    }
}

/// 挑出达标节点的配置，按需重命名；结果内名称唯一
pub async fn select_proxies(
    results: &[TestResult],
    options: &ExportOptions,
    geo: Option<&GeoLocator>,
) -> Vec<ProxyConfig> {
    let mut selected = Vec::new();
    let mut taken: HashSet<String> = HashSet::new();

    for result in results.iter().filter(|r| passes_thresholds(r, options)) {
        let mut config = result.proxy_config.clone();

        if options.rename {
            if let Some(geo) = geo {
                if let Some(name) = renamed(geo, &config, result, options.fast_mode).await {
                    config.set_name(name);
                }
            }
        }

        let name = unique_name(config.name(), |n| taken.contains(n));
        if name != config.name() {
            config.set_name(name.clone());
        }
        taken.insert(name);
        selected.push(config);
    }

    selected
}

async fn renamed(
    geo: &GeoLocator,
    config: &ProxyConfig,
    result: &TestResult,
    fast_mode: bool,
) -> Option<String> {
    let server = config.server()?;
    match geo.lookup(server).await {
        Ok(location) if !location.country_code.is_empty() => {
            Some(node_name(&location.country_code, result, fast_mode))
        }
        Ok(_) => {
            debug!("未查到 {} 的国家代码，保留原名", server);
            None
        }
        Err(e) => {
            debug!("查询 {} 地理位置失败: {}", server, e);
            None
        }
    }
}

/// 序列化为 `proxies:` 列表形式的配置
pub fn to_yaml(proxies: &[ProxyConfig]) -> Result<String, OutputError> {
    Ok(serde_yaml::to_string(&ExportDocument { proxies })?)
}

/// 导出达标节点到文件，返回写入的节点数；没有达标节点时不写文件
pub async fn save_results(
    results: &[TestResult],
    options: &ExportOptions,
    geo: Option<&GeoLocator>,
    path: &Path,
) -> Result<usize, OutputError> {
    let proxies = select_proxies(results, options, geo).await;
    if proxies.is_empty() {
        warn!("没有达标的节点，不生成输出文件");
        return Ok(0);
    }

    let yaml = to_yaml(&proxies)?;
    tokio::fs::write(path, yaml)
        .await
        .map_err(|source| OutputError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    info!("已导出 {} 个节点到 {}", proxies.len(), path.display());
    Ok(proxies.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RawDocument;
    use serde_yaml::Value;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MB: f64 = 1024.0 * 1024.0;

    fn result(name: &str, server: &str, latency_ms: u64, download: f64, upload: f64) -> TestResult {
        let config: ProxyConfig = serde_yaml::from_str(&format!(
            "name: {name}\ntype: ss\nserver: {server}\nport: 8388\ncipher: aes-128-gcm\npassword: pw\n"
        ))
        .unwrap();
        TestResult {
            proxy_name: name.to_string(),
            proxy_type: config.proxy_type(),
            proxy_config: config,
            latency: Duration::from_millis(latency_ms),
            jitter: Duration::ZERO,
            packet_loss: 0.0,
            download_size: 0,
            download_time: Duration::ZERO,
            download_speed: download,
            upload_size: 0,
            upload_time: Duration::ZERO,
            upload_speed: upload,
        }
    }

    #[test]
    fn test_rank_by_download() {
        let mut results = vec![
            result("slow", "a", 100, 1.0 * MB, 0.0),
            result("fast", "b", 100, 9.0 * MB, 0.0),
            result("dead", "c", 0, 0.0, 0.0),
        ];
        rank_results(&mut results);
        let names: Vec<_> = results.iter().map(|r| r.proxy_name.as_str()).collect();
        assert_eq!(names, vec!["fast", "slow", "dead"]);
    }

    #[test]
    fn test_thresholds() {
        let options = ExportOptions::default();
        assert!(passes_thresholds(&result("ok", "a", 200, 6.0 * MB, 3.0 * MB), &options));
        assert!(!passes_thresholds(&result("dead", "a", 0, 6.0 * MB, 3.0 * MB), &options));
        assert!(!passes_thresholds(&result("laggy", "a", 900, 6.0 * MB, 3.0 * MB), &options));
        assert!(!passes_thresholds(&result("slow-down", "a", 200, 4.0 * MB, 3.0 * MB), &options));
        assert!(!passes_thresholds(&result("slow-up", "a", 200, 6.0 * MB, 1.0 * MB), &options));

        let fast = ExportOptions {
            fast_mode: true,
            ..Default::default()
        };
        assert!(passes_thresholds(&result("latency-only", "a", 200, 0.0, 0.0), &fast));

        let no_upload = ExportOptions {
            upload_size: 0,
            ..Default::default()
        };
        assert!(passes_thresholds(&result("no-up", "a", 200, 6.0 * MB, 0.0), &no_upload));
    }

    #[test]
    fn test_node_name() {
        let r = result("x", "a", 123, 12.5 * MB, 0.0);
        assert_eq!(node_name("hk", &r, false), "🇭🇰 HK | ⬇️ 12.50 MB/s");

        let fast = node_name("hk", &r, true);
        assert!(fast.starts_with("香港|HK|🇭🇰|123ms|"), "{}", fast);
        let id = fast.rsplit('|').next().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(fast.split('|').count(), 5);

        let unknown = node_name("ZZ", &r, true);
        assert!(unknown.starts_with("未知|ZZ|"), "{}", unknown);
    }

    #[tokio::test]
    async fn test_export_round_trips_through_loader() {
        let results = vec![
            result("HK", "1.1.1.1", 100, 8.0 * MB, 3.0 * MB),
            result("dead", "2.2.2.2", 0, 0.0, 0.0),
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");

        let written = save_results(&results, &ExportOptions::default(), None, &path)
            .await
            .unwrap();
        assert_eq!(written, 1);

        let bytes = std::fs::read(&path).unwrap();
        let document = RawDocument::parse(&bytes).unwrap();
        assert_eq!(document.proxies().len(), 1);
        let config = ProxyConfig::from_value(document.proxies()[0].clone()).unwrap();
        assert_eq!(config, results[0].proxy_config);
        assert_eq!(config.extra().get("password").and_then(Value::as_str), Some("pw"));
    }

    #[tokio::test]
    async fn test_nothing_written_without_survivors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");
        let results = vec![result("dead", "a", 0, 0.0, 0.0)];

        let written = save_results(&results, &ExportOptions::default(), None, &path)
            .await
            .unwrap();
        assert_eq!(written, 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_rename_with_geo_and_dedupe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex("^/json/(1\\.1\\.1\\.1|3\\.3\\.3\\.3)$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(
                    serde_json::json!({"country": "Hong Kong", "countryCode": "HK"}),
                ),
            )
            .mount(&server)
            .await;
        let base_url = format!("{}/json", server.uri());
        let geo = GeoLocator::with_base_url(&base_url, Duration::from_secs(5)).unwrap();

        let results = vec![
            result("a", "1.1.1.1", 100, 6.0 * MB, 3.0 * MB),
            result("b", "3.3.3.3", 100, 6.0 * MB, 3.0 * MB),
            result("unknown", "9.9.9.9", 100, 6.0 * MB, 3.0 * MB),
        ];
        let options = ExportOptions {
            rename: true,
            ..Default::default()
        };

        let proxies = select_proxies(&results, &options, Some(&geo)).await;
        let names: Vec<_> = proxies.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "🇭🇰 HK | ⬇️ 6.00 MB/s",
                "🇭🇰 HK | ⬇️ 6.00 MB/s-重名1",
                "unknown"
            ]
        );
    }
}
