use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::output::ExportOptions;
use crate::registry::{NameFilter, RegistryOptions, SourceLocator};
use crate::speedtest::{DEFAULT_SERVER_URL, SpeedTestConfig};

const MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // 配置来源，每项可以是文件路径、订阅地址或逗号分隔的多个来源
    pub sources: Vec<String>,
    pub filter: String,
    // 黑名单关键词，用 | 分隔
    pub block_keywords: String,
    pub stash_compatible: bool,
    pub fetch_timeout: u64,

    // 测速参数
    pub server_url: String,
    pub download_size: u64,
    pub upload_size: u64,
    pub timeout: u64,
    pub concurrent: usize,
    pub parallel: usize,
    pub max_latency: u64,
    pub min_download_speed: f64,
    pub min_upload_speed: f64,
    pub fast_mode: bool,
    pub ping_count: usize,

    // 输出配置
    pub output: Option<String>,
    pub rename: bool,
    pub print_progress: bool,

    // 日志配置
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: vec![],
            filter: ".+".to_string(),
            block_keywords: String::new(),
            stash_compatible: false,
            fetch_timeout: 30000,
            server_url: DEFAULT_SERVER_URL.to_string(),
            download_size: 50 * 1024 * 1024,
            upload_size: 20 * 1024 * 1024,
            timeout: 5000,
            concurrent: 4,
            parallel: 1,
            max_latency: 800,
            min_download_speed: 5.0,
            min_upload_speed: 2.0,
            fast_mode: false,
            ping_count: 1,
            output: None,
            rename: false,
            print_progress: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn source_locators(&self) -> Vec<SourceLocator> {
        self.sources
            .iter()
            .flat_map(|s| SourceLocator::parse_list(s))
            .collect()
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            sources: self.source_locators(),
            filter: self.filter.clone(),
            block_keywords: NameFilter::parse_keywords(&self.block_keywords),
            stash_compatible: self.stash_compatible,
            fetch_timeout: Duration::from_millis(self.fetch_timeout),
        }
    }

    pub fn speed_test_config(&self) -> SpeedTestConfig {
        SpeedTestConfig {
            server_url: self.server_url.clone(),
            download_size: self.download_size,
            upload_size: self.upload_size,
            timeout: self.get_timeout_duration(),
            concurrent: self.concurrent,
            max_latency: Duration::from_millis(self.max_latency),
            min_download_speed: self.min_download_speed * MB,
            fast_mode: self.fast_mode,
            ping_count: self.ping_count,
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            max_latency: Duration::from_millis(self.max_latency),
            min_download_speed: self.min_download_speed * MB,
            min_upload_speed: self.min_upload_speed * MB,
            download_size: self.download_size,
            upload_size: self.upload_size,
            fast_mode: self.fast_mode,
            rename: self.rename,
        }
    }
}
