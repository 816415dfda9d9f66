//! 配置来源读取：本地文件或 HTTP(S) 订阅地址

use log::debug;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("读取文件 {path} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置失败: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// 配置来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    Url(String),
    File(PathBuf),
}

impl SourceLocator {
    /// 以 `http` 开头的视为远程地址，其余按本地路径处理
    pub fn parse(locator: &str) -> Self {
        let locator = locator.trim();
        if locator.starts_with("http") {
            SourceLocator::Url(locator.to_string())
        } else {
            SourceLocator::File(PathBuf::from(locator))
        }
    }

    /// 解析逗号分隔的多个来源，忽略空项
    pub fn parse_list(locators: &str) -> Vec<Self> {
        locators
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::Url(url) => f.write_str(url),
            SourceLocator::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// 配置文档中与测速相关的两部分
#[derive(Debug, Default, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    proxies: Option<Vec<Value>>,
    #[serde(default, rename = "proxy-providers")]
    providers: Option<BTreeMap<String, Mapping>>,
}

impl RawDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, SourceError> {
        // 空文档按没有任何节点处理
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_slice(bytes)?)
    }

    pub fn proxies(&self) -> &[Value] {
        self.proxies.as_deref().unwrap_or_default()
    }

    /// 按名称排序的 provider 定义
    pub fn providers(&self) -> impl Iterator<Item = (&String, &Mapping)> {
        self.providers.iter().flatten()
    }
}

/// 获取配置内容
#[derive(Debug, Clone)]
pub struct SourceReader {
    client: reqwest::Client,
}

impl SourceReader {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("clash-speedtest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, locator: &SourceLocator) -> Result<Vec<u8>, SourceError> {
        match locator {
            SourceLocator::Url(url) => {
                debug!("下载配置: {}", url);
                let response = self.client.get(url).send().await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
            SourceLocator::File(path) => {
                debug!("读取配置文件: {}", path.display());
                tokio::fs::read(path).await.map_err(|source| SourceError::Io {
                    path: path.clone(),
                    source,
                })
            }
        }
    }

    pub async fn read_document(&self, locator: &SourceLocator) -> Result<RawDocument, SourceError> {
        let bytes = self.fetch(locator).await?;
        RawDocument::parse(&bytes)
    }
}
