//! proxy-providers 定义

use regex::Regex;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;
use thiserror::Error;

use super::source::SourceLocator;

/// 保留的 provider 名称，不参与加载
pub const RESERVED_PROVIDER_NAME: &str = "default";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider 定义无效: {0}")]
    Invalid(#[from] serde_yaml::Error),
    #[error("不支持的 provider 类型: {0}")]
    UnsupportedType(String),
    #[error("http 类型的 provider 缺少 url")]
    MissingUrl,
    #[error("file 类型的 provider 缺少 path")]
    MissingPath,
    #[error("provider 过滤正则无效: {0}")]
    InvalidFilter(#[from] regex::Error),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawProvider {
    #[serde(rename = "type", default = "default_provider_type")]
    kind: String,
    url: Option<String>,
    path: Option<String>,
    filter: Option<String>,
    exclude_filter: Option<String>,
}

fn default_provider_type() -> String {
    "http".to_string()
}

/// 一个已解析的 provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub location: SourceLocator,
    filter: Option<Regex>,
    exclude_filter: Option<Regex>,
}

impl ProviderConfig {
    pub fn parse(name: &str, definition: &Mapping) -> Result<Self, ProviderError> {
        let raw: RawProvider = serde_yaml::from_value(Value::Mapping(definition.clone()))?;

        let location = match raw.kind.as_str() {
            "http" => SourceLocator::Url(non_empty(raw.url).ok_or(ProviderError::MissingUrl)?),
            "file" => SourceLocator::File(PathBuf::from(
                non_empty(raw.path).ok_or(ProviderError::MissingPath)?,
            )),
            other => return Err(ProviderError::UnsupportedType(other.to_string())),
        };

        Ok(Self {
            name: name.to_string(),
            location,
            filter: non_empty(raw.filter).map(|f| Regex::new(&f)).transpose()?,
            exclude_filter: non_empty(raw.exclude_filter)
                .map(|f| Regex::new(&f))
                .transpose()?,
        })
    }

    /// 按 provider 自身的 filter / exclude-filter 判断是否保留节点
    pub fn accepts(&self, proxy_name: &str) -> bool {
        if let Some(filter) = &self.filter {
            if !filter.is_match(proxy_name) {
                return false;
            }
        }
        match &self.exclude_filter {
            Some(exclude) => !exclude.is_match(proxy_name),
            None => true,
        }
    }

    /// 节点在注册表中的候选名称
    pub fn qualified_name(&self, proxy_name: &str) -> String {
        format!("[{}] {}", self.name, proxy_name)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
