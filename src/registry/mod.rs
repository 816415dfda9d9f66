//! 节点注册表
//! 从多个配置来源加载节点，处理重名、协议兼容性和名称过滤

mod filter;
mod naming;
mod provider;
mod source;

pub use filter::{FilterDecision, NameFilter};
pub use naming::{DUPLICATE_MARKER, unique_name};
pub use provider::{ProviderConfig, ProviderError, RESERVED_PROVIDER_NAME};
pub use source::{RawDocument, SourceError, SourceLocator, SourceReader};

use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::dialer::{Dialer, ProxyAdapter};
use crate::proxy::{ProxyConfig, ProxyType, is_stash_compatible};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("没有加载到任何可用节点")]
    NoProxiesLoaded,
    #[error("过滤正则无效: {0}")]
    InvalidFilter(#[source] regex::Error),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// 注册表中的一个节点
#[derive(Clone)]
pub struct ProxyDefinition {
    name: String,
    config: ProxyConfig,
    dialer: Arc<dyn Dialer>,
}

impl ProxyDefinition {
    pub fn new(name: String, config: ProxyConfig, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            name,
            config,
            dialer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn proxy_type(&self) -> ProxyType {
        self.config.proxy_type()
    }

    pub fn dialer(&self) -> Arc<dyn Dialer> {
        Arc::clone(&self.dialer)
    }
}

impl fmt::Debug for ProxyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyDefinition")
            .field("name", &self.name)
            .field("type", &self.proxy_type())
            .field("server", &self.config.server())
            .finish_non_exhaustive()
    }
}

/// 名称唯一的节点集合，按名称排序
#[derive(Debug, Default)]
pub struct ProxyRegistry {
    proxies: BTreeMap<String, ProxyDefinition>,
    blocked: Vec<String>,
}

impl ProxyRegistry {
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ProxyDefinition> {
        self.proxies.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProxyDefinition> {
        self.proxies.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.proxies.keys().map(String::as_str)
    }

    /// 因命中黑名单关键词被排除的节点名称
    pub fn blocked_nodes(&self) -> &[String] {
        &self.blocked
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }
}

/// 加载参数
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub sources: Vec<SourceLocator>,
    /// 名称白名单正则
    pub filter: String,
    /// 名称黑名单关键词，不区分大小写
    pub block_keywords: Vec<String>,
    pub stash_compatible: bool,
    pub fetch_timeout: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            filter: ".+".to_string(),
            block_keywords: Vec::new(),
            stash_compatible: false,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

pub struct RegistryBuilder {
    options: RegistryOptions,
    adapter: Arc<dyn ProxyAdapter>,
}

impl RegistryBuilder {
    pub fn new(options: RegistryOptions, adapter: Arc<dyn ProxyAdapter>) -> Self {
        Self { options, adapter }
    }

    /// 依次读取所有来源并构建注册表
    ///
    /// 单个来源、provider 或节点的失败只会被记录并跳过；
    /// 只有最终一个节点都没有时才返回 [`RegistryError::NoProxiesLoaded`]。
    pub async fn load(&self) -> Result<ProxyRegistry, RegistryError> {
        let filter = NameFilter::new(&self.options.filter, &self.options.block_keywords)
            .map_err(RegistryError::InvalidFilter)?;
        let reader = SourceReader::new(self.options.fetch_timeout)?;

        let mut merged: BTreeMap<String, ProxyDefinition> = BTreeMap::new();
        for locator in &self.options.sources {
            let document = match reader.read_document(locator).await {
                Ok(document) => document,
                Err(e) => {
                    warn!("读取配置 {} 失败: {}", locator, e);
                    continue;
                }
            };

            let entries = self.collect_source(&reader, &document, locator).await;
            self.merge_source(&mut merged, entries);
        }
        info!("共加载 {} 个节点", merged.len());

        let mut registry = ProxyRegistry::default();
        for (name, proxy) in merged {
            match filter.check(&name) {
                FilterDecision::Include => {
                    registry.proxies.insert(name, proxy);
                }
                FilterDecision::Blocked => {
                    debug!("节点 {} 命中黑名单", name);
                    registry.blocked.push(name);
                }
                FilterDecision::NotMatched => {
                    debug!("节点 {} 不匹配过滤规则", name);
                }
            }
        }
        info!(
            "过滤后剩余 {} 个节点 (黑名单排除 {} 个)",
            registry.len(),
            registry.blocked_count()
        );

        if registry.is_empty() {
            return Err(RegistryError::NoProxiesLoaded);
        }
        Ok(registry)
    }

    /// 解析单个来源中直接定义和 provider 提供的节点，来源内名称唯一
    async fn collect_source(
        &self,
        reader: &SourceReader,
        document: &RawDocument,
        locator: &SourceLocator,
    ) -> Vec<(String, ProxyConfig)> {
        let mut entries = Vec::new();
        let mut taken = HashSet::new();

        for (index, value) in document.proxies().iter().enumerate() {
            match ProxyConfig::from_value(value.clone()) {
                Ok(config) => {
                    let name = config.name().to_string();
                    push_unique(&mut entries, &mut taken, name, config);
                }
                Err(e) => debug!("跳过 {} 中第 {} 个节点: {}", locator, index, e),
            }
        }

        for (name, definition) in document.providers() {
            if name == RESERVED_PROVIDER_NAME {
                warn!("跳过保留的 provider 名称: {}", RESERVED_PROVIDER_NAME);
                continue;
            }

            let provider = match ProviderConfig::parse(name, definition) {
                Ok(provider) => provider,
                Err(e) => {
                    warn!("解析 provider {} 失败: {}", name, e);
                    continue;
                }
            };

            let provider_document = match reader.read_document(&provider.location).await {
                Ok(document) => document,
                Err(e) => {
                    warn!("获取 provider {} ({}) 失败: {}", name, provider.location, e);
                    continue;
                }
            };

            for value in provider_document.proxies() {
                let config = match ProxyConfig::from_value(value.clone()) {
                    Ok(config) => config,
                    Err(e) => {
                        debug!("跳过 provider {} 中的节点: {}", name, e);
                        continue;
                    }
                };
                if !provider.accepts(config.name()) {
                    debug!("节点 {} 被 provider {} 的过滤规则排除", config.name(), name);
                    continue;
                }
                let candidate = provider.qualified_name(config.name());
                push_unique(&mut entries, &mut taken, candidate, config);
            }
        }

        entries
    }

    /// 把一个来源的节点合并进全局集合
    fn merge_source(
        &self,
        merged: &mut BTreeMap<String, ProxyDefinition>,
        entries: Vec<(String, ProxyConfig)>,
    ) {
        for (name, mut config) in entries {
            config.normalize_server();

            if self.options.stash_compatible && !is_stash_compatible(&config) {
                debug!("跳过不兼容 Stash 的节点: {}", name);
                continue;
            }

            let dialer = match self.adapter.build(&config) {
                Ok(dialer) => dialer,
                Err(e) => {
                    debug!("跳过节点 {}: {}", name, e);
                    continue;
                }
            };

            let final_name = unique_name(&name, |n| merged.contains_key(n));
            if final_name != name {
                debug!("跨配置重名节点: {} -> {}", name, final_name);
            }
            config.set_name(final_name.clone());
            merged.insert(
                final_name.clone(),
                ProxyDefinition::new(final_name, config, dialer),
            );
        }
    }
}

fn push_unique(
    entries: &mut Vec<(String, ProxyConfig)>,
    taken: &mut HashSet<String>,
    candidate: String,
    config: ProxyConfig,
) {
    let name = unique_name(&candidate, |n| taken.contains(n));
    if name != candidate {
        debug!("重名节点: {} -> {}", candidate, name);
    }
    taken.insert(name.clone());
    entries.push((name, config));
}
