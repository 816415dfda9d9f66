//! 代理节点配置模块
//! 把订阅中的原始参数表解析为按协议区分的强类型配置

mod compat;
mod types;

pub use compat::is_stash_compatible;
pub use types::{
    CommonOptions, GenericOptions, ProxyType, ShadowsocksOptions, ShadowsocksROptions,
    SnellObfsOptions, SnellOptions, TrojanOptions, VlessOptions, VmessOptions,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use std::net::IpAddr;
use thiserror::Error;

/// 单个代理条目解析失败的原因
#[derive(Debug, Error)]
pub enum ProxyConfigError {
    #[error("代理条目不是参数表")]
    NotAMapping,
    #[error("缺少 type 字段")]
    MissingType,
    #[error("不支持的代理类型: {0}")]
    UnsupportedType(String),
    #[error("代理参数无效: {0}")]
    Invalid(#[from] serde_yaml::Error),
}

/// 代理节点配置，每种协议对应一个变体
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyConfig {
    Shadowsocks(ShadowsocksOptions),
    ShadowsocksR(ShadowsocksROptions),
    Snell(SnellOptions),
    Socks5(GenericOptions),
    Http(GenericOptions),
    Vmess(VmessOptions),
    Vless(VlessOptions),
    Trojan(TrojanOptions),
    Hysteria(GenericOptions),
    Hysteria2(GenericOptions),
    WireGuard(GenericOptions),
    Tuic(GenericOptions),
    Ssh(GenericOptions),
    Mieru(GenericOptions),
    AnyTls(GenericOptions),
}

macro_rules! each_variant {
    ($value:expr, $opts:ident => $body:expr) => {
        match $value {
            ProxyConfig::Shadowsocks($opts) => $body,
            ProxyConfig::ShadowsocksR($opts) => $body,
            ProxyConfig::Snell($opts) => $body,
            ProxyConfig::Socks5($opts) => $body,
            ProxyConfig::Http($opts) => $body,
            ProxyConfig::Vmess($opts) => $body,
            ProxyConfig::Vless($opts) => $body,
            ProxyConfig::Trojan($opts) => $body,
            ProxyConfig::Hysteria($opts) => $body,
            ProxyConfig::Hysteria2($opts) => $body,
            ProxyConfig::WireGuard($opts) => $body,
            ProxyConfig::Tuic($opts) => $body,
            ProxyConfig::Ssh($opts) => $body,
            ProxyConfig::Mieru($opts) => $body,
            ProxyConfig::AnyTls($opts) => $body,
        }
    };
}

impl ProxyConfig {
    /// 从订阅 `proxies` 列表中的任意一项解析
    pub fn from_value(value: Value) -> Result<Self, ProxyConfigError> {
        match value {
            Value::Mapping(map) => Self::from_mapping(map),
            _ => Err(ProxyConfigError::NotAMapping),
        }
    }

    /// 从订阅中的一条代理参数表解析
    pub fn from_mapping(mut map: Mapping) -> Result<Self, ProxyConfigError> {
        let kind: ProxyType = map
            .remove("type")
            .as_ref()
            .and_then(Value::as_str)
            .ok_or(ProxyConfigError::MissingType)?
            .parse()?;
        let value = Value::Mapping(map);

        let config = match kind {
            ProxyType::Shadowsocks => ProxyConfig::Shadowsocks(serde_yaml::from_value(value)?),
            ProxyType::ShadowsocksR => ProxyConfig::ShadowsocksR(serde_yaml::from_value(value)?),
            ProxyType::Snell => ProxyConfig::Snell(serde_yaml::from_value(value)?),
            ProxyType::Socks5 => ProxyConfig::Socks5(serde_yaml::from_value(value)?),
            ProxyType::Http => ProxyConfig::Http(serde_yaml::from_value(value)?),
            ProxyType::Vmess => ProxyConfig::Vmess(serde_yaml::from_value(value)?),
            ProxyType::Vless => ProxyConfig::Vless(serde_yaml::from_value(value)?),
            ProxyType::Trojan => ProxyConfig::Trojan(serde_yaml::from_value(value)?),
            ProxyType::Hysteria => ProxyConfig::Hysteria(serde_yaml::from_value(value)?),
            ProxyType::Hysteria2 => ProxyConfig::Hysteria2(serde_yaml::from_value(value)?),
            ProxyType::WireGuard => ProxyConfig::WireGuard(serde_yaml::from_value(value)?),
            ProxyType::Tuic => ProxyConfig::Tuic(serde_yaml::from_value(value)?),
            ProxyType::Ssh => ProxyConfig::Ssh(serde_yaml::from_value(value)?),
            ProxyType::Mieru => ProxyConfig::Mieru(serde_yaml::from_value(value)?),
            ProxyType::AnyTls => ProxyConfig::AnyTls(serde_yaml::from_value(value)?),
        };

        Ok(config)
    }

    /// 还原成订阅格式的参数表（`name`、`type` 在最前）
    pub fn to_mapping(&self) -> Result<Mapping, serde_yaml::Error> {
        let fields = each_variant!(self, opts => serde_yaml::to_value(opts))?;

        let mut map = Mapping::new();
        map.insert(Value::from("name"), Value::from(self.name()));
        map.insert(Value::from("type"), Value::from(self.proxy_type().as_str()));
        if let Value::Mapping(fields) = fields {
            for (key, value) in fields {
                if key.as_str() != Some("name") {
                    map.insert(key, value);
                }
            }
        }
        Ok(map)
    }

    pub fn proxy_type(&self) -> ProxyType {
        match self {
            ProxyConfig::Shadowsocks(_) => ProxyType::Shadowsocks,
            ProxyConfig::ShadowsocksR(_) => ProxyType::ShadowsocksR,
            ProxyConfig::Snell(_) => ProxyType::Snell,
            ProxyConfig::Socks5(_) => ProxyType::Socks5,
            ProxyConfig::Http(_) => ProxyType::Http,
            ProxyConfig::Vmess(_) => ProxyType::Vmess,
            ProxyConfig::Vless(_) => ProxyType::Vless,
            ProxyConfig::Trojan(_) => ProxyType::Trojan,
            ProxyConfig::Hysteria(_) => ProxyType::Hysteria,
            ProxyConfig::Hysteria2(_) => ProxyType::Hysteria2,
            ProxyConfig::WireGuard(_) => ProxyType::WireGuard,
            ProxyConfig::Tuic(_) => ProxyType::Tuic,
            ProxyConfig::Ssh(_) => ProxyType::Ssh,
            ProxyConfig::Mieru(_) => ProxyType::Mieru,
            ProxyConfig::AnyTls(_) => ProxyType::AnyTls,
        }
    }

    fn common(&self) -> &CommonOptions {
        each_variant!(self, opts => &opts.common)
    }

    fn common_mut(&mut self) -> &mut CommonOptions {
        each_variant!(self, opts => &mut opts.common)
    }

    /// 配置中的节点名称，装配注册表后与注册表中的名称一致
    pub fn name(&self) -> &str {
        &self.common().name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.common_mut().name = name.into();
    }

    pub fn server(&self) -> Option<&str> {
        self.common().server.as_deref()
    }

    /// 未被解释的其余参数
    pub fn extra(&self) -> &Mapping {
        each_variant!(self, opts => &opts.extra)
    }

    /// 把服务器地址中的 IPv4 映射 IPv6 地址改写为 IPv4
    pub fn normalize_server(&mut self) {
        if let Some(server) = self.common_mut().server.as_mut() {
            *server = normalize_server_address(server);
        }
    }
}

impl Serialize for ProxyConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_mapping()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ProxyConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Mapping::deserialize(deserializer)?;
        ProxyConfig::from_mapping(map).map_err(serde::de::Error::custom)
    }
}

/// `::ffff:a.b.c.d` 形式的地址转换为 `a.b.c.d`，其他输入原样返回
pub fn normalize_server_address(server: &str) -> String {
    match server.parse::<IpAddr>() {
        Ok(IpAddr::V6(ip)) => match ip.to_ipv4_mapped() {
            Some(ipv4) => ipv4.to_string(),
            None => server.to_string(),
        },
        _ => server.to_string(),
    }
}
