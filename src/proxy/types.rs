//! 代理协议类型与各协议的参数结构体定义

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Mapping;
use std::fmt;
use std::str::FromStr;

use super::ProxyConfigError;

/// 支持测速的代理协议类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyType {
    Shadowsocks,
    ShadowsocksR,
    Snell,
    Socks5,
    Http,
    Vmess,
    Vless,
    Trojan,
    Hysteria,
    Hysteria2,
    WireGuard,
    Tuic,
    Ssh,
    Mieru,
    AnyTls,
}

impl ProxyType {
    pub const ALL: [ProxyType; 15] = [
        ProxyType::Shadowsocks,
        ProxyType::ShadowsocksR,
        ProxyType::Snell,
        ProxyType::Socks5,
        ProxyType::Http,
        ProxyType::Vmess,
        ProxyType::Vless,
        ProxyType::Trojan,
        ProxyType::Hysteria,
        ProxyType::Hysteria2,
        ProxyType::WireGuard,
        ProxyType::Tuic,
        ProxyType::Ssh,
        ProxyType::Mieru,
        ProxyType::AnyTls,
    ];

    /// 配置文件中 `type` 字段的取值
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyType::Shadowsocks => "ss",
            ProxyType::ShadowsocksR => "ssr",
            ProxyType::Snell => "snell",
            ProxyType::Socks5 => "socks5",
            ProxyType::Http => "http",
            ProxyType::Vmess => "vmess",
            ProxyType::Vless => "vless",
            ProxyType::Trojan => "trojan",
            ProxyType::Hysteria => "hysteria",
            ProxyType::Hysteria2 => "hysteria2",
            ProxyType::WireGuard => "wireguard",
            ProxyType::Tuic => "tuic",
            ProxyType::Ssh => "ssh",
            ProxyType::Mieru => "mieru",
            ProxyType::AnyTls => "anytls",
        }
    }

    /// 结果表格中展示的协议名称
    pub fn display_name(&self) -> &'static str {
        match self {
            ProxyType::Shadowsocks => "Shadowsocks",
            ProxyType::ShadowsocksR => "ShadowsocksR",
            ProxyType::Snell => "Snell",
            ProxyType::Socks5 => "Socks5",
            ProxyType::Http => "Http",
            ProxyType::Vmess => "Vmess",
            ProxyType::Vless => "Vless",
            ProxyType::Trojan => "Trojan",
            ProxyType::Hysteria => "Hysteria",
            ProxyType::Hysteria2 => "Hysteria2",
            ProxyType::WireGuard => "WireGuard",
            ProxyType::Tuic => "Tuic",
            ProxyType::Ssh => "Ssh",
            ProxyType::Mieru => "Mieru",
            ProxyType::AnyTls => "AnyTLS",
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProxyType {
    type Err = ProxyConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProxyType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ProxyConfigError::UnsupportedType(s.to_string()))
    }
}

impl Serialize for ProxyType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.display_name())
    }
}

/// 订阅中的字符串字段可能写成数字或布尔值（如 `name: 2024`），统一按字符串读取
struct ScalarString(String);

impl<'de> Deserialize<'de> for ScalarString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScalarVisitor;

        impl<'de> Visitor<'de> for ScalarVisitor {
            type Value = ScalarString;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, number or boolean")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(ScalarString(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(ScalarString(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(ScalarString(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(ScalarString(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(ScalarString(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(ScalarString(v.to_string()))
            }
        }

        deserializer.deserialize_any(ScalarVisitor)
    }
}

fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    ScalarString::deserialize(deserializer).map(|s| s.0)
}

fn optional_scalar_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<ScalarString>::deserialize(deserializer).map(|s| s.map(|s| s.0))
}

/// 所有协议共有的字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonOptions {
    #[serde(deserialize_with = "scalar_string")]
    pub name: String,
    #[serde(
        default,
        deserialize_with = "optional_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub server: Option<String>,
}

/// 不需要解释额外字段的协议（socks5、http、hysteria 等）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowsocksOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    #[serde(
        default,
        deserialize_with = "optional_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub cipher: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowsocksROptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    #[serde(
        default,
        deserialize_with = "optional_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub obfs: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub protocol: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

/// Snell 的 `obfs-opts` 子结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnellObfsOptions {
    #[serde(
        default,
        deserialize_with = "optional_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub mode: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnellOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    #[serde(
        rename = "obfs-opts",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub obfs_opts: Option<SnellObfsOptions>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmessOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    #[serde(
        default,
        deserialize_with = "optional_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub cipher: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub network: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VlessOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    #[serde(
        default,
        deserialize_with = "optional_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub flow: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrojanOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    #[serde(
        default,
        deserialize_with = "optional_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub network: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}
