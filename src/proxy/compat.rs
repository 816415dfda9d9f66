//! Stash 客户端兼容性检查
//! 部分协议的参数取值超出 Stash 支持范围时，该节点不可用

use lazy_static::lazy_static;
use std::collections::HashSet;

use super::ProxyConfig;

lazy_static! {
    static ref SS_CIPHERS: HashSet<&'static str> = [
        "aes-128-gcm",
        "aes-192-gcm",
        "aes-256-gcm",
        "aes-128-cfb",
        "aes-192-cfb",
        "aes-256-cfb",
        "aes-128-ctr",
        "aes-192-ctr",
        "aes-256-ctr",
        "rc4-md5",
        "chacha20",
        "chacha20-ietf",
        "xchacha20",
        "chacha20-ietf-poly1305",
        "xchacha20-ietf-poly1305",
        "2022-blake3-aes-128-gcm",
        "2022-blake3-aes-256-gcm",
    ]
    .into_iter()
    .collect();
    static ref SSR_OBFS: HashSet<&'static str> = [
        "plain",
        "http_simple",
        "http_post",
        "random_head",
        "tls1.2_ticket_auth",
        "tls1.2_ticket_fastauth",
    ]
    .into_iter()
    .collect();
    static ref SSR_PROTOCOLS: HashSet<&'static str> = [
        "origin",
        "auth_sha1_v4",
        "auth_aes128_md5",
        "auth_aes128_sha1",
        "auth_chain_a",
        "auth_chain_b",
    ]
    .into_iter()
    .collect();
    static ref SNELL_OBFS_MODES: HashSet<&'static str> = ["http", "tls"].into_iter().collect();
    static ref VMESS_CIPHERS: HashSet<&'static str> =
        ["auto", "aes-128-gcm", "chacha20-poly1305", "none"]
            .into_iter()
            .collect();
    static ref VMESS_NETWORKS: HashSet<&'static str> =
        ["ws", "h2", "http", "grpc"].into_iter().collect();
    static ref VLESS_FLOWS: HashSet<&'static str> = [
        "xtls-rprx-origin",
        "xtls-rprx-direct",
        "xtls-rprx-splice",
        "xtls-rprx-vision",
    ]
    .into_iter()
    .collect();
    static ref TROJAN_NETWORKS: HashSet<&'static str> = ["ws", "grpc"].into_iter().collect();
}

/// 参数缺省时视为兼容
fn allowed(value: &Option<String>, list: &HashSet<&'static str>) -> bool {
    value.as_deref().is_none_or(|v| list.contains(v))
}

/// 判断节点能否在 Stash 中使用
pub fn is_stash_compatible(config: &ProxyConfig) -> bool {
    match config {
        ProxyConfig::Shadowsocks(opts) => allowed(&opts.cipher, &SS_CIPHERS),
        ProxyConfig::ShadowsocksR(opts) => {
            allowed(&opts.obfs, &SSR_OBFS) && allowed(&opts.protocol, &SSR_PROTOCOLS)
        }
        ProxyConfig::Snell(opts) => opts
            .obfs_opts
            .as_ref()
            .is_none_or(|obfs| allowed(&obfs.mode, &SNELL_OBFS_MODES)),
        ProxyConfig::Vmess(opts) => {
            allowed(&opts.cipher, &VMESS_CIPHERS) && allowed(&opts.network, &VMESS_NETWORKS)
        }
        ProxyConfig::Vless(opts) => allowed(&opts.flow, &VLESS_FLOWS),
        ProxyConfig::Trojan(opts) => allowed(&opts.network, &TROJAN_NETWORKS),
        ProxyConfig::Socks5(_)
        | ProxyConfig::Http(_)
        | ProxyConfig::Hysteria(_)
        | ProxyConfig::Hysteria2(_)
        | ProxyConfig::WireGuard(_)
        | ProxyConfig::Tuic(_)
        | ProxyConfig::Ssh(_) => true,
        ProxyConfig::Mieru(_) | ProxyConfig::AnyTls(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> ProxyConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_shadowsocks_cipher() {
        let ok = parse("name: a\ntype: ss\nserver: s\ncipher: aes-256-gcm\npassword: p\n");
        assert!(is_stash_compatible(&ok));

        let bad = parse("name: a\ntype: ss\nserver: s\ncipher: unknown-cipher\npassword: p\n");
        assert!(!is_stash_compatible(&bad));

        let missing = parse("name: a\ntype: ss\nserver: s\n");
        assert!(is_stash_compatible(&missing));
    }

    #[test]
    fn test_ssr_obfs_and_protocol() {
        let ok = parse("name: a\ntype: ssr\nobfs: plain\nprotocol: origin\n");
        assert!(is_stash_compatible(&ok));

        let bad_protocol = parse("name: a\ntype: ssr\nobfs: plain\nprotocol: auth_chain_z\n");
        assert!(!is_stash_compatible(&bad_protocol));

        let bad_obfs = parse("name: a\ntype: ssr\nobfs: weird\n");
        assert!(!is_stash_compatible(&bad_obfs));
    }

    #[test]
    fn test_snell_obfs_mode() {
        let ok = parse("name: a\ntype: snell\nobfs-opts:\n  mode: tls\n  host: bing.com\n");
        assert!(is_stash_compatible(&ok));

        let bad = parse("name: a\ntype: snell\nobfs-opts:\n  mode: quic\n");
        assert!(!is_stash_compatible(&bad));

        let no_mode = parse("name: a\ntype: snell\nobfs-opts:\n  host: bing.com\n");
        assert!(is_stash_compatible(&no_mode));
    }

    #[test]
    fn test_vmess_vless_trojan() {
        assert!(is_stash_compatible(&parse(
            "name: a\ntype: vmess\ncipher: auto\nnetwork: ws\n"
        )));
        assert!(!is_stash_compatible(&parse(
            "name: a\ntype: vmess\ncipher: auto\nnetwork: kcp\n"
        )));
        assert!(is_stash_compatible(&parse(
            "name: a\ntype: vless\nflow: xtls-rprx-vision\n"
        )));
        assert!(!is_stash_compatible(&parse("name: a\ntype: vless\nflow: other\n")));
        assert!(is_stash_compatible(&parse("name: a\ntype: trojan\nnetwork: grpc\n")));
        assert!(!is_stash_compatible(&parse("name: a\ntype: trojan\nnetwork: h2\n")));
    }

    #[test]
    fn test_protocols_without_parameters() {
        assert!(is_stash_compatible(&parse("name: a\ntype: hysteria2\n")));
        assert!(is_stash_compatible(&parse("name: a\ntype: wireguard\n")));
        assert!(!is_stash_compatible(&parse("name: a\ntype: mieru\n")));
        assert!(!is_stash_compatible(&parse("name: a\ntype: anytls\n")));
    }
}
