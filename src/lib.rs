//! 代理节点测速工具
//!
//! 从一个或多个 Clash 配置中装配节点注册表，逐个测量延迟与上下行速度，
//! 并按速度排序、筛选和导出达标节点。

pub mod config;
pub mod dialer;
pub mod output;
pub mod proxy;
pub mod registry;
pub mod speedtest;
pub mod ui;
