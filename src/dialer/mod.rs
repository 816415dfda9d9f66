//! 拨号能力抽象
//! 代理协议的实现由外部代理核心提供，这里只定义"经由代理连接 host:port"的接口

mod connector;

pub use connector::{DialConnector, DialedStream};

use async_trait::async_trait;
use log::debug;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::proxy::ProxyConfig;

/// 拨号得到的双向字节流
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

pub type BoxedStream = Box<dyn AsyncStream>;

/// 某个代理节点的拨号能力
#[async_trait]
pub trait Dialer: Send + Sync {
    /// 经由该代理建立到 `host:port` 的连接
    async fn dial(&self, host: &str, port: u16) -> io::Result<BoxedStream>;
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("无法为节点 {name} 创建拨号器: {reason}")]
    Unsupported { name: String, reason: String },
}

/// 代理核心：根据节点配置构造拨号能力
pub trait ProxyAdapter: Send + Sync {
    fn build(&self, config: &ProxyConfig) -> Result<Arc<dyn Dialer>, AdapterError>;
}

/// 直连拨号器，不经过任何代理
#[derive(Debug, Clone, Default)]
pub struct DirectDialer;

#[async_trait]
impl Dialer for DirectDialer {
    async fn dial(&self, host: &str, port: u16) -> io::Result<BoxedStream> {
        debug!("直连 {}:{}", host, port);
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}

/// 为每个节点提供直连拨号器的代理核心
///
/// 测得的是本机到测速服务器的链路，用于基准对比和测试。
#[derive(Debug, Clone, Default)]
pub struct DirectAdapter;

impl ProxyAdapter for DirectAdapter {
    fn build(&self, _config: &ProxyConfig) -> Result<Arc<dyn Dialer>, AdapterError> {
        Ok(Arc::new(DirectDialer))
    }
}
