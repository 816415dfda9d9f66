//! hyper 连接器：把 HTTP 客户端的建连请求交给节点的拨号能力

use hyper::Uri;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_service::Service;

use super::{BoxedStream, Dialer};

#[derive(Clone)]
pub struct DialConnector {
    dialer: Arc<dyn Dialer>,
}

impl DialConnector {
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self { dialer }
    }
}

impl Service<Uri> for DialConnector {
    type Response = DialedStream;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = io::Result<DialedStream>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let dialer = self.dialer.clone();
        Box::pin(async move {
            let (host, port) = target_of(&uri)?;
            let stream = dialer.dial(&host, port).await?;
            Ok(DialedStream {
                inner: TokioIo::new(stream),
            })
        })
    }
}

/// 从请求地址取出目标主机和端口，IPv6 字面量去掉方括号
fn target_of(uri: &Uri) -> io::Result<(String, u16)> {
    let host = uri
        .host()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("地址缺少主机: {uri}")))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
        Some("https") => 443,
        _ => 80,
    });
    Ok((host, port))
}

/// 经由代理建立的连接
pub struct DialedStream {
    inner: TokioIo<BoxedStream>,
}

impl Connection for DialedStream {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

impl Read for DialedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Read::poll_read(Pin::new(&mut self.inner), cx, buf)
    }
}

impl Write for DialedStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Write::poll_write(Pin::new(&mut self.inner), cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Write::poll_flush(Pin::new(&mut self.inner), cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Write::poll_shutdown(Pin::new(&mut self.inner), cx)
    }

    fn is_write_vectored(&self) -> bool {
        Write::is_write_vectored(&self.inner)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Write::poll_write_vectored(Pin::new(&mut self.inner), cx, bufs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_of_defaults_port_by_scheme() {
        let uri: Uri = "https://speed.cloudflare.com/__down?bytes=0".parse().unwrap();
        assert_eq!(target_of(&uri).unwrap(), ("speed.cloudflare.com".to_string(), 443));

        let uri: Uri = "http://127.0.0.1/__up".parse().unwrap();
        assert_eq!(target_of(&uri).unwrap(), ("127.0.0.1".to_string(), 80));
    }

    #[test]
    fn test_target_of_ipv6_literal() {
        let uri: Uri = "http://[::1]:8080/".parse().unwrap();
        assert_eq!(target_of(&uri).unwrap(), ("::1".to_string(), 8080));
    }
}
