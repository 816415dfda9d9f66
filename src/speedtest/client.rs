//! 经由节点拨号能力发起的测速请求

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty};
use hyper::header::CONTENT_TYPE;
use hyper::{Request, StatusCode};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use log::debug;
use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio_native_tls::TlsConnector;

use super::body::ZeroBody;
use super::result::ChunkResult;
use crate::dialer::{DialConnector, Dialer};

pub(crate) type RequestBody = BoxBody<Bytes, io::Error>;
pub(crate) type ProxyClient = Client<HttpsConnector<DialConnector>, RequestBody>;

/// 每个请求都经代理新建连接
pub(crate) fn build_client(dialer: Arc<dyn Dialer>, tls: &TlsConnector) -> ProxyClient {
    let connector = HttpsConnector::from((DialConnector::new(dialer), tls.clone()));
    Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(0)
        .build(connector)
}

fn empty_body() -> RequestBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) fn download_url(server_url: &str, bytes: u64) -> String {
    format!("{}/__down?bytes={}", server_url, bytes)
}

pub(crate) fn upload_url(server_url: &str) -> String {
    format!("{}/__up", server_url)
}

/// 零字节下载，返回从发出请求到收到成功响应头的耗时
pub(crate) async fn probe(
    client: &ProxyClient,
    server_url: &str,
    timeout: Duration,
) -> Option<Duration> {
    let url = download_url(server_url, 0);
    let start = Instant::now();

    let request = Request::get(url.as_str()).body(empty_body()).ok()?;
    let response = match tokio::time::timeout(timeout, client.request(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            debug!("探测请求失败 {}: {}", url, e);
            return None;
        }
        Err(_) => {
            debug!("探测请求超时 {}", url);
            return None;
        }
    };

    if !response.status().is_success() {
        debug!("探测请求状态码异常 {}: {}", url, response.status());
        return None;
    }
    Some(start.elapsed())
}

/// 下载一个分块，丢弃响应体并统计收到的字节数
pub(crate) async fn download_chunk(
    client: ProxyClient,
    server_url: String,
    size: u64,
    timeout: Duration,
) -> Option<ChunkResult> {
    let url = download_url(&server_url, size);
    let start = Instant::now();

    let transfer = async {
        let request = Request::get(url.as_str()).body(empty_body()).ok()?;
        let response = client.request(request).await.ok()?;
        if response.status() != StatusCode::OK {
            debug!("下载分块状态码异常: {}", response.status());
            return None;
        }

        let mut body = response.into_body();
        let mut received = 0u64;
        while let Some(frame) = body.frame().await {
            match frame {
                Ok(frame) => {
                    if let Some(data) = frame.data_ref() {
                        received += data.len() as u64;
                    }
                }
                Err(e) => {
                    debug!("下载分块读取中断: {}", e);
                    break;
                }
            }
        }
        Some(received)
    };

    match tokio::time::timeout(timeout, transfer).await {
        Ok(Some(bytes)) => Some(ChunkResult {
            bytes,
            duration: start.elapsed(),
        }),
        Ok(None) => None,
        Err(_) => {
            debug!("下载分块超时 {}", url);
            None
        }
    }
}

/// 上传一个全零分块，字节数以请求体实际产出的为准
pub(crate) async fn upload_chunk(
    client: ProxyClient,
    server_url: String,
    size: u64,
    timeout: Duration,
) -> Option<ChunkResult> {
    let url = upload_url(&server_url);
    let body = ZeroBody::new(size);
    let written = body.counter();
    let start = Instant::now();

    let transfer = async {
        let request = Request::post(url.as_str())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body.boxed())
            .ok()?;
        let response = client.request(request).await.ok()?;
        if response.status() != StatusCode::OK {
            debug!("上传分块状态码异常: {}", response.status());
            return None;
        }
        Some(())
    };

    match tokio::time::timeout(timeout, transfer).await {
        Ok(Some(())) => Some(ChunkResult {
            bytes: written.load(Ordering::Relaxed),
            duration: start.elapsed(),
        }),
        Ok(None) => None,
        Err(_) => {
            debug!("上传分块超时 {}", url);
            None
        }
    }
}
