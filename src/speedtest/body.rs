//! 上传测试使用的全零请求体

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

const BLOCK_SIZE: usize = 32 * 1024;

static ZERO_BLOCK: [u8; BLOCK_SIZE] = [0; BLOCK_SIZE];

/// 按块产出指定长度的零字节，并记录已交给连接写出的字节数
#[derive(Debug)]
pub struct ZeroBody {
    remaining: u64,
    written: Arc<AtomicU64>,
}

impl ZeroBody {
    pub fn new(size: u64) -> Self {
        Self {
            remaining: size,
            written: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 已写出字节数的计数器，请求体被消费后依然可读
    pub fn counter(&self) -> Arc<AtomicU64> {
        self.written.clone()
    }
}

impl Body for ZeroBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if self.remaining == 0 {
            return Poll::Ready(None);
        }

        let len = self.remaining.min(BLOCK_SIZE as u64) as usize;
        self.remaining -= len as u64;
        self.written.fetch_add(len as u64, Ordering::Relaxed);
        Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(&ZERO_BLOCK[..len])))))
    }

    fn is_end_stream(&self) -> bool {
        self.remaining == 0
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining)
    }
}
