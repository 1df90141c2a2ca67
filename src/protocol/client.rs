//! One-shot request/response client.
//!
//! Each call opens a fresh TCP connection, writes one frame, reads one
//! frame and closes. Connect, write and read all share a single deadline.

use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;

use crate::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::protocol::codec::{framed, read_frame, write_frame};
use crate::protocol::message::Request;
use crate::resilience::timeouts::with_timeout;

#[derive(Debug, Clone)]
pub struct Client {
    timeout: Duration,
    max_frame_length: usize,
}

impl Client {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_frame_length: ProtocolConfig::default().max_frame_length,
        }
    }

    pub fn with_max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = max_frame_length;
        self
    }

    /// Send `payload` as-is and return the raw response body.
    pub async fn exchange(&self, addr: &str, payload: Bytes) -> Result<Bytes> {
        let what = format!("request to {addr}");
        with_timeout(what, self.timeout, self.exchange_inner(addr, payload)).await
    }

    /// Send a typed request and decode the response as `T`.
    pub async fn call<T: DeserializeOwned>(&self, addr: &str, request: &Request) -> Result<T> {
        let body = self.exchange(addr, request.to_bytes()?).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn exchange_inner(&self, addr: &str, payload: Bytes) -> Result<Bytes> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::unreachable(addr, e))?;
        stream.set_nodelay(true)?;

        let mut framed = framed(stream, self.max_frame_length);
        write_frame(&mut framed, payload).await?;
        read_frame(&mut framed).await?.ok_or(Error::ConnectionClosed)
    }
}
