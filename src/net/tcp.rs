//! Newline-framed TCP receive transport.
//!
//! Each line received on an accepted connection becomes one
//! [`ReceiveContext`] pushed through the receive pipe.

use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::config::TransportConfig;
use crate::endpoint::InputAddress;
use crate::lifecycle::{Deadline, StopListener, StopSignal};
use crate::net::connection::{ConnectionId, ReceiveTracker};
use crate::net::listener::{ConnectionPermit, Listener};
use crate::pipeline::{ReceiveContext, SharedPipe};
use crate::resilience::backoff::calculate_backoff;
use crate::transport::{ReceiveTransport, TransportError, TransportHandle};

/// Header carrying the peer address of the connection a frame arrived on.
pub const PEER_HEADER: &str = "peer";

/// Header carrying the connection id a frame arrived on.
pub const CONNECTION_HEADER: &str = "connection-id";

const ACCEPT_BACKOFF_BASE_MS: u64 = 10;
const ACCEPT_BACKOFF_MAX_MS: u64 = 1_000;

/// TCP transport receiving newline-delimited frames.
pub struct TcpReceiveTransport {
    input_address: InputAddress,
    config: TransportConfig,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl TcpReceiveTransport {
    pub fn new(input_address: InputAddress, config: TransportConfig) -> Self {
        Self {
            input_address,
            config,
            local_addr: Mutex::new(None),
        }
    }

    /// Address bound by the most recent successful start.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReceiveTransport for TcpReceiveTransport {
    type Handle = TcpTransportHandle;

    fn input_address(&self) -> &InputAddress {
        &self.input_address
    }

    async fn start(&self, pipe: SharedPipe) -> Result<TcpTransportHandle, TransportError> {
        let listener = Listener::bind(&self.config).await?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(local_addr);

        let stop = StopSignal::new();
        let abort = StopSignal::new();
        let tracker = ReceiveTracker::new();

        let loop_ctx = LoopContext {
            address: self.input_address.clone(),
            pipe,
            stop: stop.listener(),
            abort: abort.listener(),
            tracker: tracker.clone(),
            max_frame_bytes: self.config.max_frame_bytes,
        };
        let accept_task = tokio::spawn(accept_loop(listener, loop_ctx));

        tracing::info!(
            address = %self.input_address,
            local_addr = %local_addr,
            "TCP receive loop started"
        );

        Ok(TcpTransportHandle {
            address: self.input_address.clone(),
            stop,
            abort,
            tracker,
            accept_task: Some(accept_task),
        })
    }
}

/// Everything a receive task needs, cloned per connection.
#[derive(Clone)]
struct LoopContext {
    address: InputAddress,
    pipe: SharedPipe,
    /// Stop accepting and reading new frames.
    stop: StopListener,
    /// Cancel frames already inside the pipe.
    abort: StopListener,
    tracker: ReceiveTracker,
    max_frame_bytes: usize,
}

async fn accept_loop(listener: Listener, ctx: LoopContext) {
    let mut failures = 0u32;
    loop {
        let accepted = tokio::select! {
            biased;
            _ = ctx.stop.fired() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer, permit)) => {
                failures = 0;
                tokio::spawn(serve_connection(stream, peer, permit, ctx.clone()));
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                let delay = calculate_backoff(failures, ACCEPT_BACKOFF_BASE_MS, ACCEPT_BACKOFF_MAX_MS);
                tracing::warn!(
                    address = %ctx.address,
                    error = %e,
                    failures,
                    retry_in = ?delay,
                    "Accept failed"
                );
                tokio::select! {
                    biased;
                    _ = ctx.stop.fired() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    tracing::debug!(address = %ctx.address, "Accept loop exited");
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    _permit: ConnectionPermit,
    ctx: LoopContext,
) {
    let id = ConnectionId::new();
    tracing::debug!(connection_id = %id, peer_addr = %peer, "Connection opened");

    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        let frame = tokio::select! {
            biased;
            _ = ctx.stop.fired() => break,
            frame = read_frame(&mut reader, &mut buf, ctx.max_frame_bytes) => frame,
        };

        match frame {
            Ok(Frame::Data) => {}
            Ok(Frame::Oversized) => {
                tracing::warn!(
                    connection_id = %id,
                    max_frame_bytes = ctx.max_frame_bytes,
                    "Oversized frame dropped"
                );
                continue;
            }
            Ok(Frame::Eof) => break,
            Err(e) => {
                tracing::warn!(connection_id = %id, error = %e, "Read failed");
                break;
            }
        }
        if buf.is_empty() {
            continue;
        }

        let _guard = ctx.tracker.track();
        let mut context = ReceiveContext::new(ctx.address.clone(), std::mem::take(&mut buf))
            .with_header(PEER_HEADER, peer.to_string())
            .with_header(CONNECTION_HEADER, id.to_string());

        tokio::select! {
            biased;
            _ = ctx.abort.fired() => {
                tracing::debug!(
                    connection_id = %id,
                    message_id = %context.message_id(),
                    "Receive aborted"
                );
                break;
            }
            result = ctx.pipe.send(&mut context) => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %id, error = %e, "Frame not consumed");
                }
            }
        }
    }

    tracing::debug!(connection_id = %id, "Connection closed");
}

/// Outcome of reading one newline-terminated frame.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    /// `buf` holds the frame without its terminator.
    Data,
    /// The frame exceeded the limit and was skipped up to its newline.
    Oversized,
    Eof,
}

/// Read one frame into `buf`, never buffering more than `max + 1` bytes.
///
/// Frames are raw bytes; a trailing `\r\n` or `\n` is stripped. A final
/// frame without a newline is still delivered.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> std::io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = max as u64 + 1;

    if (&mut *reader).take(limit).read_until(b'\n', buf).await? == 0 {
        return Ok(Frame::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(Frame::Data);
    }
    if buf.len() <= max {
        return Ok(Frame::Data);
    }

    // Discard the rest of the oversized frame in bounded chunks.
    loop {
        buf.clear();
        let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
        if n == 0 || buf.last() == Some(&b'\n') {
            break;
        }
    }
    buf.clear();
    Ok(Frame::Oversized)
}

/// Control over one running TCP receive loop.
pub struct TcpTransportHandle {
    address: InputAddress,
    stop: StopSignal,
    abort: StopSignal,
    tracker: ReceiveTracker,
    accept_task: Option<JoinHandle<()>>,
}

impl TcpTransportHandle {
    fn force_close(&mut self) {
        self.stop.trigger();
        self.abort.trigger();
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

impl TransportHandle for TcpTransportHandle {
    async fn stop(&mut self, deadline: Deadline) -> Result<(), TransportError> {
        self.stop.trigger();
        tracing::debug!(
            address = %self.address,
            in_flight = self.tracker.in_flight(),
            "Draining TCP receive loop"
        );

        let drained = {
            let accept_task = self.accept_task.as_mut();
            let tracker = &self.tracker;
            tokio::select! {
                _ = async {
                    if let Some(task) = accept_task {
                        let _ = task.await;
                    }
                    tracker.wait_idle().await;
                } => true,
                _ = deadline.expired() => false,
            }
        };

        if drained {
            self.accept_task = None;
            tracing::info!(address = %self.address, "TCP receive loop drained");
            return Ok(());
        }

        let in_flight = self.tracker.in_flight();
        self.force_close();
        tracing::warn!(
            address = %self.address,
            in_flight,
            "Stop deadline expired, aborting in-flight receives"
        );
        Err(TransportError::DeadlineExpired { in_flight })
    }

    fn dispose(&mut self) -> Result<(), TransportError> {
        self.force_close();
        tracing::debug!(address = %self.address, "TCP receive loop disposed");
        Ok(())
    }
}

impl Drop for TcpTransportHandle {
    fn drop(&mut self) {
        self.force_close();
    }
}
