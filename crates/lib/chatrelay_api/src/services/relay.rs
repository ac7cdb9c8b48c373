// @zen-component: RELAY-StreamPump
//
//! Stream relay: pumps the upstream body through the frame decoder into
//! the client response.
//!
//! The pump runs on its own task and hands encoded frames to the response
//! body through a small bounded channel:
//!
//! - a slow client fills the channel and stops upstream reads,
//! - a disconnected client closes the channel; the pump notices on its next
//!   send (or while waiting for upstream data) and returns, dropping the
//!   upstream response and its connection,
//! - an upstream read error produces one in-band fallback event, then the
//!   body ends.

use std::convert::Infallible;
use std::fmt::Display;

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use chatrelay_core::event::RelayEvent;
use chatrelay_core::frame::{FrameDecoder, FrameResult};
use futures_util::{Stream, StreamExt, stream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Frames buffered between the pump and the response body.
const CHANNEL_CAPACITY: usize = 16;

/// How a pump run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// Upstream finished and every frame was delivered.
    Completed,
    /// Upstream failed mid-stream; the fallback event was delivered.
    StreamFault,
    /// The client went away; upstream was abandoned.
    ClientGone,
}

/// Read `upstream` to completion, writing one frame per event to `tx`.
pub async fn pump<S, B, E>(
    upstream: S,
    mut decoder: FrameDecoder,
    tx: mpsc::Sender<String>,
) -> PumpOutcome
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut upstream = std::pin::pin!(upstream);

    loop {
        let next = tokio::select! {
            next = upstream.next() => next,
            () = tx.closed() => return PumpOutcome::ClientGone,
        };

        match next {
            Some(Ok(chunk)) => {
                for frame in decoder.push(chunk.as_ref()) {
                    if !emit(&tx, frame).await {
                        return PumpOutcome::ClientGone;
                    }
                }
            }
            Some(Err(e)) => {
                warn!(
                    error = %e,
                    discarded_bytes = decoder.pending().len(),
                    "upstream stream failed mid-response"
                );
                if tx.send(RelayEvent::stream_error().encode()).await.is_err() {
                    return PumpOutcome::ClientGone;
                }
                return PumpOutcome::StreamFault;
            }
            None => break,
        }
    }

    for frame in decoder.finish() {
        if !emit(&tx, frame).await {
            return PumpOutcome::ClientGone;
        }
    }
    PumpOutcome::Completed
}

/// Send one frame. Returns `false` once the client is gone.
async fn emit(tx: &mpsc::Sender<String>, frame: FrameResult) -> bool {
    match frame {
        Ok(event) => tx.send(event.encode()).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "dropping upstream frame");
            true
        }
    }
}

/// Build the streamed `text/plain` response and spawn the pump feeding it.
/// Upstream lines longer than `max_line_len` bytes are dropped.
pub fn stream_response<S, B, E>(upstream: S, max_line_len: usize) -> Response
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        match pump(upstream, FrameDecoder::with_max_line_len(max_line_len), tx).await {
            PumpOutcome::Completed => debug!("relay completed"),
            PumpOutcome::StreamFault => debug!("relay ended after upstream fault"),
            PumpOutcome::ClientGone => debug!("client disconnected, upstream released"),
        }
    });

    let frames = stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|frame| (Ok::<_, Infallible>(frame), rx))
    });

    (
        [
            (CONTENT_TYPE, "text/plain"),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

/// Fallback response when the relay fails before streaming begins.
pub fn unavailable_response() -> Response {
    (
        [(CONTENT_TYPE, "text/plain")],
        RelayEvent::unavailable().encode(),
    )
        .into_response()
}
