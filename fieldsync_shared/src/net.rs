//! Networking primitives.
//!
//! One persistent WebSocket per client. Each sync round is a single data frame in each direction,
//! so the framing layer only has to deliver whole messages and keep control frames out of the
//! way. Every read and write runs under a deadline from `Timeouts`.

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
    time,
};
use tokio_tungstenite::{
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, trace};

use crate::{codec::ProtocolError, config::Timeouts};

/// Data frame flavour. Replies mirror the flavour of the request they answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
}

/// One inbound data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Vec<u8>,
}

/// Message-framed duplex connection.
pub struct WsConn<S> {
    stream: WebSocketStream<S>,
    timeouts: Timeouts,
}

/// Client side of a connection.
pub type ClientConn = WsConn<MaybeTlsStream<TcpStream>>;

/// Host side of a connection.
pub type HostConn = WsConn<TcpStream>;

impl<S> WsConn<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: WebSocketStream<S>, timeouts: Timeouts) -> Self {
        Self { stream, timeouts }
    }

    pub async fn send(&mut self, kind: FrameKind, payload: String) -> anyhow::Result<()> {
        let msg = match kind {
            FrameKind::Text => Message::Text(payload),
            FrameKind::Binary => Message::Binary(payload.into_bytes()),
        };
        trace!(?kind, "ws send");
        match time::timeout(self.timeouts.write, self.stream.send(msg)).await {
            Ok(res) => res.context("ws write"),
            Err(_) => Err(ProtocolError::Timeout("write").into()),
        }
    }

    /// Next data frame; `None` once the peer closed.
    pub async fn recv(&mut self) -> anyhow::Result<Option<Frame>> {
        match self.timeouts.read {
            Some(limit) => match time::timeout(limit, self.recv_inner()).await {
                Ok(res) => res,
                Err(_) => Err(ProtocolError::Timeout("read").into()),
            },
            None => self.recv_inner().await,
        }
    }

    async fn recv_inner(&mut self) -> anyhow::Result<Option<Frame>> {
        loop {
            let Some(msg) = self.stream.next().await else {
                return Ok(None);
            };
            match msg.context("ws read")? {
                Message::Text(text) => {
                    return Ok(Some(Frame {
                        kind: FrameKind::Text,
                        payload: text.into_bytes(),
                    }))
                }
                Message::Binary(payload) => {
                    return Ok(Some(Frame {
                        kind: FrameKind::Binary,
                        payload,
                    }))
                }
                Message::Ping(data) => {
                    self.stream
                        .send(Message::Pong(data))
                        .await
                        .context("ws pong")?;
                }
                Message::Close(frame) => {
                    debug!(?frame, "ws close received");
                    return Ok(None);
                }
                Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    /// Sends a Close frame. Best effort; the peer may already be gone.
    pub async fn close(&mut self) {
        let limit = self.timeouts.write;
        if let Err(e) = time::timeout(limit, self.stream.close(None)).await {
            debug!(error = %e, "ws close timed out");
        }
    }
}

/// Host-side WebSocket upgrade restricted to a single path.
pub async fn accept(
    stream: TcpStream,
    path: &str,
    timeouts: Timeouts,
) -> anyhow::Result<HostConn> {
    let check_path = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        if req.uri().path() == path {
            Ok(resp)
        } else {
            let mut err = ErrorResponse::new(Some(format!("no handler for {}", req.uri().path())));
            *err.status_mut() = StatusCode::NOT_FOUND;
            Err(err)
        }
    };
    let ws = time::timeout(
        timeouts.write,
        tokio_tungstenite::accept_hdr_async(stream, check_path),
    )
    .await
    .map_err(|_| anyhow::Error::from(ProtocolError::Timeout("upgrade")))?
    .context("ws upgrade")?;
    Ok(WsConn::new(ws, timeouts))
}

/// Client-side dial.
pub async fn connect(url: &str, timeouts: Timeouts) -> anyhow::Result<ClientConn> {
    let (ws, _resp) = time::timeout(timeouts.write, tokio_tungstenite::connect_async(url))
        .await
        .map_err(|_| anyhow::Error::from(ProtocolError::Timeout("dial")))?
        .with_context(|| format!("dial {url}"))?;
    Ok(WsConn::new(ws, timeouts))
}

/// TCP listener for the host.
pub struct SyncListener {
    listener: TcpListener,
}

impl SyncListener {
    pub async fn bind(addr: &str) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("tcp bind {addr}"))?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        stream.set_nodelay(true).context("set_nodelay")?;
        Ok((stream, addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Pause after a failed `accept` before trying again.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Classifies a connection error as a protocol violation (vs. transport failure).
pub fn protocol_error(e: &anyhow::Error) -> Option<&ProtocolError> {
    e.downcast_ref::<ProtocolError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeouts() -> Timeouts {
        Timeouts {
            read: Some(Duration::from_secs(2)),
            write: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn text_and_binary_frames_pass_through() -> anyhow::Result<()> {
        let listener = SyncListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let host = tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            let mut conn = accept(stream, "/player", timeouts()).await?;
            let first = conn.recv().await?.context("first frame")?;
            let second = conn.recv().await?.context("second frame")?;
            conn.send(second.kind, String::from_utf8(second.payload.clone())?)
                .await?;
            Ok::<_, anyhow::Error>((first, second))
        });

        let mut client = connect(&format!("ws://{addr}/player"), timeouts()).await?;
        client.send(FrameKind::Text, "hello".into()).await?;
        client.send(FrameKind::Binary, "world".into()).await?;
        let echo = client.recv().await?.context("echo")?;

        let (first, second) = host.await??;
        assert_eq!(first.kind, FrameKind::Text);
        assert_eq!(first.payload, b"hello");
        assert_eq!(second.kind, FrameKind::Binary);
        assert_eq!(echo.kind, FrameKind::Binary);
        assert_eq!(echo.payload, b"world");
        Ok(())
    }

    #[tokio::test]
    async fn wrong_path_is_refused() -> anyhow::Result<()> {
        let listener = SyncListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let host = tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            Ok::<_, anyhow::Error>(accept(stream, "/player", timeouts()).await.is_err())
        });

        let dialed = connect(&format!("ws://{addr}/elsewhere"), timeouts()).await;
        assert!(dialed.is_err());
        assert!(host.await??);
        Ok(())
    }

    #[tokio::test]
    async fn silent_peer_times_out() -> anyhow::Result<()> {
        let listener = SyncListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let host = tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            let conn = accept(stream, "/player", timeouts()).await?;
            time::sleep(Duration::from_millis(500)).await;
            drop(conn);
            Ok::<_, anyhow::Error>(())
        });

        let short = Timeouts {
            read: Some(Duration::from_millis(50)),
            write: Duration::from_secs(2),
        };
        let mut client = connect(&format!("ws://{addr}/player"), short).await?;
        let err = client.recv().await.unwrap_err();
        assert_eq!(protocol_error(&err), Some(&ProtocolError::Timeout("read")));
        host.await??;
        Ok(())
    }
}
