//! In-memory multiplexed transport for unit tests.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::task::noop_waker_ref;
use tokio::io::{duplex, AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

use crate::net::deadline::Deadline;
use crate::net::transport::{MuxConnection, MuxListener, MuxStream};

const PIPE_CAPACITY: usize = 64 * 1024;

/// One side of an in-memory session.
#[derive(Debug, Clone)]
pub struct MemConnection {
    local: SocketAddr,
    remote: SocketAddr,
    outgoing: mpsc::UnboundedSender<DuplexStream>,
    incoming: Arc<Mutex<mpsc::UnboundedReceiver<DuplexStream>>>,
    closed: Arc<AtomicBool>,
}

impl MemConnection {
    /// Two connected sides: (client, server).
    pub fn pair() -> (Self, Self) {
        let client_addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        let server_addr: SocketAddr = "127.0.0.1:4242".parse().unwrap();
        let (to_server, server_rx) = mpsc::unbounded_channel();
        let (to_client, client_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let client = Self {
            local: client_addr,
            remote: server_addr,
            outgoing: to_server,
            incoming: Arc::new(Mutex::new(client_rx)),
            closed: closed.clone(),
        };
        let server = Self {
            local: server_addr,
            remote: client_addr,
            outgoing: to_client,
            incoming: Arc::new(Mutex::new(server_rx)),
            closed,
        };
        (client, server)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl MuxConnection for MemConnection {
    type Stream = MemStream;

    fn open_stream(&self) -> impl std::future::Future<Output = io::Result<MemStream>> + Send + '_ {
        async move {
            if self.is_closed() {
                return Err(io::ErrorKind::NotConnected.into());
            }
            let (local, remote) = duplex(PIPE_CAPACITY);
            self.outgoing
                .send(remote)
                .map_err(|_| io::Error::from(io::ErrorKind::ConnectionReset))?;
            Ok(MemStream::new(local))
        }
    }

    fn accept_stream(&self) -> impl std::future::Future<Output = io::Result<MemStream>> + Send + '_ {
        async move {
            let mut incoming = self.incoming.lock().await;
            match incoming.recv().await {
                Some(io) => Ok(MemStream::new(io)),
                None => Err(io::ErrorKind::ConnectionAborted.into()),
            }
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.local
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// One in-memory stream with deadline support.
#[derive(Debug)]
pub struct MemStream {
    io: DuplexStream,
    read_deadline: Deadline,
    write_deadline: Deadline,
}

impl MemStream {
    fn new(io: DuplexStream) -> Self {
        Self {
            io,
            read_deadline: Deadline::default(),
            write_deadline: Deadline::default(),
        }
    }
}

impl AsyncRead for MemStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.read_deadline.poll_check(cx)?;
        Pin::new(&mut this.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.write_deadline.poll_check(cx)?;
        Pin::new(&mut this.io).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_shutdown(cx)
    }
}

impl MuxStream for MemStream {
    fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.read_deadline.set(deadline);
    }

    fn set_write_deadline(&mut self, deadline: Option<Instant>) {
        self.write_deadline.set(deadline);
    }

    fn close(&mut self) -> io::Result<()> {
        // Duplex shutdown completes synchronously.
        let mut cx = Context::from_waker(noop_waker_ref());
        match Pin::new(&mut self.io).poll_shutdown(&mut cx) {
            Poll::Ready(result) => result,
            Poll::Pending => Ok(()),
        }
    }
}

/// Listener fed by a test through [`MemListenerHandle`].
#[derive(Debug)]
pub struct MemListener {
    incoming: mpsc::UnboundedReceiver<io::Result<MemConnection>>,
    closed: Arc<AtomicBool>,
}

/// Pushes connections (or accept failures) into a [`MemListener`].
#[derive(Debug, Clone)]
pub struct MemListenerHandle {
    tx: mpsc::UnboundedSender<io::Result<MemConnection>>,
}

impl MemListenerHandle {
    /// Create a session; the server side goes to the listener, the client
    /// side is returned.
    pub fn connect(&self) -> MemConnection {
        let (client, server) = MemConnection::pair();
        let _ = self.tx.send(Ok(server));
        client
    }

    pub fn fail(&self, kind: io::ErrorKind) {
        let _ = self.tx.send(Err(kind.into()));
    }
}

impl MemListener {
    pub fn new() -> (Self, MemListenerHandle) {
        let (tx, incoming) = mpsc::unbounded_channel();
        (
            Self {
                incoming,
                closed: Arc::new(AtomicBool::new(false)),
            },
            MemListenerHandle { tx },
        )
    }
}

impl MuxListener for MemListener {
    type Connection = MemConnection;

    fn accept(
        &mut self,
    ) -> impl std::future::Future<Output = Option<io::Result<MemConnection>>> + Send + '_ {
        async move {
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            self.incoming.recv().await
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok("127.0.0.1:4242".parse().unwrap())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
