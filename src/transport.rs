//! Duplex byte connections the packet stream runs on.
//!
//! The connection is usually the encrypted box stream established by the
//! secret handshake. [Transport] abstracts over it so the packet stream only
//! sees chunks of bytes.
use async_std::sync::Mutex;
use futures::prelude::*;
use std::convert::Infallible;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::message::CHUNK_SIZE;

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Read the next chunk of bytes. `None` or an empty chunk signals the end
    /// of the connection.
    async fn read(&self) -> io::Result<Option<Vec<u8>>>;

    async fn write(&self, data: Vec<u8>) -> io::Result<()>;

    async fn close(&self);

    fn is_connected(&self) -> bool;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn read(&self) -> io::Result<Option<Vec<u8>>> {
        (**self).read().await
    }

    async fn write(&self, data: Vec<u8>) -> io::Result<()> {
        (**self).write(data).await
    }

    async fn close(&self) {
        (**self).close().await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

/// Combine a [TryStream] of byte chunks and a [Sink] of byte chunks into a
/// [Transport].
pub struct Duplex<R, W> {
    reader: Mutex<R>,
    writer: Mutex<W>,
    connected: AtomicBool,
}

impl<R, W> Duplex<R, W> {
    /// Create a new instance.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            connected: AtomicBool::new(true),
        }
    }

    /// Decomposes a duplex into its components.
    pub fn into_inner(self) -> (R, W) {
        (self.reader.into_inner(), self.writer.into_inner())
    }
}

impl<R, W> std::fmt::Debug for Duplex<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Duplex")
            .field("connected", &self.connected)
            .finish()
    }
}

#[async_trait::async_trait]
impl<R, W> Transport for Duplex<R, W>
where
    R: TryStream<Ok = Vec<u8>> + Send + Unpin,
    R::Error: std::error::Error + Send + Sync + 'static,
    W: Sink<Vec<u8>> + Send + Unpin,
    W::Error: std::error::Error + Send + Sync + 'static,
{
    async fn read(&self) -> io::Result<Option<Vec<u8>>> {
        let mut reader = self.reader.lock().await;
        match reader.try_next().await {
            Ok(Some(data)) => Ok(Some(data)),
            Ok(None) => {
                self.connected.store(false, Ordering::SeqCst);
                Ok(None)
            }
            Err(error) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(io::Error::new(io::ErrorKind::Other, error))
            }
        }
    }

    async fn write(&self, data: Vec<u8>) -> io::Result<()> {
        if !self.is_connected() {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        let mut writer = self.writer.lock().await;
        writer
            .send(data)
            .await
            .map_err(|error| io::Error::new(io::ErrorKind::Other, error))
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let mut writer = self.writer.lock().await;
        if let Err(error) = writer.close().await {
            tracing::debug!(?error, "failed to close transport");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

type ChannelReceiver = stream::Map<
    futures::channel::mpsc::UnboundedReceiver<Vec<u8>>,
    fn(Vec<u8>) -> Result<Vec<u8>, Infallible>,
>;

/// One end of an in-memory connection created by [pair].
pub type ChannelTransport = Duplex<ChannelReceiver, futures::channel::mpsc::UnboundedSender<Vec<u8>>>;

/// Create two transports that are connected to each other.
///
/// Chunk boundaries are preserved. Closing one end ends the reads of the
/// other end.
pub fn pair() -> (ChannelTransport, ChannelTransport) {
    let (a_sender, a_receiver) = futures::channel::mpsc::unbounded();
    let (b_sender, b_receiver) = futures::channel::mpsc::unbounded();
    let ok = Ok as fn(Vec<u8>) -> Result<Vec<u8>, Infallible>;
    (
        Duplex::new(b_receiver.map(ok), a_sender),
        Duplex::new(a_receiver.map(ok), b_sender),
    )
}

/// Transport created by [from_io].
pub type IoTransport = Duplex<
    stream::BoxStream<'static, io::Result<Vec<u8>>>,
    Pin<Box<dyn Sink<Vec<u8>, Error = io::Error> + Send>>,
>;

/// Create a transport from an [AsyncRead] and [AsyncWrite], for example the
/// two halves of a TCP connection.
pub fn from_io(
    read: impl AsyncRead + Send + Unpin + 'static,
    write: impl AsyncWrite + Send + Unpin + 'static,
) -> IoTransport {
    Duplex::new(read_to_stream(read).boxed(), Box::pin(write.into_sink::<Vec<u8>>()))
}

/// Convert [AsyncRead] into a [Stream]. Polling the resulting stream will poll
/// the reader for [CHUNK_SIZE] bytes and return a [Vec] of all the bytes that
/// were read.
fn read_to_stream(
    read: impl AsyncRead + Unpin,
) -> impl Stream<Item = Result<Vec<u8>, io::Error>> {
    let mut read = read;
    let mut buf = vec![0u8; CHUNK_SIZE];
    futures::stream::poll_fn(move |cx| {
        let result = match futures::ready!(Pin::new(&mut read).poll_read(cx, &mut buf)) {
            Ok(0) => None,
            Ok(size) => Some(Ok(Vec::from(&buf[..size]))),
            Err(err) => Some(Err(err)),
        };
        std::task::Poll::Ready(result)
    })
}
