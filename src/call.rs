//! Handlers for calls returned by [crate::MuxRpc::call], one for each
//! [RequestType].
//!
//! Replies are received through [Stream] implementations. Sending on an open
//! stream goes through the [StreamSender] trait which is implemented by
//! [SinkHandler] and [DuplexHandler].
//!
//! [RequestType]: crate::RequestType
use futures::prelude::*;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::envelope::Request;
use crate::error::{Error, RpcError};
use crate::handler::Handler;
use crate::message::{Body, Message};
use crate::packet_stream::PacketStream;

/// Handler for an outgoing call, depending on its type.
#[derive(Debug)]
pub enum CallHandler {
    /// `sync` and `async` calls
    Response(ResponseHandler),
    Source(SourceHandler),
    Sink(SinkHandler),
    Duplex(DuplexHandler),
}

impl CallHandler {
    pub fn into_response(self) -> Option<ResponseHandler> {
        match self {
            CallHandler::Response(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn into_source(self) -> Option<SourceHandler> {
        match self {
            CallHandler::Source(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn into_sink(self) -> Option<SinkHandler> {
        match self {
            CallHandler::Sink(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn into_duplex(self) -> Option<DuplexHandler> {
        match self {
            CallHandler::Duplex(handler) => Some(handler),
            _ => None,
        }
    }
}

/// Checks a reply body for the error shape.
fn check_error(message: &Message) -> Result<(), RpcError> {
    match message.body.as_json().and_then(RpcError::from_json) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Waits for the single reply of a `sync` or `async` call.
#[derive(Debug)]
pub struct ResponseHandler {
    handler: Handler,
}

impl ResponseHandler {
    pub(crate) fn new(handler: Handler) -> Self {
        Self { handler }
    }

    pub fn request_number(&self) -> u32 {
        self.handler.number()
    }

    /// Wait for the reply.
    ///
    /// Returns `Ok(None)` if the connection ended before the reply arrived and
    /// [Error::Rpc] if the peer replied with an error.
    pub async fn get_response(mut self) -> Result<Option<Message>, Error> {
        match self.handler.next().await {
            Some(message) => {
                check_error(&message)?;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }
}

/// [Stream] of the messages the peer sends on a `source` call.
///
/// The stream ends when the peer ends it or the connection ends. An error
/// sent by the peer is yielded as [Error::Rpc] and ends the stream.
#[derive(Debug)]
pub struct SourceHandler {
    handler: Handler,
    done: bool,
}

impl SourceHandler {
    pub(crate) fn new(handler: Handler) -> Self {
        Self {
            handler,
            done: false,
        }
    }

    pub fn request_number(&self) -> u32 {
        self.handler.number()
    }
}

impl Stream for SourceHandler {
    type Item = Result<Message, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        let message = match futures::ready!(this.handler.poll_next_unpin(cx)) {
            Some(message) => message,
            None => {
                this.done = true;
                return Poll::Ready(None);
            }
        };
        if let Err(error) = check_error(&message) {
            this.done = true;
            return Poll::Ready(Some(Err(Error::Rpc(error))));
        }
        if message.end_err {
            this.done = true;
            if message.body.is_end() {
                return Poll::Ready(None);
            }
        }
        Poll::Ready(Some(Ok(message)))
    }
}

/// Send messages on a stream.
#[async_trait::async_trait]
pub trait StreamSender: Send + Sync {
    fn connection(&self) -> &Arc<PacketStream>;

    /// Request number that is written to the frames.
    fn stream_number(&self) -> i32;

    /// Send a message. If `end` is true the stream is ended with this message.
    async fn send(&self, body: Body, end: bool) -> Result<(), Error> {
        self.connection()
            .send_on(self.stream_number(), body, true, end)
            .await
    }

    /// End the stream without sending more data.
    async fn close(&self) -> Result<(), Error> {
        self.send(Body::end(), true).await
    }

    /// End the stream with an error.
    async fn send_error(&self, error: &RpcError) -> Result<(), Error> {
        self.send(Body::Json(error.to_json()), true).await
    }
}

/// Sending side of a stream.
///
/// Returned for outgoing `sink` calls. Use [SinkHandler::reply] to send
/// messages on a stream opened by the peer.
#[derive(Debug, Clone)]
pub struct SinkHandler {
    connection: Arc<PacketStream>,
    number: i32,
}

impl SinkHandler {
    pub(crate) fn new(connection: Arc<PacketStream>, number: i32) -> Self {
        Self { connection, number }
    }

    /// Sender for the replies to a call made by the peer.
    pub fn reply(connection: &Arc<PacketStream>, request: &Request) -> Self {
        Self::new(Arc::clone(connection), request.response_number())
    }
}

impl StreamSender for SinkHandler {
    fn connection(&self) -> &Arc<PacketStream> {
        &self.connection
    }

    fn stream_number(&self) -> i32 {
        self.number
    }
}

/// Both sends and receives messages of a `duplex` call.
#[derive(Debug)]
pub struct DuplexHandler {
    source: SourceHandler,
    sink: SinkHandler,
}

impl DuplexHandler {
    pub(crate) fn new(connection: Arc<PacketStream>, handler: Handler) -> Self {
        let number = handler.number() as i32;
        Self {
            source: SourceHandler::new(handler),
            sink: SinkHandler::new(connection, number),
        }
    }

    /// Split into the receiving and the sending half.
    pub fn split(self) -> (SourceHandler, SinkHandler) {
        (self.source, self.sink)
    }
}

impl Stream for DuplexHandler {
    type Item = Result<Message, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        self.get_mut().source.poll_next_unpin(cx)
    }
}

impl StreamSender for DuplexHandler {
    fn connection(&self) -> &Arc<PacketStream> {
        self.sink.connection()
    }

    fn stream_number(&self) -> i32 {
        self.sink.stream_number()
    }
}
