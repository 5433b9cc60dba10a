//! Handlers connect the packet stream reader with the caller waiting for the
//! replies to a request.
//!
//! Each handler is split in two. The [Handler] is returned to the caller and
//! yields the reply messages as a [Stream]. The [HandlerSender] is stored in
//! the pending table of the packet stream and is fed by the reader.
use futures::channel::{mpsc, oneshot};
use futures::prelude::*;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::message::Message;

/// Receives the replies to a request.
#[derive(Debug)]
pub enum Handler {
    /// Single-slot handler for requests with exactly one reply.
    Request(RequestHandler),
    /// Queue-based handler for streams.
    Stream(StreamHandler),
}

impl Handler {
    /// Create a handler for the request with `number`.
    pub(crate) fn new(number: u32, stream: bool) -> (Self, HandlerSender) {
        if stream {
            let (sender, receiver) = mpsc::unbounded();
            (
                Handler::Stream(StreamHandler { number, receiver }),
                HandlerSender::Stream(sender),
            )
        } else {
            let (sender, receiver) = oneshot::channel();
            (
                Handler::Request(RequestHandler {
                    number,
                    receiver: Some(receiver),
                }),
                HandlerSender::Request(Some(sender)),
            )
        }
    }

    /// Request number the replies are matched against.
    pub fn number(&self) -> u32 {
        match self {
            Handler::Request(handler) => handler.number,
            Handler::Stream(handler) => handler.number,
        }
    }
}

impl Stream for Handler {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        match self.get_mut() {
            Handler::Request(handler) => handler.poll_next_unpin(cx),
            Handler::Stream(handler) => handler.poll_next_unpin(cx),
        }
    }
}

/// Yields at most one message. Yields nothing if the handler was terminated
/// before a reply arrived.
#[derive(Debug)]
pub struct RequestHandler {
    number: u32,
    receiver: Option<oneshot::Receiver<Message>>,
}

impl Stream for RequestHandler {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let receiver = match this.receiver.as_mut() {
            Some(receiver) => receiver,
            None => return Poll::Ready(None),
        };
        let result = futures::ready!(receiver.poll_unpin(cx));
        this.receiver = None;
        Poll::Ready(result.ok())
    }
}

/// Yields messages in the order they were received until the handler is
/// terminated.
#[derive(Debug)]
pub struct StreamHandler {
    number: u32,
    receiver: mpsc::UnboundedReceiver<Message>,
}

impl Stream for StreamHandler {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

/// Feeding side of a [Handler].
#[derive(Debug)]
pub(crate) enum HandlerSender {
    Request(Option<oneshot::Sender<Message>>),
    Stream(mpsc::UnboundedSender<Message>),
}

impl HandlerSender {
    pub fn is_stream(&self) -> bool {
        matches!(self, HandlerSender::Stream(_))
    }

    pub fn process(&mut self, message: Message) {
        // We don’t care if the caller dropped the handler.
        match self {
            HandlerSender::Request(sender) => match sender.take() {
                Some(sender) => {
                    let _ = sender.send(message);
                }
                None => tracing::debug!(?message, "request handler already completed"),
            },
            HandlerSender::Stream(sender) => {
                let _ = sender.unbounded_send(message);
            }
        }
    }

    /// Signal the end of replies. Calling this more than once has no effect.
    pub fn terminate(&mut self) {
        match self {
            HandlerSender::Request(sender) => drop(sender.take()),
            HandlerSender::Stream(sender) => sender.close_channel(),
        }
    }
}
