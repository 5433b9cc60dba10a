//! Provides [MuxRpc], which dispatches calls made by the peer to registered
//! methods and makes calls to the peer.
use std::collections::HashMap;
use std::sync::Arc;
use tracing_futures::Instrument as _;

use crate::call::{
    CallHandler, DuplexHandler, ResponseHandler, SinkHandler, SourceHandler,
};
use crate::envelope::{CallEnvelope, Request, RequestType};
use crate::error::{Error, MalformedFrame, RpcError};
use crate::handler::{Handler, HandlerSender};
use crate::message::{Body, Message};
use crate::packet_stream::PacketStream;

/// Callback invoked for calls made by the peer.
///
/// Replies are sent with [PacketStream::send_on] using
/// [Request::response_number] or with [SinkHandler::reply].
pub type Method = Box<dyn Fn(&Arc<PacketStream>, Request) + Send + Sync>;

/// RPC endpoint bound to one connection.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use ssb_muxrpc::{Body, MuxRpc, PacketStream, RequestType};
/// # async fn run(connection: Arc<PacketStream>) -> Result<(), ssb_muxrpc::Error> {
/// let mut rpc = MuxRpc::new();
/// rpc.define("whoami", |connection, request| {
///     let connection = Arc::clone(connection);
///     async_std::task::spawn(async move {
///         let body = Body::Json(serde_json::json!({"id": "@abc=.ed25519"}));
///         let _ = connection
///             .send_on(request.response_number(), body, false, false)
///             .await;
///     });
/// });
/// rpc.add_connection(connection);
/// let rpc = Arc::new(rpc);
/// Arc::clone(&rpc).spawn_processing();
///
/// let response = rpc
///     .call("whoami", vec![], RequestType::Sync)
///     .await?
///     .into_response()
///     .unwrap()
///     .get_response()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MuxRpc {
    methods: HashMap<String, Method>,
    connection: Option<Arc<PacketStream>>,
}

impl std::fmt::Debug for MuxRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuxRpc")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("connection", &self.connection)
            .finish()
    }
}

impl MuxRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `method` for calls to the dot-separated `name`. Replaces an
    /// earlier registration with the same name.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        method: impl Fn(&Arc<PacketStream>, Request) + Send + Sync + 'static,
    ) {
        let name = name.into();
        tracing::debug!(%name, "define method");
        self.methods.insert(name, Box::new(method));
    }

    /// Bind the dispatcher to `connection`.
    pub fn add_connection(&mut self, connection: Arc<PacketStream>) {
        self.connection = Some(connection);
    }

    pub fn connection(&self) -> Option<&Arc<PacketStream>> {
        self.connection.as_ref()
    }

    fn connected(&self) -> Result<&Arc<PacketStream>, Error> {
        match &self.connection {
            Some(connection) if connection.is_connected() => Ok(connection),
            _ => Err(Error::NotConnected),
        }
    }

    /// Call the method `name` on the peer.
    ///
    /// Replies are only received while [MuxRpc::process_messages] is running.
    pub async fn call(
        &self,
        name: &str,
        args: Vec<serde_json::Value>,
        type_: RequestType,
    ) -> Result<CallHandler, Error> {
        let connection = self.connected()?;
        let envelope = CallEnvelope::new(name, args, type_);
        let body = Body::json(&envelope).map_err(MalformedFrame::Body)?;
        let stream = type_.is_stream();
        tracing::debug!(%name, %type_, "call");
        Ok(match type_ {
            RequestType::Sync | RequestType::Async => {
                CallHandler::Response(ResponseHandler::new(connection.send(body, stream).await?))
            }
            RequestType::Source => {
                CallHandler::Source(SourceHandler::new(connection.send(body, stream).await?))
            }
            RequestType::Sink => {
                let number = connection.send_oneway(body, stream).await?;
                CallHandler::Sink(SinkHandler::new(Arc::clone(connection), number as i32))
            }
            RequestType::Duplex => {
                let handler = connection.send(body, stream).await?;
                CallHandler::Duplex(DuplexHandler::new(Arc::clone(connection), handler))
            }
        })
    }

    /// Invoke the method registered for `request`.
    pub fn process(&self, connection: &Arc<PacketStream>, request: Request) -> Result<(), Error> {
        match self.methods.get(&request.name) {
            Some(method) => {
                tracing::debug!(name = %request.name, number = request.number, "process request");
                method(connection, request);
                Ok(())
            }
            None => Err(Error::MethodNotFound { name: request.name }),
        }
    }

    /// Read from the connection and dispatch calls made by the peer until the
    /// connection ends.
    ///
    /// Calls to unknown methods are answered with an error, logged, and do
    /// not stop processing. Use [MuxRpc::process_messages_with] to receive
    /// these errors.
    pub async fn process_messages(&self) -> Result<(), Error> {
        self.process_messages_with(|error| {
            tracing::warn!(%error, "failed to process request");
        })
        .await
    }

    /// Like [MuxRpc::process_messages] but passes every
    /// [Error::MethodNotFound] to `on_error` after the error reply was sent.
    pub async fn process_messages_with(
        &self,
        mut on_error: impl FnMut(Error),
    ) -> Result<(), Error> {
        let connection = self.connection.as_ref().ok_or(Error::NotConnected)?;
        let mut open_streams = HashMap::<i32, HandlerSender>::new();
        while let Some(message) = connection.next_inbound().await {
            let number = match message.req {
                Some(number) => number,
                None => continue,
            };
            if let Some(sender) = open_streams.get_mut(&number) {
                let end = message.end_err;
                sender.process(message);
                if end {
                    if let Some(mut sender) = open_streams.remove(&number) {
                        sender.terminate();
                    }
                }
                continue;
            }
            if let Err(error) = self
                .process_message(connection, &mut open_streams, message)
                .await
            {
                on_error(error);
            }
        }
        for (_, mut sender) in open_streams {
            sender.terminate();
        }
        tracing::debug!("connection ended");
        Ok(())
    }

    async fn process_message(
        &self,
        connection: &Arc<PacketStream>,
        open_streams: &mut HashMap<i32, HandlerSender>,
        message: Message,
    ) -> Result<(), Error> {
        let mut request = match Request::from_message(&message) {
            Some(request) => request,
            None => {
                tracing::warn!(?message, "ignoring message that is not a call");
                return Ok(());
            }
        };
        let number = request.number;
        let stream = message.stream;
        if stream && !message.end_err {
            let (handler, sender) = Handler::new(number as u32, true);
            open_streams.insert(number, sender);
            request.incoming = Some(handler);
        }
        let response_number = request.response_number();
        if let Err(error) = self.process(connection, request) {
            tracing::debug!(%error, number, "replying with error");
            if let Some(mut sender) = open_streams.remove(&number) {
                sender.terminate();
            }
            let body = Body::Json(RpcError::new(&error).to_json());
            if let Err(error) = connection.send_on(response_number, body, stream, true).await {
                tracing::debug!(?error, "failed to send error response");
            }
            return Err(error);
        }
        Ok(())
    }

    /// Spawn [MuxRpc::process_messages] as a task.
    pub fn spawn_processing(self: Arc<Self>) -> async_std::task::JoinHandle<Result<(), Error>> {
        let span = tracing::debug_span!("process_messages");
        async_std::task::spawn(async move { self.process_messages().await }.instrument(span))
    }
}
