//! TCP server exposing a few methods for manual and end-to-end testing.
//!
//! * `whoami` (sync) replies with `{"id": "@test-server"}`
//! * `echo` (async) replies with its first argument
//! * `errorAsync` (async) replies with the error given as its first argument
//! * `count` (source) streams the numbers from 1 to its first argument
//! * `consume` (sink) reads until the caller ends the stream and logs the
//!   number of received messages
//! * `echoStream` (duplex) sends every received message back
use futures::prelude::*;
use std::sync::Arc;
use tracing_futures::Instrument as _;

use crate::call::{SinkHandler, StreamSender};
use crate::envelope::Request;
use crate::error::{Error, RpcError};
use crate::message::Body;
use crate::muxrpc::MuxRpc;
use crate::packet_stream::PacketStream;
use crate::transport;

pub const WHOAMI_ID: &str = "@test-server";

/// Accept connections on `bind_addr` and serve each on its own task.
pub async fn run(bind_addr: impl async_std::net::ToSocketAddrs) -> anyhow::Result<()> {
    let listener = async_std::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = ?listener.local_addr()?, "listening");
    loop {
        let (stream, addr) = listener.accept().await?;
        tracing::info!(?addr, "accepted connection");
        let span = tracing::info_span!("connection", %addr);
        async_std::task::spawn(handle_incoming(stream).instrument(span));
    }
}

async fn handle_incoming(stream: async_std::net::TcpStream) {
    let connection = Arc::new(PacketStream::new(transport::from_io(
        stream.clone(),
        stream,
    )));
    let mut rpc = MuxRpc::new();
    define_methods(&mut rpc);
    rpc.add_connection(connection);
    if let Err(error) = rpc.process_messages().await {
        tracing::error!(?error, "connection failed");
    }
}

/// Register the test methods with `rpc`.
pub fn define_methods(rpc: &mut MuxRpc) {
    rpc.define("whoami", |connection, request| {
        let body = Body::Json(serde_json::json!({ "id": WHOAMI_ID }));
        spawn_reply(connection, request, async move { Ok(body) });
    });

    rpc.define("echo", |connection, request| {
        let arg = request.args.get(0).cloned().unwrap_or_default();
        spawn_reply(connection, request, async move { Ok(Body::Json(arg)) });
    });

    rpc.define("errorAsync", |connection, request| {
        let arg = request.args.get(0).cloned().unwrap_or_default();
        spawn_reply(connection, request, async move {
            let error = serde_json::from_value::<RpcError>(arg)
                .unwrap_or_else(|_| RpcError::new("invalid error argument"));
            Err(error)
        });
    });

    rpc.define("count", |connection, request| {
        let count = request
            .args
            .get(0)
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);
        let sender = SinkHandler::reply(connection, &request);
        async_std::task::spawn(async move {
            let result: Result<(), Error> = async {
                for i in 1..=count {
                    sender.send(Body::Json(i.into()), false).await?;
                }
                sender.close().await
            }
            .await;
            log_send_error(result);
        });
    });

    // Sink calls have no reply so the count is only logged.
    rpc.define("consume", |_connection, request| {
        let number = request.number;
        let incoming = request.incoming;
        async_std::task::spawn(async move {
            let mut count = 0u64;
            if let Some(mut incoming) = incoming {
                while let Some(message) = incoming.next().await {
                    if message.end_err {
                        break;
                    }
                    count += 1;
                }
            }
            tracing::info!(number, count, "consumed sink");
        });
    });

    rpc.define("echoStream", |connection, request| {
        let sender = SinkHandler::reply(connection, &request);
        let incoming = request.incoming;
        async_std::task::spawn(async move {
            let result: Result<(), Error> = async {
                if let Some(mut incoming) = incoming {
                    while let Some(message) = incoming.next().await {
                        if message.end_err {
                            break;
                        }
                        sender.send(message.body, false).await?;
                    }
                }
                sender.close().await
            }
            .await;
            log_send_error(result);
        });
    });
}

/// Spawn a task that sends the result of `response` as the only reply to
/// `request`.
fn spawn_reply(
    connection: &Arc<PacketStream>,
    request: Request,
    response: impl Future<Output = Result<Body, RpcError>> + Send + 'static,
) {
    let connection = Arc::clone(connection);
    async_std::task::spawn(async move {
        let (body, end_err) = match response.await {
            Ok(body) => (body, false),
            Err(error) => (Body::Json(error.to_json()), true),
        };
        log_send_error(
            connection
                .send_on(request.response_number(), body, false, end_err)
                .await,
        );
    });
}

fn log_send_error(result: Result<(), Error>) {
    if let Err(error) = result {
        tracing::warn!(?error, "failed to send reply");
    }
}
