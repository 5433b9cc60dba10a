//! Multiplexed RPC protocol with stream support used by [Scuttlebutt][sb].
//!
//! A single duplex connection carries any number of concurrent calls. Every
//! frame has a 9-byte header with flags, the body length, and a request
//! number that correlates replies with calls. See the [Scuttlebutt Protocol
//! Guide][ssb-prot] for the wire format.
//!
//! * [PacketStream] multiplexes frames over a [Transport].
//! * [MuxRpc] dispatches calls from the peer to registered methods and makes
//!   `sync`, `async`, `source`, `sink` and `duplex` calls to the peer.
//!
//! [ssb-prot]: https://ssbc.github.io/scuttlebutt-protocol-guide/#rpc-protocol
//! [sb]: https://scuttlebutt.nz
mod call;
mod envelope;
mod error;
mod handler;
mod header;
mod message;
mod muxrpc;
mod packet_stream;
pub mod transport;
#[cfg(any(test, feature = "test-server"))]
pub mod test_server;

#[cfg(test)]
mod test_utils;

#[doc(inline)]
pub use call::{
    CallHandler, DuplexHandler, ResponseHandler, SinkHandler, SourceHandler, StreamSender,
};
#[doc(inline)]
pub use envelope::{CallEnvelope, Request, RequestType};
#[doc(inline)]
pub use error::{Error, MalformedFrame, RpcError};
#[doc(inline)]
pub use handler::{Handler, RequestHandler, StreamHandler};
#[doc(inline)]
pub use header::{BodyType, Header, HeaderFlags, HeaderParseError};
#[doc(inline)]
pub use message::{Body, BodyError, Message, CHUNK_SIZE};
#[doc(inline)]
pub use muxrpc::{Method, MuxRpc};
#[doc(inline)]
pub use packet_stream::PacketStream;
#[doc(inline)]
pub use transport::Transport;
