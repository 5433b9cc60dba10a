//! Provides [PacketStream], which multiplexes requests and their replies over
//! a single [Transport].
use async_std::sync::Mutex;
use chashmap::CHashMap;
use futures::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{Error, MalformedFrame};
use crate::handler::{Handler, HandlerSender};
use crate::header::Header;
use crate::message::{self, Body, Message};
use crate::transport::Transport;

/// Packet stream over a duplex connection with a peer.
///
/// Requests sent with [PacketStream::send] are assigned increasing request
/// numbers starting at 1. Replies from the peer carry the negated request
/// number and are delivered to the [Handler] returned by
/// [PacketStream::send]. Frames with a positive request number were sent by
/// the peer and are returned by [PacketStream::next_inbound].
///
/// Only one task should read from the packet stream. Sending is safe from any
/// number of tasks.
pub struct PacketStream {
    transport: Box<dyn Transport>,
    // Held while writing a frame so that frames are not interleaved.
    writer: Mutex<WriteState>,
    reader: Mutex<FrameReader>,
    pending: CHashMap<u32, Pending>,
    connected: AtomicBool,
}

#[derive(Debug)]
struct WriteState {
    next_request_number: u32,
}

#[derive(Debug)]
struct Pending {
    created: Instant,
    handler: HandlerSender,
}

impl std::fmt::Debug for PacketStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketStream")
            .field("transport", &"Box<dyn Transport>")
            .field("pending", &self.pending.len())
            .field("connected", &self.connected)
            .finish()
    }
}

impl PacketStream {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            writer: Mutex::new(WriteState {
                next_request_number: 1,
            }),
            reader: Mutex::new(FrameReader::new()),
            pending: CHashMap::new(),
            connected: AtomicBool::new(true),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.transport.is_connected()
    }

    /// Number of requests that are still waiting for replies.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Request number that the next call to [PacketStream::send] will use
    /// unless it is still pending.
    pub async fn next_request_number(&self) -> u32 {
        self.writer.lock().await.next_request_number
    }

    /// Send a new request and return the handler that receives the replies.
    ///
    /// If `stream` is true the handler yields replies until the peer ends the
    /// stream. Otherwise it yields exactly one reply.
    pub async fn send(&self, body: Body, stream: bool) -> Result<Handler, Error> {
        let mut writer = self.writer.lock().await;
        self.check_connected()?;
        let number = self.next_number(&mut writer);
        let (handler, handler_sender) = Handler::new(number, stream);
        self.pending.insert(
            number,
            Pending {
                created: Instant::now(),
                handler: handler_sender,
            },
        );
        let message = Message::new(body, stream, false);
        if let Err(error) = self.write_message(&message, number as i32).await {
            self.pending.remove(&number);
            return Err(error);
        }
        tracing::debug!(number, stream, "sent request");
        Ok(handler)
    }

    /// Send a new request without waiting for replies. Returns the request
    /// number.
    pub async fn send_oneway(&self, body: Body, stream: bool) -> Result<u32, Error> {
        let mut writer = self.writer.lock().await;
        self.check_connected()?;
        let number = self.next_number(&mut writer);
        self.write_message(&Message::new(body, stream, false), number as i32)
            .await?;
        tracing::debug!(number, stream, "sent request without reply");
        Ok(number)
    }

    /// Send a message with an explicit request number.
    ///
    /// Use the request number of an outgoing stream to continue it and the
    /// negated number of an incoming request to reply to it.
    pub async fn send_on(
        &self,
        request_number: i32,
        body: Body,
        stream: bool,
        end_err: bool,
    ) -> Result<(), Error> {
        let _writer = self.writer.lock().await;
        self.check_connected()?;
        self.write_message(&Message::new(body, stream, end_err), request_number)
            .await
    }

    /// Read the next message from the peer.
    ///
    /// Replies are delivered to the handler of the matching request before
    /// they are returned. Returns `None` when the connection has ended.
    #[tracing::instrument(level = "trace", skip(self))]
    pub async fn read(&self) -> Result<Option<Message>, Error> {
        let message = match self.read_message().await {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::debug!("end of packet stream");
                self.end().await;
                return Ok(None);
            }
            Err(Error::Transport(error)) => {
                self.end().await;
                return Err(Error::Transport(error));
            }
            Err(error) => return Err(error),
        };
        tracing::trace!(?message, "received message");
        if let Some(request_number) = message.req.filter(|number| *number < 0) {
            self.route_reply(request_number, &message);
        }
        Ok(Some(message))
    }

    /// Read messages until a message from the peer arrives that is not a
    /// reply. Returns `None` when the connection has ended.
    ///
    /// Malformed frames are skipped.
    pub async fn next_inbound(&self) -> Option<Message> {
        loop {
            match self.read().await {
                Ok(Some(message)) => {
                    if message.req.map_or(false, |number| number >= 0) {
                        return Some(message);
                    }
                }
                Ok(None) => return None,
                Err(Error::MalformedFrame(error)) => {
                    tracing::warn!(?error, "discarding malformed frame");
                }
                Err(error) => {
                    tracing::warn!(?error, "failed to read from packet stream");
                    return None;
                }
            }
        }
    }

    /// [Stream] of all messages returned by [PacketStream::next_inbound].
    pub fn inbound(self: Arc<Self>) -> stream::BoxStream<'static, Message> {
        stream::unfold(self, |packet_stream| async move {
            let message = packet_stream.next_inbound().await?;
            Some((message, packet_stream))
        })
        .boxed()
    }

    /// Close the transport and terminate all handlers that wait for replies.
    pub async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.transport.close().await;
        self.terminate_pending();
    }

    async fn end(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.transport.close().await;
        }
        self.terminate_pending();
    }

    fn terminate_pending(&self) {
        for (number, mut pending) in self.pending.clear() {
            tracing::debug!(number, "terminating pending request");
            pending.handler.terminate();
        }
    }

    fn check_connected(&self) -> Result<(), Error> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn next_number(&self, writer: &mut WriteState) -> u32 {
        loop {
            let number = writer.next_request_number;
            writer.next_request_number = if number >= i32::MAX as u32 {
                1
            } else {
                number + 1
            };
            if !self.pending.contains_key(&number) {
                return number;
            }
        }
    }

    /// Write header and body chunks. The caller must hold the writer lock.
    async fn write_message(&self, message: &Message, request_number: i32) -> Result<(), Error> {
        let (header, body) = message
            .encode(request_number)
            .map_err(MalformedFrame::Body)?;
        tracing::trace!(request_number, ?message, "send message");
        self.transport
            .write(header.build().to_vec())
            .await
            .map_err(Error::Transport)?;
        for chunk in message::chunks(&body) {
            self.transport
                .write(chunk.to_vec())
                .await
                .map_err(Error::Transport)?;
        }
        Ok(())
    }

    async fn read_message(&self) -> Result<Option<Message>, Error> {
        let mut reader = self.reader.lock().await;
        let header_data = match reader.read_exact(&*self.transport, Header::SIZE).await? {
            Some(data) => data,
            None => return Ok(None),
        };
        let mut header_bytes = [0u8; Header::SIZE];
        header_bytes.copy_from_slice(&header_data);
        let header = match Header::parse(header_bytes) {
            Ok(None) => {
                tracing::debug!("received goodbye header");
                return Ok(None);
            }
            Ok(Some(header)) => Ok(header),
            Err(error) => Err(error),
        };

        // The body of a frame with an invalid header is consumed so that the
        // next frame can be read.
        let body_len = Header::peek_body_len(&header_bytes) as usize;
        let body = match reader.read_exact(&*self.transport, body_len).await? {
            Some(body) => body,
            None => {
                tracing::warn!(body_len, "unexpected end of stream while reading body");
                return Ok(None);
            }
        };
        let header = header.map_err(MalformedFrame::Header)?;
        let message = Message::decode(header, body.to_vec()).map_err(MalformedFrame::Body)?;
        Ok(Some(message))
    }

    fn route_reply(&self, request_number: i32, message: &Message) {
        let number = match request_number.checked_neg() {
            Some(number) => number as u32,
            None => {
                tracing::warn!(request_number, "invalid reply request number");
                return;
            }
        };
        let finished = match self.pending.get(&number) {
            Some(pending) => message.end_err || !pending.handler.is_stream(),
            None => {
                tracing::warn!(number, ?message, "received reply for unknown request");
                return;
            }
        };
        // A final reply leaves the pending table before the handler sees it.
        if finished {
            if let Some(mut pending) = self.pending.remove(&number) {
                pending.handler.process(message.clone());
                pending.handler.terminate();
                tracing::debug!(number, elapsed = ?pending.created.elapsed(), "request completed");
            }
        } else if let Some(mut pending) = self.pending.get_mut(&number) {
            pending.handler.process(message.clone());
        }
    }
}

/// Buffers transport chunks until the requested number of bytes is
/// available.
#[derive(Debug)]
struct FrameReader {
    buffer: bytes::BytesMut,
}

impl FrameReader {
    fn new() -> Self {
        Self {
            buffer: bytes::BytesMut::with_capacity(message::CHUNK_SIZE),
        }
    }

    /// Returns `None` if the transport ends before `len` bytes are read.
    async fn read_exact(
        &mut self,
        transport: &dyn Transport,
        len: usize,
    ) -> Result<Option<bytes::BytesMut>, Error> {
        while self.buffer.len() < len {
            match transport.read().await.map_err(Error::Transport)? {
                Some(chunk) if !chunk.is_empty() => self.buffer.extend_from_slice(&chunk),
                _ => return Ok(None),
            }
        }
        Ok(Some(self.buffer.split_to(len)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::{BodyType, HeaderFlags};
    use crate::test_utils::*;

    fn history_stream_request() -> serde_json::Value {
        serde_json::json!({
            "name": ["createHistoryStream"],
            "args": [{
                "id": "@1+Iwm79DKvVBqYKFkhT6fWRbAVvNNVH4F2BSxwhYmx8=.ed25519",
                "seq": 1,
                "live": false,
                "keys": false
            }],
            "type": "source"
        })
    }

    #[async_std::test]
    async fn decode_inbound_request() {
        let transport = MockTransport::new();
        let packet_stream = Arc::new(PacketStream::new(transport.clone()));
        assert!(packet_stream.is_connected());

        transport.feed(vec![
            b"\n\x00\x00\x00\x9a\x00\x00\x04\xfb".to_vec(),
            br#"{"name":["createHistoryStream"],"args":[{"id":"@omgyp7Pnrw+Qm0I6T6Fh5VvnKmodMXwnxTIesW2DgMg=.ed25519","seq":10,"live":true,"keys":false}],"type":"source"}"#.to_vec(),
        ]);

        // Replies are not yielded
        transport.feed_json(ASYNC, -1, &serde_json::Value::Null);
        let messages = packet_stream.inbound().collect::<Vec<_>>().await;
        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert_eq!(message.req, Some(1275));
        assert!(message.stream);
        assert!(!message.end_err);
        assert_eq!(
            message.body,
            Body::Json(serde_json::json!({
                "name": ["createHistoryStream"],
                "args": [{
                    "id": "@omgyp7Pnrw+Qm0I6T6Fh5VvnKmodMXwnxTIesW2DgMg=.ed25519",
                    "seq": 10,
                    "live": true,
                    "keys": false
                }],
                "type": "source"
            }))
        );
    }

    #[async_std::test]
    async fn encode_request() {
        let transport = MockTransport::new();
        let packet_stream = PacketStream::new(transport.clone());

        packet_stream
            .send(Body::Json(history_stream_request()), true)
            .await
            .unwrap();

        let output = transport.take_output();
        assert_eq!(output.len(), 2);
        let mut header_bytes = [0u8; Header::SIZE];
        header_bytes.copy_from_slice(&output[0]);
        let header = Header::parse(header_bytes).unwrap().unwrap();
        assert_eq!(output[0][0], 0x0a);
        assert_eq!(header.request_number, 1);
        assert_eq!(header.body_len as usize, output[1].len());
        let body = serde_json::from_slice::<serde_json::Value>(&output[1]).unwrap();
        assert_eq!(body, history_stream_request());

        assert_eq!(packet_stream.next_request_number().await, 2);
        assert_eq!(packet_stream.pending_len(), 1);
    }

    #[async_std::test]
    async fn sync_reply() {
        let transport = MockTransport::new();
        let packet_stream = PacketStream::new(transport.clone());

        let mut handler = packet_stream
            .send(
                Body::Json(serde_json::json!({"name": ["whoami"], "args": []})),
                false,
            )
            .await
            .unwrap();
        let output = transport.take_output();
        assert_eq!(output[0][0], 0x02);
        assert_eq!(output[0][5..], *b"\x00\x00\x00\x01");
        assert_eq!(output[0][4] as usize, output[1].len());

        transport.feed(vec![
            b"\x02\x00\x00\x00\x3e\xff\xff\xff\xff".to_vec(),
            br#"{"id":"@1+Iwm79DKvVBqYKFkhT6fWRbAVvNNVH4F2BSxwhYmx8=.ed25519"}"#.to_vec(),
        ]);
        let message = packet_stream.read().await.unwrap().unwrap();
        assert_eq!(message.req, Some(-1));
        assert_eq!(packet_stream.pending_len(), 0);
        assert_eq!(packet_stream.next_request_number().await, 2);

        let reply = handler.next().await.unwrap();
        assert_eq!(
            reply.body,
            Body::Json(
                serde_json::json!({"id": "@1+Iwm79DKvVBqYKFkhT6fWRbAVvNNVH4F2BSxwhYmx8=.ed25519"})
            )
        );
        assert_eq!(handler.next().await, None);
    }

    #[async_std::test]
    async fn stream_replies() {
        let transport = MockTransport::new();
        let packet_stream = PacketStream::new(transport.clone());

        let first = packet_stream
            .send(Body::Json(history_stream_request()), true)
            .await
            .unwrap();
        let second = packet_stream
            .send(Body::Json(history_stream_request()), true)
            .await
            .unwrap();
        assert_eq!(first.number(), 1);
        assert_eq!(second.number(), 2);
        assert_eq!(packet_stream.pending_len(), 2);

        transport.feed_json(STREAM, -2, &serde_json::json!({"sequence": 1}));
        transport.feed_json(STREAM_END, -2, &serde_json::json!({"sequence": 2}));

        // Replies are not returned as inbound messages
        assert_eq!(packet_stream.next_inbound().await, None);

        let replies = second.collect::<Vec<_>>().await;
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|reply| reply.req == Some(-2)));
        assert!(replies[1].end_err);

        // The connection ended which terminates the first request
        assert_eq!(first.collect::<Vec<_>>().await, vec![]);
        assert_eq!(packet_stream.pending_len(), 0);
    }

    #[async_std::test]
    async fn reply_after_end_is_discarded() {
        let transport = MockTransport::new();
        let packet_stream = PacketStream::new(transport.clone());
        let handler = packet_stream
            .send(Body::Json(history_stream_request()), true)
            .await
            .unwrap();

        transport.feed_json(STREAM_END, -1, &serde_json::json!(true));
        transport.feed_json(STREAM, -1, &serde_json::json!({"late": true}));
        transport.feed_json(ASYNC, -7, &serde_json::json!({"unknown": true}));

        let message = packet_stream.read().await.unwrap().unwrap();
        assert!(message.end_err);
        assert_eq!(packet_stream.pending_len(), 0);
        let message = packet_stream.read().await.unwrap().unwrap();
        assert_eq!(message.req, Some(-1));
        let message = packet_stream.read().await.unwrap().unwrap();
        assert_eq!(message.req, Some(-7));

        let replies = handler.collect::<Vec<_>>().await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].is_end_sentinel());
    }

    #[async_std::test]
    async fn handler_sees_reply_after_removal() {
        let (client_transport, server_transport) = crate::transport::pair();
        let client = Arc::new(PacketStream::new(client_transport));
        let server = Arc::new(PacketStream::new(server_transport));

        let server_task = async_std::task::spawn({
            let server = Arc::clone(&server);
            async move {
                while let Some(message) = server.next_inbound().await {
                    let number = -message.req.unwrap();
                    server.send_on(number, message.body, false, false).await.unwrap();
                }
            }
        });
        let client_reader = async_std::task::spawn({
            let client = Arc::clone(&client);
            async move { while client.next_inbound().await.is_some() {} }
        });

        for i in 0..500u64 {
            let mut handler = client.send(Body::Json(i.into()), false).await.unwrap();
            let reply = handler.next().await.unwrap();
            assert_eq!(reply.body, Body::Json(i.into()));
            assert_eq!(client.pending_len(), 0);
        }

        client.disconnect().await;
        server_task.await;
        client_reader.await;
    }

    #[async_std::test]
    async fn dropped_source_is_drained() {
        let transport = MockTransport::new();
        let packet_stream = PacketStream::new(transport.clone());
        let mut source = crate::call::SourceHandler::new(
            packet_stream
                .send(Body::Json(history_stream_request()), true)
                .await
                .unwrap(),
        );

        for sequence in 1..=3 {
            transport.feed_json(STREAM, -1, &serde_json::json!({ "sequence": sequence }));
        }
        transport.feed_json(STREAM_END, -1, &serde_json::json!(true));

        packet_stream.read().await.unwrap().unwrap();
        let first = source.next().await.unwrap().unwrap();
        assert_eq!(first.body, Body::Json(serde_json::json!({"sequence": 1})));
        drop(source);

        for _ in 0..2 {
            let message = packet_stream.read().await.unwrap().unwrap();
            assert_eq!(message.req, Some(-1));
            assert_eq!(packet_stream.pending_len(), 1);
        }
        let message = packet_stream.read().await.unwrap().unwrap();
        assert!(message.is_end_sentinel());
        assert_eq!(packet_stream.pending_len(), 0);

        // The connection is still usable
        let mut handler = packet_stream.send(Body::end(), false).await.unwrap();
        assert_eq!(handler.number(), 2);
        transport.feed_json(ASYNC, -2, &serde_json::json!("ok"));
        packet_stream.read().await.unwrap().unwrap();
        assert_eq!(handler.next().await.unwrap().body, Body::Json("ok".into()));
        assert_eq!(packet_stream.pending_len(), 0);
    }

    #[async_std::test]
    async fn request_numbers_increase() {
        let transport = MockTransport::new();
        let packet_stream = PacketStream::new(transport.clone());
        for expected in 1..=5u32 {
            let handler = packet_stream
                .send(Body::Text("ping".to_string()), false)
                .await
                .unwrap();
            assert_eq!(handler.number(), expected);
        }
        assert_eq!(packet_stream.send_oneway(Body::end(), true).await.unwrap(), 6);
        packet_stream
            .send_on(6, Body::end(), true, true)
            .await
            .unwrap();
        assert_eq!(packet_stream.next_request_number().await, 7);
        assert_eq!(packet_stream.pending_len(), 5);
    }

    #[async_std::test]
    async fn pending_numbers_are_skipped() {
        let transport = MockTransport::new();
        let packet_stream = PacketStream::new(transport.clone());
        let _first = packet_stream.send(Body::end(), false).await.unwrap();
        packet_stream.writer.lock().await.next_request_number = 1;
        let second = packet_stream.send(Body::end(), false).await.unwrap();
        assert_eq!(second.number(), 2);
    }

    #[async_std::test]
    async fn goodbye_header() {
        let transport = MockTransport::new();
        let packet_stream = PacketStream::new(transport.clone());
        let handler = packet_stream.send(Body::end(), true).await.unwrap();

        transport.feed(vec![vec![0u8; Header::SIZE]]);
        assert_eq!(packet_stream.read().await.unwrap(), None);
        assert_eq!(packet_stream.pending_len(), 0);
        assert_eq!(handler.collect::<Vec<_>>().await, vec![]);
        assert!(!packet_stream.is_connected());
    }

    #[async_std::test]
    async fn empty_read() {
        let transport = MockTransport::new();
        let packet_stream = PacketStream::new(transport.clone());
        transport.feed(vec![vec![]]);
        assert_eq!(packet_stream.next_inbound().await, None);
        assert!(!packet_stream.is_connected());
    }

    #[async_std::test]
    async fn send_not_connected() {
        let transport = MockTransport::new();
        let packet_stream = PacketStream::new(transport.clone());
        packet_stream.disconnect().await;
        match packet_stream.send(Body::end(), false).await {
            Err(Error::NotConnected) => (),
            result => panic!("Unexpected result {:?}", result),
        }
        assert_eq!(packet_stream.pending_len(), 0);
    }

    #[async_std::test]
    async fn disconnect_terminates_pending() {
        let transport = MockTransport::new();
        let packet_stream = Arc::new(PacketStream::new(transport.clone()));
        let request = packet_stream.send(Body::end(), false).await.unwrap();
        let stream = packet_stream.send(Body::end(), true).await.unwrap();
        let waiters = async_std::task::spawn(async move {
            (
                request.collect::<Vec<_>>().await,
                stream.collect::<Vec<_>>().await,
            )
        });
        packet_stream.disconnect().await;
        assert_eq!(waiters.await, (vec![], vec![]));
        assert_eq!(packet_stream.pending_len(), 0);
        assert!(!transport.is_connected());
    }

    #[async_std::test]
    async fn malformed_frames_are_skipped() {
        let transport = MockTransport::new();
        let packet_stream = PacketStream::new(transport.clone());

        // Invalid JSON
        let header = Header {
            flags: HeaderFlags::default(),
            body_type: BodyType::Json,
            body_len: 3,
            request_number: 5,
        };
        transport.feed(vec![header.build().to_vec(), b"{{{".to_vec()]);
        // Invalid body type
        let mut header_bytes = header.build();
        header_bytes[0] |= 0b11;
        transport.feed(vec![header_bytes.to_vec(), b"abc".to_vec()]);
        transport.feed_json(ASYNC, 6, &serde_json::json!({"name": ["ok"], "args": []}));

        assert!(matches!(
            packet_stream.read().await,
            Err(Error::MalformedFrame(MalformedFrame::Body(_)))
        ));
        assert!(matches!(
            packet_stream.read().await,
            Err(Error::MalformedFrame(MalformedFrame::Header(_)))
        ));
        let message = packet_stream.read().await.unwrap().unwrap();
        assert_eq!(message.req, Some(6));
    }

    #[async_std::test]
    async fn large_body_is_chunked() {
        let transport = MockTransport::new();
        let packet_stream = PacketStream::new(transport.clone());
        let data = (0..10_000u32).map(|i| i as u8).collect::<Vec<_>>();
        packet_stream
            .send_on(3, Body::Binary(data.clone()), true, false)
            .await
            .unwrap();

        let output = transport.take_output();
        // Header and three body chunks
        assert_eq!(output.len(), 4);
        assert_eq!(output[1].len(), message::CHUNK_SIZE);
        assert_eq!(output[3].len(), 10_000 - 2 * message::CHUNK_SIZE);

        transport.feed(output);
        let message = packet_stream.next_inbound().await.unwrap();
        assert_eq!(message.body, Body::Binary(data));
        assert_eq!(message.req, Some(3));
    }

    #[test_strategy::proptest]
    fn reassemble_split_frames(
        #[strategy(proptest::collection::vec(any::<Message>(), 1..5))] messages: Vec<Message>,
        #[strategy(1usize..64)] chunk_size: usize,
    ) {
        async_std::task::block_on(async move {
            let transport = MockTransport::new();
            let packet_stream = PacketStream::new(transport.clone());
            let mut data = Vec::new();
            for (index, message) in messages.iter().enumerate() {
                let (header, body) = message.encode(index as i32 + 1).unwrap();
                data.extend_from_slice(&header.build());
                data.extend_from_slice(&body);
            }
            transport.feed(data.chunks(chunk_size).map(Vec::from).collect());

            for (index, message) in messages.into_iter().enumerate() {
                let received = packet_stream.next_inbound().await.unwrap();
                prop_assert_eq!(received, Message {
                    req: Some(index as i32 + 1),
                    ..message
                });
            }
            prop_assert_eq!(packet_stream.next_inbound().await, None);
            Ok(())
        })?;
    }
}
