pub use proptest::prelude::*;
pub use test_strategy::proptest;

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::header::{BodyType, Header, HeaderFlags};
use crate::transport::Transport;

/// Transport that replays chunks fed to it and records everything written.
///
/// Reading when no more chunks are queued ends the connection.
#[derive(Debug)]
pub struct MockTransport {
    input: Mutex<VecDeque<Vec<u8>>>,
    output: Mutex<Vec<Vec<u8>>>,
    connected: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            input: Mutex::new(VecDeque::new()),
            output: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        })
    }

    pub fn feed(&self, chunks: Vec<Vec<u8>>) {
        self.input.lock().unwrap().extend(chunks);
    }

    /// Feed a complete frame with a JSON body.
    pub fn feed_json(&self, flags: HeaderFlags, request_number: i32, body: &serde_json::Value) {
        let body = serde_json::to_vec(body).unwrap();
        let header = Header {
            flags,
            body_type: BodyType::Json,
            body_len: body.len() as u32,
            request_number,
        };
        self.feed(vec![header.build().to_vec(), body]);
    }

    /// Take all chunks written so far.
    pub fn take_output(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.output.lock().unwrap())
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn read(&self) -> io::Result<Option<Vec<u8>>> {
        let chunk = self.input.lock().unwrap().pop_front();
        if chunk.is_none() {
            self.connected.store(false, Ordering::SeqCst);
        }
        Ok(chunk)
    }

    async fn write(&self, data: Vec<u8>) -> io::Result<()> {
        if !self.is_connected() {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        self.output.lock().unwrap().push(data);
        Ok(())
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

pub const STREAM: HeaderFlags = HeaderFlags {
    is_stream: true,
    is_end_or_error: false,
};

pub const STREAM_END: HeaderFlags = HeaderFlags {
    is_stream: true,
    is_end_or_error: true,
};

pub const ASYNC: HeaderFlags = HeaderFlags {
    is_stream: false,
    is_end_or_error: false,
};
