//! Per-message receive context.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::endpoint::InputAddress;

/// A single received message as it flows through the receive pipe.
#[derive(Debug, Clone)]
pub struct ReceiveContext {
    message_id: Uuid,
    input_address: InputAddress,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
    received_at: Instant,
}

impl ReceiveContext {
    /// Create a context for a message received on `input_address`.
    pub fn new(input_address: InputAddress, body: impl Into<Vec<u8>>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            input_address,
            headers: BTreeMap::new(),
            body: body.into(),
            received_at: Instant::now(),
        }
    }

    /// Attach a header, builder style.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn input_address(&self) -> &InputAddress {
        &self.input_address
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as UTF-8, if it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    /// Time since the message was received.
    pub fn elapsed(&self) -> Duration {
        self.received_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> InputAddress {
        InputAddress::parse("tcp://127.0.0.1:5672/orders").unwrap()
    }

    #[test]
    fn message_ids_are_unique() {
        let a = ReceiveContext::new(address(), "a");
        let b = ReceiveContext::new(address(), "b");
        assert_ne!(a.message_id(), b.message_id());
    }

    #[test]
    fn headers_and_body() {
        let ctx = ReceiveContext::new(address(), "hello").with_header("content-type", "text/plain");
        assert_eq!(ctx.header("content-type"), Some("text/plain"));
        assert_eq!(ctx.header("missing"), None);
        assert_eq!(ctx.body_str(), Some("hello"));
        assert_eq!(ctx.input_address(), &address());
    }

    #[test]
    fn headers_iterate_in_name_order() {
        let mut ctx = ReceiveContext::new(address(), vec![0xff_u8])
            .with_header("peer", "127.0.0.1:9")
            .with_header("connection-id", "conn-1");
        ctx.set_header("peer", "127.0.0.1:10");

        let names: Vec<_> = ctx.headers().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["connection-id", "peer"]);
        assert_eq!(ctx.header("peer"), Some("127.0.0.1:10"));
        assert_eq!(ctx.body_str(), None);
    }
}
